//! Session wiring shared by the commands.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;

use shutter_capture_engine::{CaptureBackend, CaptureSessionManager, SessionRuntime, VirtualBackend};
use shutter_common::config::AppConfig;
use shutter_platform_core::LibraryAsset;
use shutter_platform_host::{DirectoryLibrary, PolicyPermissionProvider};
use shutter_presentation::{CameraViewModel, ViewState};

use crate::BackendKind;

/// Upper bound on waiting for the hardware to answer.
const SETTLE_TIMEOUT: Duration = Duration::from_secs(15);

/// Build the selected capture backend.
pub fn backend(kind: BackendKind) -> anyhow::Result<Box<dyn CaptureBackend>> {
    match kind {
        BackendKind::Virtual => Ok(Box::new(VirtualBackend::new())),
        #[cfg(feature = "gstreamer")]
        BackendKind::Gstreamer => {
            let backend = shutter_capture_engine::GstBackend::new()
                .context("GStreamer backend is not available")?;
            Ok(Box::new(backend))
        }
        #[cfg(not(feature = "gstreamer"))]
        BackendKind::Gstreamer => {
            anyhow::bail!("this build has no GStreamer support; rebuild with --features gstreamer")
        }
    }
}

/// A started session with a view-model attached.
pub struct Session {
    pub runtime: SessionRuntime,
    pub view: CameraViewModel,
}

impl Session {
    pub async fn open(config: &AppConfig, kind: BackendKind) -> anyhow::Result<Self> {
        let manager = CaptureSessionManager::new(
            backend(kind)?,
            Arc::new(PolicyPermissionProvider::new(config.permissions.clone())),
            Arc::new(DirectoryLibrary::new(&config.library_dir)),
            config.capture.clone(),
        );
        let runtime = SessionRuntime::spawn(manager);
        let view = CameraViewModel::attach(runtime.handle())
            .await
            .context("Session did not start")?;

        let state = view.state();
        if !state.ready {
            let reason = state
                .last_error
                .unwrap_or_else(|| "camera is unavailable".to_string());
            runtime.shutdown().await?;
            anyhow::bail!("Session is not ready: {reason}");
        }
        tracing::debug!(position = %state.position, mode = %state.mode, "Session ready");

        Ok(Self { runtime, view })
    }

    /// Wait for the view state to satisfy `predicate`.
    pub async fn settle(
        &self,
        what: &str,
        predicate: impl FnMut(&ViewState) -> bool,
    ) -> anyhow::Result<ViewState> {
        let state = tokio::time::timeout(SETTLE_TIMEOUT, self.view.wait_until(predicate))
            .await
            .with_context(|| format!("Timed out waiting for {what}"))??;
        Ok(state)
    }

    pub async fn close(self) -> anyhow::Result<()> {
        drop(self.view);
        self.runtime.shutdown().await?;
        Ok(())
    }
}

/// Library location of a saved asset, or its id when it has no file.
pub fn describe(asset: &LibraryAsset) -> String {
    match &asset.path {
        Some(path) => path.display().to_string(),
        None => asset.id.clone(),
    }
}
