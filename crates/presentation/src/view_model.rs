//! Observable camera screen state.
//!
//! [`ViewState`] mirrors the session as plain fields a UI can bind to. It is
//! advanced by [`ViewState::apply`], a pure reducer over [`CameraEvent`]s.
//! [`CameraViewModel`] runs that reducer on a task subscribed to a
//! [`SessionHandle`] and publishes every change through a `watch` channel.

use serde::Serialize;
use tokio::sync::{broadcast, watch};
use tokio::task::JoinHandle;

use shutter_capture_engine::{
    CameraEvent, ResourceKind, SessionHandle, SessionSnapshot, SessionStatus, ZoomDirection,
};
use shutter_common::error::{ShutterError, ShutterResult};
use shutter_platform_core::{
    CameraPosition, CaptureMode, FlashMode, LibraryAsset, NormalizedPoint, PermissionDomain,
    PermissionStatus,
};

use crate::gestures::GestureAction;

/// What the camera screen is showing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DisplayState {
    /// Live preview with capture controls.
    #[default]
    CaptureMode,
    PhotoPreview,
    MoviePreview,
}

impl DisplayState {
    fn preview_of(kind: ResourceKind) -> Self {
        match kind {
            ResourceKind::Photo => Self::PhotoPreview,
            ResourceKind::Movie => Self::MoviePreview,
        }
    }

    pub fn is_preview(self) -> bool {
        self != Self::CaptureMode
    }
}

/// Fields the camera screen binds to.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ViewState {
    pub display: DisplayState,
    pub camera_granted: bool,
    pub microphone_granted: bool,
    pub library_granted: bool,
    pub ready: bool,
    pub configuration_failed: bool,
    pub running: bool,
    pub recording: bool,
    pub mode: CaptureMode,
    pub position: CameraPosition,
    pub zoom: f64,
    pub torch_on: bool,
    pub flash: FlashMode,
    pub focus_point: Option<NormalizedPoint>,
    /// Segments handed over by the current recording on device changes.
    pub segments: usize,
    /// Library ids from the most recent successful save.
    pub saved_assets: Vec<String>,
    pub status: String,
    pub last_error: Option<String>,
}

impl Default for ViewState {
    fn default() -> Self {
        Self {
            display: DisplayState::CaptureMode,
            camera_granted: false,
            microphone_granted: false,
            library_granted: false,
            ready: false,
            configuration_failed: false,
            running: false,
            recording: false,
            mode: CaptureMode::Video,
            position: CameraPosition::Unspecified,
            zoom: 1.0,
            torch_on: false,
            flash: FlashMode::Off,
            focus_point: None,
            segments: 0,
            saved_assets: Vec::new(),
            status: "Starting".to_string(),
            last_error: None,
        }
    }
}

impl ViewState {
    /// Seed a state from a session snapshot.
    pub fn from_snapshot(snapshot: &SessionSnapshot) -> Self {
        let mut state = Self::default();
        state.sync(snapshot);
        state.display = snapshot
            .captured
            .map(DisplayState::preview_of)
            .unwrap_or_default();
        state
    }

    /// Overwrite every field the snapshot knows about. The display state,
    /// status line and error are owned by the reducer and left alone.
    pub fn sync(&mut self, snapshot: &SessionSnapshot) {
        let permissions = snapshot.permissions;
        self.camera_granted = permissions.camera.is_granted();
        self.microphone_granted = permissions.microphone.is_granted();
        self.library_granted = permissions.photo_library.is_granted();
        self.ready = snapshot.status.is_ready();
        self.configuration_failed = snapshot.status.is_failed();
        self.running = snapshot.running;
        self.recording = snapshot.recording;
        self.mode = snapshot.mode;
        self.position = snapshot.position;
        self.zoom = snapshot.zoom;
        self.torch_on = snapshot.torch.is_active();
        self.flash = snapshot.flash;
        self.focus_point = snapshot.focus_point;
    }

    /// Capture controls are usable only on a ready session in capture mode.
    pub fn controls_enabled(&self) -> bool {
        self.ready && self.camera_granted && self.display == DisplayState::CaptureMode
    }

    /// Advance the state by one session event.
    pub fn apply(&mut self, event: &CameraEvent) {
        match event {
            CameraEvent::PermissionChanged { domain, status } => {
                let granted = *status == PermissionStatus::Granted;
                match domain {
                    PermissionDomain::Camera => self.camera_granted = granted,
                    PermissionDomain::Microphone => self.microphone_granted = granted,
                    PermissionDomain::PhotoLibrary => self.library_granted = granted,
                }
            }
            CameraEvent::SessionStatusChanged(status) => {
                self.ready = status.is_ready();
                self.configuration_failed = status.is_failed();
                if let SessionStatus::ConfigurationFailed { message, .. } = status {
                    self.last_error = Some(message.clone());
                }
                self.status = status_line(status);
            }
            CameraEvent::RunningChanged(running) => self.running = *running,
            CameraEvent::CaptureModeChanged(mode) => self.mode = *mode,
            CameraEvent::CameraPositionChanged(position) => self.position = *position,
            CameraEvent::CameraFlipFailed { reason, .. } => {
                self.last_error = Some(format!("Could not switch camera: {reason}"));
            }
            CameraEvent::ZoomChanged(zoom) => self.zoom = *zoom,
            CameraEvent::FocusChanged(point) => self.focus_point = *point,
            CameraEvent::TorchChanged(torch) => self.torch_on = torch.is_active(),
            CameraEvent::FlashChanged(flash) => self.flash = *flash,
            CameraEvent::RecordingChanged(recording) => {
                self.recording = *recording;
                if *recording {
                    self.segments = 0;
                    self.status = "Recording".to_string();
                }
            }
            CameraEvent::RecordingSegmentCompleted { segment, .. } => {
                self.segments = *segment;
            }
            CameraEvent::OutputFinished {
                kind,
                success: true,
                ..
            } => {
                self.display = DisplayState::preview_of(*kind);
                self.last_error = None;
                self.status = match kind {
                    ResourceKind::Photo => "Photo captured".to_string(),
                    ResourceKind::Movie => "Movie captured".to_string(),
                };
            }
            CameraEvent::OutputFinished {
                success: false,
                message,
                ..
            } => {
                self.last_error = Some(match message {
                    Some(message) => format!("Processing did not finish successfully: {message}"),
                    None => "Processing did not finish successfully".to_string(),
                });
            }
            CameraEvent::CapturedResourceCleared => {
                self.display = DisplayState::CaptureMode;
                self.segments = 0;
            }
            CameraEvent::LibraryWriteFinished {
                success,
                assets,
                message,
            } => {
                if *success {
                    self.saved_assets = assets.clone();
                    self.status = format!("Saved {} item(s) to library", assets.len());
                } else {
                    self.saved_assets.clear();
                    self.last_error = Some(
                        message
                            .clone()
                            .unwrap_or_else(|| "Library write failed".to_string()),
                    );
                }
            }
        }
    }
}

fn status_line(status: &SessionStatus) -> String {
    match status {
        SessionStatus::Uninitialized => "Starting".to_string(),
        SessionStatus::Configuring => "Configuring camera".to_string(),
        SessionStatus::Ready => "Ready".to_string(),
        SessionStatus::ConfigurationFailed { .. } => "Camera unavailable".to_string(),
    }
}

/// Async view-model bound to a running session.
pub struct CameraViewModel {
    session: SessionHandle,
    state: watch::Receiver<ViewState>,
    reducer: JoinHandle<()>,
}

impl CameraViewModel {
    /// Attach to a session. The initial state comes from a snapshot; events
    /// are subscribed before the snapshot is taken, so replaying the ones
    /// that raced it converges on the same state.
    pub async fn attach(session: SessionHandle) -> ShutterResult<Self> {
        let events = session.subscribe();
        let snapshot = session.snapshot().await?;
        let (tx, rx) = watch::channel(ViewState::from_snapshot(&snapshot));
        let reducer = tokio::spawn(reduce(session.clone(), events, tx));
        Ok(Self {
            session,
            state: rx,
            reducer,
        })
    }

    /// Current state.
    pub fn state(&self) -> ViewState {
        self.state.borrow().clone()
    }

    /// A receiver that sees every published state.
    pub fn watch(&self) -> watch::Receiver<ViewState> {
        self.state.clone()
    }

    /// Wait until the state satisfies `predicate`.
    pub async fn wait_until(
        &self,
        predicate: impl FnMut(&ViewState) -> bool,
    ) -> ShutterResult<ViewState> {
        let mut rx = self.state.clone();
        let state = rx
            .wait_for(predicate)
            .await
            .map_err(|_| ShutterError::invalid_state("view model has stopped"))?;
        Ok(state.clone())
    }

    pub fn session(&self) -> &SessionHandle {
        &self.session
    }

    /// Shutter button tap: stop an active recording, otherwise take a picture.
    pub async fn shutter_tap(&self) -> ShutterResult<()> {
        if self.state.borrow().recording {
            self.session.stop_recording().await
        } else {
            self.session.take_picture().await
        }
    }

    /// Shutter button long press: start recording.
    pub async fn shutter_long_press(&self) -> ShutterResult<()> {
        if self.state.borrow().recording {
            return Ok(());
        }
        self.session.start_recording().await
    }

    pub async fn toggle_capture_mode(&self) -> ShutterResult<CaptureMode> {
        self.session.toggle_capture_mode().await
    }

    pub async fn flip_camera(&self) -> ShutterResult<CameraPosition> {
        self.session.flip_camera().await
    }

    pub async fn toggle_torch(&self) -> ShutterResult<bool> {
        Ok(self.session.toggle_torch().await?.is_active())
    }

    pub async fn toggle_flash(&self) -> ShutterResult<FlashMode> {
        self.session.toggle_flash().await
    }

    pub async fn reset_zoom(&self) -> ShutterResult<f64> {
        self.session.zoom(ZoomDirection::Reset).await
    }

    /// Forward a preview gesture to the session.
    pub async fn dispatch(&self, action: GestureAction) -> ShutterResult<()> {
        match action {
            GestureAction::Zoom(direction) => self.session.zoom(direction).await.map(|_| ()),
            GestureAction::FocusAndExpose(point) => self.session.focus_and_expose(point).await,
            GestureAction::FlipCamera => self.session.flip_camera().await.map(|_| ()),
        }
    }

    /// Persist the captured resource, then go back to capture mode with the
    /// session running. The session is restarted even when the save fails.
    pub async fn save(&self) -> ShutterResult<Vec<LibraryAsset>> {
        let saved = self.session.save_captured_resource().await;
        self.session.start().await?;
        saved
    }

    /// Drop the captured resource and go back to capture mode.
    pub async fn discard(&self) -> ShutterResult<()> {
        self.session.discard().await
    }

    pub async fn retake(&self) -> ShutterResult<()> {
        self.discard().await
    }
}

impl Drop for CameraViewModel {
    fn drop(&mut self) {
        self.reducer.abort();
    }
}

async fn reduce(
    session: SessionHandle,
    mut events: broadcast::Receiver<CameraEvent>,
    tx: watch::Sender<ViewState>,
) {
    loop {
        match events.recv().await {
            Ok(event) => {
                tx.send_modify(|state| state.apply(&event));
            }
            Err(broadcast::error::RecvError::Lagged(missed)) => {
                tracing::warn!(missed, "View model lagged behind session events; resyncing");
                match session.snapshot().await {
                    Ok(snapshot) => tx.send_modify(|state| state.sync(&snapshot)),
                    Err(_) => break,
                }
            }
            Err(broadcast::error::RecvError::Closed) => break,
        }
    }
    tracing::debug!("View model reducer exited");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn permission_events_flip_flags() {
        let mut state = ViewState::default();
        state.apply(&CameraEvent::PermissionChanged {
            domain: PermissionDomain::Camera,
            status: PermissionStatus::Granted,
        });
        state.apply(&CameraEvent::PermissionChanged {
            domain: PermissionDomain::PhotoLibrary,
            status: PermissionStatus::Denied,
        });
        assert!(state.camera_granted);
        assert!(!state.microphone_granted);
        assert!(!state.library_granted);
    }

    #[test]
    fn configuration_failure_disables_controls() {
        let mut state = ViewState::default();
        state.apply(&CameraEvent::SessionStatusChanged(SessionStatus::Ready));
        state.camera_granted = true;
        assert!(state.controls_enabled());

        state.apply(&CameraEvent::SessionStatusChanged(
            SessionStatus::ConfigurationFailed {
                failure: shutter_capture_engine::ConfigurationFailure::PermissionDenied,
                message: "camera access denied".into(),
            },
        ));
        assert!(!state.controls_enabled());
        assert!(state.configuration_failed);
        assert_eq!(state.last_error.as_deref(), Some("camera access denied"));
    }

    #[test]
    fn completion_moves_to_preview_and_clear_returns() {
        let mut state = ViewState::default();
        state.apply(&CameraEvent::OutputFinished {
            kind: ResourceKind::Movie,
            success: true,
            message: None,
        });
        assert_eq!(state.display, DisplayState::MoviePreview);
        assert!(!state.controls_enabled());

        state.apply(&CameraEvent::CapturedResourceCleared);
        assert_eq!(state.display, DisplayState::CaptureMode);
    }

    #[test]
    fn failed_output_stays_in_capture_mode() {
        let mut state = ViewState::default();
        state.apply(&CameraEvent::OutputFinished {
            kind: ResourceKind::Photo,
            success: false,
            message: Some("sensor error".into()),
        });
        assert_eq!(state.display, DisplayState::CaptureMode);
        assert_eq!(
            state.last_error.as_deref(),
            Some("Processing did not finish successfully: sensor error")
        );
    }

    #[test]
    fn recording_counts_segments() {
        let mut state = ViewState::default();
        state.apply(&CameraEvent::RecordingChanged(true));
        state.apply(&CameraEvent::RecordingSegmentCompleted {
            path: "a.mov".into(),
            segment: 1,
        });
        state.apply(&CameraEvent::RecordingSegmentCompleted {
            path: "b.mov".into(),
            segment: 2,
        });
        assert!(state.recording);
        assert_eq!(state.segments, 2);

        state.apply(&CameraEvent::RecordingChanged(false));
        assert!(!state.recording);
        assert_eq!(state.segments, 2);
    }

    #[test]
    fn torch_and_zoom_mirror_events() {
        let mut state = ViewState::default();
        state.apply(&CameraEvent::TorchChanged(shutter_platform_core::TorchMode::On));
        state.apply(&CameraEvent::ZoomChanged(2.5));
        state.apply(&CameraEvent::FlashChanged(FlashMode::On));
        assert!(state.torch_on);
        assert_eq!(state.zoom, 2.5);
        assert_eq!(state.flash, FlashMode::On);
    }

    #[test]
    fn serializes_for_ui_clients() {
        let json = serde_json::to_value(ViewState::default()).unwrap();
        assert_eq!(json["display"], "capture_mode");
        assert_eq!(json["zoom"], 1.0);
    }
}
