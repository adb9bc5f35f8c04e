//! Session notifications.

use std::path::PathBuf;

use tokio::sync::broadcast;

use shutter_platform_core::{
    CameraPosition, CaptureMode, FlashMode, NormalizedPoint, PermissionDomain, PermissionStatus,
    TorchMode,
};

use crate::recording::ResourceKind;
use crate::session::SessionStatus;

const EVENT_CAPACITY: usize = 64;

/// Everything observers can learn about the session.
#[derive(Debug, Clone, PartialEq)]
pub enum CameraEvent {
    PermissionChanged {
        domain: PermissionDomain,
        status: PermissionStatus,
    },
    SessionStatusChanged(SessionStatus),
    RunningChanged(bool),
    CaptureModeChanged(CaptureMode),
    CameraPositionChanged(CameraPosition),
    /// A flip was attempted and rolled back; the position is unchanged.
    CameraFlipFailed {
        position: CameraPosition,
        reason: String,
    },
    ZoomChanged(f64),
    /// `None` means continuous autofocus.
    FocusChanged(Option<NormalizedPoint>),
    TorchChanged(TorchMode),
    FlashChanged(FlashMode),
    /// Only raised once the hardware confirms start or stop.
    RecordingChanged(bool),
    RecordingSegmentCompleted {
        path: PathBuf,
        segment: usize,
    },
    OutputFinished {
        kind: ResourceKind,
        success: bool,
        message: Option<String>,
    },
    CapturedResourceCleared,
    LibraryWriteFinished {
        success: bool,
        assets: Vec<String>,
        message: Option<String>,
    },
}

/// Fan-out channel for [`CameraEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    tx: broadcast::Sender<CameraEvent>,
}

impl EventBus {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(EVENT_CAPACITY);
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.tx.subscribe()
    }

    pub fn emit(&self, event: CameraEvent) {
        tracing::trace!(?event, "Camera event");
        // No subscribers is fine.
        let _ = self.tx.send(event);
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
