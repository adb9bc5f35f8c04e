//! Shutter Capture Engine
//!
//! The capture session state machine. A [`CaptureSessionManager`] owns the
//! capture graph (inputs and outputs bound to a [`CaptureBackend`]),
//! permission state, and capture mode; it exposes imperative commands and
//! reports asynchronous outcomes as [`CameraEvent`]s. [`SessionRuntime`]
//! runs the manager on a single tokio task so configuration never
//! interleaves.
//!
//! # Architecture
//!
//! ```text
//! ┌────────────────┐  commands   ┌─────────────────────────────────────┐
//! │ SessionHandle  │────────────▶│ SessionRuntime (serial task)        │
//! └────────────────┘             │  ┌───────────────────────────────┐  │
//!         ▲                      │  │ CaptureSessionManager         │  │
//!         │ CameraEvent          │  │  PermissionGate  RecordingSes │  │
//!         │ (broadcast)          │  │  CaptureGraph ─▶ GraphTxn     │  │
//!         └──────────────────────┤  └──────────┬────────────────────┘  │
//!                                │             │ OutputEvent (mpsc)    │
//!                                │  ┌──────────▼────────────────────┐  │
//!                                │  │ CaptureBackend (virtual, gst) │  │
//!                                │  └───────────────────────────────┘  │
//!                                └─────────────────────────────────────┘
//! ```

pub mod backend;
pub mod device_lock;
pub mod events;
pub mod graph;
pub mod permissions;
pub mod recording;
pub mod runtime;
pub mod session;

pub use backend::{
    CaptureBackend, CapturedPhoto, OutputError, OutputErrorKind, OutputEvent, PhotoSettings,
    VideoFrame, VirtualBackend, VirtualControls,
};
#[cfg(feature = "gstreamer")]
pub use backend::GstBackend;
pub use device_lock::{with_configuration_lock, ConfigurationGuard};
pub use events::{CameraEvent, EventBus};
pub use graph::{CaptureGraph, GraphLayout, GraphTransaction, OutputKind};
pub use permissions::{PermissionGate, PermissionSnapshot};
pub use recording::{CapturedResource, RecordingPhase, ResourceKind, StopCause};
pub use runtime::{SessionHandle, SessionRuntime};
pub use session::*;
