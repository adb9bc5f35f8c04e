//! Hardware capture framework abstraction.
//!
//! A backend discovers devices, realizes the committed capture graph,
//! runs the session, and services capture requests. Requests return as
//! soon as they are issued; their outcomes arrive later as
//! [`OutputEvent`]s on the sink installed with
//! [`CaptureBackend::attach_sinks`].

use std::fmt;
use std::path::{Path, PathBuf};

use tokio::sync::mpsc;

use shutter_common::error::ShutterResult;
use shutter_platform_core::{CameraPosition, CaptureDevice, DeviceInfo, DeviceKind, FlashMode};

use crate::graph::{GraphLayout, OutputKind};

pub mod virtual_camera;

#[cfg(feature = "gstreamer")]
pub mod gst;

pub use virtual_camera::{VirtualBackend, VirtualControls};

#[cfg(feature = "gstreamer")]
pub use gst::GstBackend;

/// Channel carrying asynchronous output completions.
pub type OutputSink = mpsc::UnboundedSender<OutputEvent>;

/// Channel carrying live frames. Bounded; backends drop frames when full.
pub type FrameSink = mpsc::Sender<VideoFrame>;

/// Per-request photo settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PhotoSettings {
    pub flash: FlashMode,
}

/// Encoded still image.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CapturedPhoto {
    pub data: Vec<u8>,
    /// File extension matching the encoding, e.g. `jpg` or `ppm`.
    pub extension: String,
}

/// Why an output did not finish cleanly.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputErrorKind {
    /// The session's input device changed under a running recording.
    /// The file written so far is complete and usable.
    DeviceChanged,
    /// The session stopped while the output was active.
    SessionStopped,
    /// Anything else; the output is unusable.
    Other,
}

/// Error reported in an output completion.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputError {
    pub kind: OutputErrorKind,
    pub message: String,
}

impl OutputError {
    pub fn new(kind: OutputErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }
}

impl fmt::Display for OutputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}: {}", self.kind, self.message)
    }
}

/// Completion delivered by a backend. Each request yields at most one.
#[derive(Debug, Clone, PartialEq)]
pub enum OutputEvent {
    PhotoCaptured(Result<CapturedPhoto, OutputError>),
    RecordingStarted {
        path: PathBuf,
    },
    RecordingFinished {
        path: PathBuf,
        error: Option<OutputError>,
    },
}

/// A frame from the live frame-stream output.
#[derive(Debug, Clone)]
pub struct VideoFrame {
    pub sequence: u64,
    /// Nanoseconds since the stream started.
    pub timestamp_ns: u64,
    pub width: u32,
    pub height: u32,
    /// 8-bit luma plane.
    pub data: Vec<u8>,
}

/// Abstract interface for the platform capture framework.
pub trait CaptureBackend: Send {
    /// Backend name for logging.
    fn name(&self) -> &str;

    /// Install the completion sink and, when a frame stream is wanted, the frame sink.
    fn attach_sinks(&mut self, outputs: OutputSink, frames: Option<FrameSink>);

    /// Discover devices of a kind at a position.
    fn discover_devices(&self, kind: DeviceKind, position: CameraPosition) -> Vec<DeviceInfo>;

    /// Create a session input for a discovered device.
    fn open_device(&mut self, info: &DeviceInfo) -> ShutterResult<Box<dyn CaptureDevice>>;

    /// Whether an output of this kind may be attached.
    fn can_add_output(&self, output: OutputKind) -> bool;

    /// Realize a committed graph layout.
    fn commit_configuration(&mut self, layout: &GraphLayout) -> ShutterResult<()>;

    fn start_running(&mut self) -> ShutterResult<()>;
    fn stop_running(&mut self);
    fn is_running(&self) -> bool;

    /// Issue one photo request. The result arrives as [`OutputEvent::PhotoCaptured`].
    fn capture_photo(&mut self, settings: PhotoSettings) -> ShutterResult<()>;

    /// Begin recording into `path`. Confirmed by [`OutputEvent::RecordingStarted`].
    fn start_recording(&mut self, path: &Path) -> ShutterResult<()>;

    /// Finish the active recording. Completed by [`OutputEvent::RecordingFinished`].
    fn stop_recording(&mut self) -> ShutterResult<()>;
}
