//! GStreamer webcam backend for Linux hosts.
//!
//! Cameras are V4L2 nodes and report no position. A flip looks for a front
//! camera, finds none, and fails with an unknown-position error. Photos are single JPEG frames; movies
//! are H.264 in a QuickTime container. There is no frame stream output.

use std::path::{Path, PathBuf};
use std::sync::OnceLock;
use std::time::{Duration, Instant};

use gst::prelude::*;
use gstreamer as gst;

use shutter_common::error::{ShutterError, ShutterResult};
use shutter_platform_core::{
    CameraPosition, CaptureDevice, DeviceCapabilities, DeviceInfo, DeviceKind, DeviceType,
    ExposureMode, FocusMode, NormalizedPoint, TorchMode,
};

use super::{
    CaptureBackend, CapturedPhoto, FrameSink, OutputError, OutputErrorKind, OutputEvent,
    OutputSink, PhotoSettings,
};
use crate::graph::{GraphLayout, OutputKind};

const EOS_TIMEOUT: Duration = Duration::from_secs(10);
const STATE_TIMEOUT_SECS: u64 = 10;

/// A launched GStreamer pipeline.
struct Pipeline {
    name: String,
    pipeline: gst::Pipeline,
}

impl Pipeline {
    fn launch(name: impl Into<String>, launch: &str) -> ShutterResult<Self> {
        init_gstreamer()?;
        let name = name.into();
        let element = gst::parse::launch(launch)
            .map_err(|e| ShutterError::capture(format!("Failed to build {name} pipeline: {e}")))?;
        let pipeline = element
            .dynamic_cast::<gst::Pipeline>()
            .map_err(|_| ShutterError::capture("Launch string did not produce a pipeline"))?;
        Ok(Self { name, pipeline })
    }

    fn play(&self) -> ShutterResult<()> {
        self.pipeline.set_state(gst::State::Playing).map_err(|e| {
            ShutterError::capture(format!("Failed to start {} pipeline: {e:?}", self.name))
        })?;
        match self
            .pipeline
            .state(gst::ClockTime::from_seconds(STATE_TIMEOUT_SECS))
        {
            (Ok(_), gst::State::Playing, _) => Ok(()),
            (Ok(_), state, _) => {
                tracing::warn!(pipeline = %self.name, ?state, "Pipeline did not reach Playing state");
                Ok(())
            }
            (Err(e), _, _) => Err(ShutterError::capture(format!(
                "{} pipeline failed to reach Playing state: {e:?}",
                self.name
            ))),
        }
    }

    /// Wait for end-of-stream. Returns the pipeline error, if one was posted.
    fn wait_for_eos(&self) -> Result<(), String> {
        let Some(bus) = self.pipeline.bus() else {
            return Err("pipeline has no bus".to_string());
        };
        let start = Instant::now();
        loop {
            let elapsed = start.elapsed();
            if elapsed >= EOS_TIMEOUT {
                return Err("timed out waiting for end of stream".to_string());
            }
            let remaining = gst::ClockTime::from_nseconds((EOS_TIMEOUT - elapsed).as_nanos() as u64);
            match bus.timed_pop(remaining) {
                Some(msg) => match msg.view() {
                    gst::MessageView::Eos(_) => return Ok(()),
                    gst::MessageView::Error(e) => return Err(e.error().to_string()),
                    _ => {}
                },
                None => return Err("timed out waiting for end of stream".to_string()),
            }
        }
    }

    /// Send EOS so the muxer can finalize, wait for it, then tear down.
    fn finish(self) -> Result<(), String> {
        let drained = if self.pipeline.send_event(gst::event::Eos::new()) {
            self.wait_for_eos()
        } else {
            Err("failed to send end of stream".to_string())
        };
        if let Err(e) = self.pipeline.set_state(gst::State::Null) {
            tracing::warn!(pipeline = %self.name, error = ?e, "Failed to reset pipeline");
        }
        drained
    }
}

fn init_gstreamer() -> ShutterResult<()> {
    static GST_INIT: OnceLock<Result<(), String>> = OnceLock::new();
    match GST_INIT.get_or_init(|| gst::init().map_err(|e| e.to_string())) {
        Ok(()) => Ok(()),
        Err(e) => Err(ShutterError::capture(format!(
            "Failed to initialize GStreamer: {e}"
        ))),
    }
}

struct ActiveRecording {
    path: PathBuf,
    pipeline: Pipeline,
    video_input: String,
}

/// Webcam capture through GStreamer.
pub struct GstBackend {
    outputs: Option<OutputSink>,
    layout: GraphLayout,
    running: bool,
    recording: Option<ActiveRecording>,
}

impl GstBackend {
    pub fn new() -> ShutterResult<Self> {
        init_gstreamer()?;
        Ok(Self {
            outputs: None,
            layout: GraphLayout::default(),
            running: false,
            recording: None,
        })
    }

    fn emit(&self, event: OutputEvent) {
        if let Some(sink) = &self.outputs {
            if sink.send(event).is_err() {
                tracing::warn!("Output sink closed; dropping completion");
            }
        }
    }

    fn video_node(&self) -> ShutterResult<String> {
        self.layout
            .video_input
            .as_ref()
            .map(|d| d.id.clone())
            .ok_or(ShutterError::NoDeviceBound)
    }

    fn finish_recording(&mut self, interruption: Option<OutputError>) {
        let Some(active) = self.recording.take() else {
            return;
        };
        let error = match active.pipeline.finish() {
            Ok(()) => interruption,
            Err(e) => Some(OutputError::new(OutputErrorKind::Other, e)),
        };
        self.emit(OutputEvent::RecordingFinished {
            path: active.path,
            error,
        });
    }
}

impl CaptureBackend for GstBackend {
    fn name(&self) -> &str {
        "gstreamer"
    }

    fn attach_sinks(&mut self, outputs: OutputSink, frames: Option<FrameSink>) {
        if frames.is_some() {
            tracing::debug!("GStreamer backend does not stream frames");
        }
        self.outputs = Some(outputs);
    }

    fn discover_devices(&self, kind: DeviceKind, position: CameraPosition) -> Vec<DeviceInfo> {
        match kind {
            DeviceKind::Video => {
                if position != CameraPosition::Unspecified {
                    return Vec::new();
                }
                webcam_nodes()
                    .into_iter()
                    .map(|(node, name)| DeviceInfo {
                        id: node,
                        name,
                        kind: DeviceKind::Video,
                        device_type: DeviceType::WideAngleCamera,
                        position: CameraPosition::Unspecified,
                    })
                    .collect()
            }
            DeviceKind::Audio => {
                if gst::ElementFactory::find("pulsesrc").is_none() {
                    return Vec::new();
                }
                vec![DeviceInfo {
                    id: "pulsesrc".to_string(),
                    name: "Default Microphone".to_string(),
                    kind: DeviceKind::Audio,
                    device_type: DeviceType::Microphone,
                    position: CameraPosition::Unspecified,
                }]
            }
        }
    }

    fn open_device(&mut self, info: &DeviceInfo) -> ShutterResult<Box<dyn CaptureDevice>> {
        if info.kind == DeviceKind::Video && !Path::new(&info.id).exists() {
            return Err(ShutterError::input_binding(format!(
                "{} is no longer present",
                info.id
            )));
        }
        Ok(Box::new(FixedDevice::new(info.clone())))
    }

    fn can_add_output(&self, output: OutputKind) -> bool {
        output != OutputKind::FrameStream
    }

    fn commit_configuration(&mut self, layout: &GraphLayout) -> ShutterResult<()> {
        let changed = match (&self.recording, &layout.video_input) {
            (Some(active), Some(next)) => active.video_input != next.id,
            (Some(_), None) => true,
            (None, _) => false,
        };
        self.layout = layout.clone();
        if changed {
            self.finish_recording(Some(OutputError::new(
                OutputErrorKind::DeviceChanged,
                "input device changed during recording",
            )));
        }
        Ok(())
    }

    fn start_running(&mut self) -> ShutterResult<()> {
        self.video_node()?;
        self.running = true;
        Ok(())
    }

    fn stop_running(&mut self) {
        self.finish_recording(Some(OutputError::new(
            OutputErrorKind::SessionStopped,
            "session stopped during recording",
        )));
        self.running = false;
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn capture_photo(&mut self, _settings: PhotoSettings) -> ShutterResult<()> {
        if !self.running {
            return Err(ShutterError::capture("session is not running"));
        }
        let node = self.video_node()?;
        let target = std::env::temp_dir().join(format!("shutter-photo-{}.jpg", std::process::id()));
        let launch = format!(
            "v4l2src device=\"{node}\" num-buffers=1 ! videoconvert ! jpegenc ! filesink location=\"{}\"",
            escape_path(&target)
        );

        let pipeline = Pipeline::launch("photo", &launch)?;
        pipeline.play()?;
        let drained = pipeline.wait_for_eos();
        if let Err(e) = pipeline.pipeline.set_state(gst::State::Null) {
            tracing::warn!(error = ?e, "Failed to reset photo pipeline");
        }

        let result = drained
            .and_then(|()| std::fs::read(&target).map_err(|e| e.to_string()))
            .map(|data| CapturedPhoto {
                data,
                extension: "jpg".to_string(),
            })
            .map_err(|e| OutputError::new(OutputErrorKind::Other, e));
        let _ = std::fs::remove_file(&target);
        self.emit(OutputEvent::PhotoCaptured(result));
        Ok(())
    }

    fn start_recording(&mut self, path: &Path) -> ShutterResult<()> {
        if !self.running {
            return Err(ShutterError::capture("session is not running"));
        }
        if self.recording.is_some() {
            return Err(ShutterError::invalid_state("already recording"));
        }
        let node = self.video_node()?;
        let (width, height) = self.layout.preset.dimensions();
        let launch = format!(
            "v4l2src device=\"{node}\" do-timestamp=true ! videoconvert ! videoscale ! video/x-raw,width={width},height={height} ! x264enc tune=zerolatency speed-preset=veryfast ! h264parse ! qtmux ! filesink location=\"{}\"",
            escape_path(path)
        );

        let pipeline = Pipeline::launch("movie", &launch)?;
        pipeline.play()?;
        self.recording = Some(ActiveRecording {
            path: path.to_path_buf(),
            pipeline,
            video_input: node,
        });
        self.emit(OutputEvent::RecordingStarted {
            path: path.to_path_buf(),
        });
        Ok(())
    }

    fn stop_recording(&mut self) -> ShutterResult<()> {
        if self.recording.is_none() {
            return Err(ShutterError::invalid_state("not recording"));
        }
        self.finish_recording(None);
        Ok(())
    }
}

/// A webcam or microphone with no adjustable optics.
struct FixedDevice {
    info: DeviceInfo,
    capabilities: DeviceCapabilities,
    locked: bool,
}

impl FixedDevice {
    fn new(info: DeviceInfo) -> Self {
        let capabilities = match info.kind {
            DeviceKind::Audio => DeviceCapabilities::audio_only(),
            DeviceKind::Video => DeviceCapabilities {
                focus_modes: vec![FocusMode::ContinuousAutoFocus],
                exposure_modes: vec![ExposureMode::ContinuousAutoExposure],
                ..DeviceCapabilities::audio_only()
            },
        };
        Self {
            info,
            capabilities,
            locked: false,
        }
    }

    fn ensure_locked(&self) -> ShutterResult<()> {
        if self.locked {
            Ok(())
        } else {
            Err(ShutterError::invalid_state("device is not locked for configuration"))
        }
    }
}

impl CaptureDevice for FixedDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn lock_for_configuration(&mut self) -> ShutterResult<()> {
        if self.locked {
            return Err(ShutterError::lock_failed("already locked"));
        }
        self.locked = true;
        Ok(())
    }

    fn unlock_for_configuration(&mut self) {
        self.locked = false;
    }

    fn is_locked(&self) -> bool {
        self.locked
    }

    fn zoom_factor(&self) -> f64 {
        1.0
    }

    fn set_zoom_factor(&mut self, factor: f64) -> ShutterResult<()> {
        self.ensure_locked()?;
        if factor != 1.0 {
            return Err(ShutterError::invalid_state("webcam zoom is fixed at 1x"));
        }
        Ok(())
    }

    fn focus_mode(&self) -> FocusMode {
        FocusMode::ContinuousAutoFocus
    }

    fn focus_point(&self) -> Option<NormalizedPoint> {
        None
    }

    fn set_focus(&mut self, mode: FocusMode, point: Option<NormalizedPoint>) -> ShutterResult<()> {
        self.ensure_locked()?;
        if mode != FocusMode::ContinuousAutoFocus || point.is_some() {
            return Err(ShutterError::invalid_state("webcam focus is not adjustable"));
        }
        Ok(())
    }

    fn exposure_mode(&self) -> ExposureMode {
        ExposureMode::ContinuousAutoExposure
    }

    fn exposure_point(&self) -> Option<NormalizedPoint> {
        None
    }

    fn set_exposure(
        &mut self,
        mode: ExposureMode,
        point: Option<NormalizedPoint>,
    ) -> ShutterResult<()> {
        self.ensure_locked()?;
        if mode != ExposureMode::ContinuousAutoExposure || point.is_some() {
            return Err(ShutterError::invalid_state("webcam exposure is not adjustable"));
        }
        Ok(())
    }

    fn torch_mode(&self) -> TorchMode {
        TorchMode::Off
    }

    fn set_torch_mode(&mut self, _mode: TorchMode) -> ShutterResult<()> {
        self.ensure_locked()?;
        Err(ShutterError::invalid_state("webcam has no torch"))
    }
}

/// V4L2 capture nodes with their sysfs names, skipping tuners and
/// capture cards.
fn webcam_nodes() -> Vec<(String, String)> {
    const SKIP: [&str; 6] = ["tuner", "dvb", "hdmi", "encoder", "decoder", "metadata"];

    (0..16u32)
        .filter_map(|idx| {
            let node = format!("/dev/video{idx}");
            if !Path::new(&node).exists() {
                return None;
            }
            let name = std::fs::read_to_string(format!("/sys/class/video4linux/video{idx}/name"))
                .map(|n| n.trim().to_string())
                .unwrap_or_else(|_| node.clone());
            let lower = name.to_lowercase();
            if SKIP.iter().any(|kw| lower.contains(kw)) {
                tracing::debug!(device = %node, name = %name, "Skipping non-webcam V4L2 device");
                return None;
            }
            Some((node, name))
        })
        .collect()
}

fn escape_path(path: &Path) -> String {
    path.to_string_lossy().replace('"', "\\\"")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn escapes_quotes_in_paths() {
        assert_eq!(escape_path(Path::new("/tmp/a\"b.mov")), "/tmp/a\\\"b.mov");
    }

    #[test]
    fn webcam_zoom_is_fixed() {
        let mut device = FixedDevice::new(DeviceInfo {
            id: "/dev/video0".to_string(),
            name: "Webcam".to_string(),
            kind: DeviceKind::Video,
            device_type: DeviceType::WideAngleCamera,
            position: CameraPosition::Unspecified,
        });
        device.lock_for_configuration().unwrap();
        assert!(device.set_zoom_factor(1.0).is_ok());
        assert!(device.set_zoom_factor(2.0).is_err());
        assert!(!device.capabilities().can_focus_at_point());
    }
}
