//! Simulated camera hardware.
//!
//! Provides a back dual camera, a back wide-angle camera, a front camera,
//! and a built-in microphone. Photos are small PPM images, movies are real
//! files, and an attached frame stream is fed from a worker thread. Faults
//! can be injected at runtime through [`VirtualControls`].

use std::collections::HashSet;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

use parking_lot::Mutex;

use shutter_common::clock::RecordingClock;
use shutter_common::error::{ShutterError, ShutterResult};
use shutter_platform_core::{
    CameraPosition, CaptureDevice, DeviceCapabilities, DeviceInfo, DeviceKind, DeviceType,
    ExposureMode, FlashMode, FocusMode, NormalizedPoint, TorchMode,
};

use super::{
    CaptureBackend, CapturedPhoto, FrameSink, OutputError, OutputErrorKind, OutputEvent,
    OutputSink, PhotoSettings, VideoFrame,
};
use crate::graph::{GraphLayout, OutputKind};

const PHOTO_WIDTH: usize = 64;
const PHOTO_HEIGHT: usize = 48;
const FRAME_WIDTH: u32 = 32;
const FRAME_HEIGHT: u32 = 18;
const FRAME_RATE_HZ: u64 = 30;

/// Fault injection and counters shared between the backend, its devices,
/// and the test or tool driving them.
#[derive(Debug, Default)]
struct VirtualState {
    missing_positions: HashSet<CameraPosition>,
    no_microphone: bool,
    fail_input_binding: bool,
    rejected_outputs: HashSet<OutputKind>,
    fail_lock: bool,
    fail_capture: bool,
    fail_recording_start: bool,
    photo_requests: u32,
    recordings_started: u32,
    commits: u32,
}

/// Handle for steering a [`VirtualBackend`] after it has been moved into a session.
#[derive(Debug, Clone, Default)]
pub struct VirtualControls {
    state: Arc<Mutex<VirtualState>>,
}

impl VirtualControls {
    /// Hide every camera at a position from discovery.
    pub fn remove_cameras_at(&self, position: CameraPosition) {
        self.state.lock().missing_positions.insert(position);
    }

    pub fn restore_cameras_at(&self, position: CameraPosition) {
        self.state.lock().missing_positions.remove(&position);
    }

    pub fn set_microphone_available(&self, available: bool) {
        self.state.lock().no_microphone = !available;
    }

    pub fn set_input_binding_failure(&self, fail: bool) {
        self.state.lock().fail_input_binding = fail;
    }

    pub fn reject_output(&self, kind: OutputKind) {
        self.state.lock().rejected_outputs.insert(kind);
    }

    pub fn allow_output(&self, kind: OutputKind) {
        self.state.lock().rejected_outputs.remove(&kind);
    }

    pub fn set_lock_failure(&self, fail: bool) {
        self.state.lock().fail_lock = fail;
    }

    pub fn set_capture_failure(&self, fail: bool) {
        self.state.lock().fail_capture = fail;
    }

    pub fn set_recording_start_failure(&self, fail: bool) {
        self.state.lock().fail_recording_start = fail;
    }

    /// Photo requests issued to the hardware.
    pub fn photo_requests(&self) -> u32 {
        self.state.lock().photo_requests
    }

    /// Recordings started on the hardware, including continuation segments.
    pub fn recordings_started(&self) -> u32 {
        self.state.lock().recordings_started
    }

    /// Configuration brackets realized on the hardware.
    pub fn commits(&self) -> u32 {
        self.state.lock().commits
    }
}

struct CameraSpec {
    info: DeviceInfo,
    capabilities: DeviceCapabilities,
}

struct ActiveRecording {
    path: PathBuf,
    file: std::fs::File,
    clock: RecordingClock,
    video_input: Option<String>,
}

struct FrameWorker {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<u64>,
}

/// Simulated capture framework.
pub struct VirtualBackend {
    cameras: Vec<CameraSpec>,
    microphone: DeviceInfo,
    controls: VirtualControls,
    outputs: Option<OutputSink>,
    frames: Option<FrameSink>,
    layout: GraphLayout,
    running: bool,
    recording: Option<ActiveRecording>,
    frame_worker: Option<FrameWorker>,
}

impl VirtualBackend {
    pub fn new() -> Self {
        Self {
            cameras: default_cameras(),
            microphone: DeviceInfo {
                id: "virtual-mic-0".to_string(),
                name: "Built-in Microphone".to_string(),
                kind: DeviceKind::Audio,
                device_type: DeviceType::Microphone,
                position: CameraPosition::Unspecified,
            },
            controls: VirtualControls::default(),
            outputs: None,
            frames: None,
            layout: GraphLayout::default(),
            running: false,
            recording: None,
            frame_worker: None,
        }
    }

    /// The default cameras plus a plugged-in webcam that reports no position.
    pub fn with_external_camera() -> Self {
        let mut backend = Self::new();
        backend.cameras.push(external_camera());
        backend
    }

    /// Shared fault-injection handle.
    pub fn controls(&self) -> VirtualControls {
        self.controls.clone()
    }

    fn emit(&self, event: OutputEvent) {
        match &self.outputs {
            Some(sink) => {
                if sink.send(event).is_err() {
                    tracing::warn!("Output sink closed; dropping completion");
                }
            }
            None => tracing::warn!("No output sink attached; dropping completion"),
        }
    }

    fn finish_recording(&mut self, error: Option<OutputError>) {
        let Some(mut active) = self.recording.take() else {
            return;
        };
        let trailer = format!("duration_secs={:.3}\n", active.clock.elapsed_secs());
        if let Err(e) = active.file.write_all(trailer.as_bytes()).and_then(|_| active.file.flush()) {
            tracing::warn!(path = %active.path.display(), error = %e, "Failed to finalize movie file");
        }
        tracing::info!(
            path = %active.path.display(),
            error = ?error.as_ref().map(|e| e.kind),
            "Virtual recording finished"
        );
        self.emit(OutputEvent::RecordingFinished {
            path: active.path,
            error,
        });
    }

    fn start_frame_worker(&mut self) {
        if self.frame_worker.is_some() || !self.layout.has_output(OutputKind::FrameStream) {
            return;
        }
        let Some(sink) = self.frames.clone() else {
            return;
        };

        let stop = Arc::new(AtomicBool::new(false));
        let worker_stop = stop.clone();
        let handle = thread::spawn(move || {
            let clock = RecordingClock::start();
            let interval = Duration::from_nanos(1_000_000_000 / FRAME_RATE_HZ);
            let mut sequence = 0u64;
            let mut dropped = 0u64;
            while !worker_stop.load(Ordering::Relaxed) {
                let frame = synthetic_frame(sequence, clock.elapsed_ns());
                match sink.try_send(frame) {
                    Ok(()) => {}
                    Err(tokio::sync::mpsc::error::TrySendError::Full(_)) => dropped += 1,
                    Err(tokio::sync::mpsc::error::TrySendError::Closed(_)) => break,
                }
                sequence += 1;
                thread::sleep(interval);
            }
            if dropped > 0 {
                tracing::debug!(dropped, "Frame stream dropped frames");
            }
            sequence
        });
        self.frame_worker = Some(FrameWorker { stop, handle });
    }

    fn stop_frame_worker(&mut self) {
        if let Some(worker) = self.frame_worker.take() {
            worker.stop.store(true, Ordering::SeqCst);
            match worker.handle.join() {
                Ok(frames) => tracing::debug!(frames, "Frame stream stopped"),
                Err(_) => tracing::warn!("Frame stream worker panicked"),
            }
        }
    }
}

impl Default for VirtualBackend {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for VirtualBackend {
    fn drop(&mut self) {
        self.stop_frame_worker();
    }
}

impl CaptureBackend for VirtualBackend {
    fn name(&self) -> &str {
        "virtual"
    }

    fn attach_sinks(&mut self, outputs: OutputSink, frames: Option<FrameSink>) {
        self.outputs = Some(outputs);
        self.frames = frames;
    }

    fn discover_devices(&self, kind: DeviceKind, position: CameraPosition) -> Vec<DeviceInfo> {
        let state = self.controls.state.lock();
        match kind {
            DeviceKind::Audio => {
                if state.no_microphone {
                    Vec::new()
                } else {
                    vec![self.microphone.clone()]
                }
            }
            DeviceKind::Video => {
                let mut devices: Vec<DeviceInfo> = self
                    .cameras
                    .iter()
                    .map(|c| c.info.clone())
                    .filter(|d| !state.missing_positions.contains(&d.position))
                    .filter(|d| position == CameraPosition::Unspecified || d.position == position)
                    .collect();
                devices.sort_by_key(|d| d.device_type.preference_rank());
                devices
            }
        }
    }

    fn open_device(&mut self, info: &DeviceInfo) -> ShutterResult<Box<dyn CaptureDevice>> {
        if self.controls.state.lock().fail_input_binding {
            return Err(ShutterError::input_binding(format!(
                "cannot create input for {}",
                info.name
            )));
        }

        let capabilities = if info.kind == DeviceKind::Audio {
            DeviceCapabilities::audio_only()
        } else {
            self.cameras
                .iter()
                .find(|c| c.info.id == info.id)
                .map(|c| c.capabilities.clone())
                .ok_or_else(|| ShutterError::input_binding(format!("unknown device {}", info.id)))?
        };

        Ok(Box::new(VirtualDevice::new(
            info.clone(),
            capabilities,
            self.controls.clone(),
        )))
    }

    fn can_add_output(&self, output: OutputKind) -> bool {
        !self.controls.state.lock().rejected_outputs.contains(&output)
    }

    fn commit_configuration(&mut self, layout: &GraphLayout) -> ShutterResult<()> {
        self.controls.state.lock().commits += 1;

        let video_changed = self
            .recording
            .as_ref()
            .map(|r| r.video_input != layout.video_input.as_ref().map(|d| d.id.clone()))
            .unwrap_or(false);
        let movie_removed = self.recording.is_some() && !layout.has_output(OutputKind::Movie);

        self.layout = layout.clone();

        if video_changed {
            self.finish_recording(Some(OutputError::new(
                OutputErrorKind::DeviceChanged,
                "input device changed during recording",
            )));
        } else if movie_removed {
            self.finish_recording(Some(OutputError::new(
                OutputErrorKind::Other,
                "movie output removed during recording",
            )));
        }

        if self.running {
            if self.layout.has_output(OutputKind::FrameStream) {
                self.start_frame_worker();
            } else {
                self.stop_frame_worker();
            }
        }
        Ok(())
    }

    fn start_running(&mut self) -> ShutterResult<()> {
        if self.layout.video_input.is_none() {
            return Err(ShutterError::NoDeviceBound);
        }
        self.running = true;
        self.start_frame_worker();
        tracing::debug!("Virtual session running");
        Ok(())
    }

    fn stop_running(&mut self) {
        if self.recording.is_some() {
            self.finish_recording(Some(OutputError::new(
                OutputErrorKind::SessionStopped,
                "session stopped during recording",
            )));
        }
        self.stop_frame_worker();
        self.running = false;
        tracing::debug!("Virtual session stopped");
    }

    fn is_running(&self) -> bool {
        self.running
    }

    fn capture_photo(&mut self, settings: PhotoSettings) -> ShutterResult<()> {
        if !self.running {
            return Err(ShutterError::capture("session is not running"));
        }
        if !self.layout.has_output(OutputKind::Photo) {
            return Err(ShutterError::capture("no photo output attached"));
        }

        let fail = {
            let mut state = self.controls.state.lock();
            state.photo_requests += 1;
            state.fail_capture
        };

        let result = if fail {
            Err(OutputError::new(OutputErrorKind::Other, "sensor readout failed"))
        } else {
            Ok(CapturedPhoto {
                data: synthetic_photo(settings.flash == FlashMode::On),
                extension: "ppm".to_string(),
            })
        };
        self.emit(OutputEvent::PhotoCaptured(result));
        Ok(())
    }

    fn start_recording(&mut self, path: &Path) -> ShutterResult<()> {
        if !self.running {
            return Err(ShutterError::capture("session is not running"));
        }
        if !self.layout.has_output(OutputKind::Movie) {
            return Err(ShutterError::capture("no movie output attached"));
        }
        if self.recording.is_some() {
            return Err(ShutterError::invalid_state("already recording"));
        }
        if self.controls.state.lock().fail_recording_start {
            return Err(ShutterError::capture("movie writer unavailable"));
        }

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let mut file = std::fs::File::create(path)?;
        let clock = RecordingClock::start();
        let video_input = self.layout.video_input.as_ref().map(|d| d.id.clone());
        writeln!(
            file,
            "SHUTTER-MOVIE\ndevice={}\npreset={:?}\nstarted={}",
            video_input.as_deref().unwrap_or("none"),
            self.layout.preset,
            clock.epoch_wall()
        )?;

        self.controls.state.lock().recordings_started += 1;
        self.recording = Some(ActiveRecording {
            path: path.to_path_buf(),
            file,
            clock,
            video_input,
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

/// A simulated camera or microphone.
pub struct VirtualDevice {
    info: DeviceInfo,
    capabilities: DeviceCapabilities,
    controls: VirtualControls,
    locked: bool,
    zoom: f64,
    focus_mode: FocusMode,
    focus_point: Option<NormalizedPoint>,
    exposure_mode: ExposureMode,
    exposure_point: Option<NormalizedPoint>,
    torch: TorchMode,
}

impl VirtualDevice {
    fn new(info: DeviceInfo, capabilities: DeviceCapabilities, controls: VirtualControls) -> Self {
        Self {
            info,
            capabilities,
            controls,
            locked: false,
            zoom: 1.0,
            focus_mode: FocusMode::ContinuousAutoFocus,
            focus_point: None,
            exposure_mode: ExposureMode::ContinuousAutoExposure,
            exposure_point: None,
            torch: TorchMode::Off,
        }
    }

    fn ensure_locked(&self) -> ShutterResult<()> {
        if self.locked {
            Ok(())
        } else {
            Err(ShutterError::invalid_state(format!(
                "{} is not locked for configuration",
                self.info.name
            )))
        }
    }
}

impl CaptureDevice for VirtualDevice {
    fn info(&self) -> &DeviceInfo {
        &self.info
    }

    fn capabilities(&self) -> &DeviceCapabilities {
        &self.capabilities
    }

    fn lock_for_configuration(&mut self) -> ShutterResult<()> {
        if self.controls.state.lock().fail_lock {
            return Err(ShutterError::lock_failed(format!("{} is busy", self.info.name)));
        }
        if self.locked {
            return Err(ShutterError::lock_failed(format!(
                "{} is already locked",
                self.info.name
            )));
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
        self.zoom
    }

    fn set_zoom_factor(&mut self, factor: f64) -> ShutterResult<()> {
        self.ensure_locked()?;
        let caps = &self.capabilities;
        if !(caps.min_zoom..=caps.max_zoom).contains(&factor) {
            return Err(ShutterError::invalid_state(format!(
                "zoom factor {factor} outside [{}, {}]",
                caps.min_zoom, caps.max_zoom
            )));
        }
        self.zoom = factor;
        Ok(())
    }

    fn focus_mode(&self) -> FocusMode {
        self.focus_mode
    }

    fn focus_point(&self) -> Option<NormalizedPoint> {
        self.focus_point
    }

    fn set_focus(&mut self, mode: FocusMode, point: Option<NormalizedPoint>) -> ShutterResult<()> {
        self.ensure_locked()?;
        if !self.capabilities.supports_focus_mode(mode) {
            return Err(ShutterError::invalid_state(format!(
                "focus mode {mode:?} unsupported"
            )));
        }
        if point.is_some() && !self.capabilities.focus_point_supported {
            return Err(ShutterError::invalid_state("focus point of interest unsupported"));
        }
        self.focus_mode = mode;
        self.focus_point = point;
        Ok(())
    }

    fn exposure_mode(&self) -> ExposureMode {
        self.exposure_mode
    }

    fn exposure_point(&self) -> Option<NormalizedPoint> {
        self.exposure_point
    }

    fn set_exposure(
        &mut self,
        mode: ExposureMode,
        point: Option<NormalizedPoint>,
    ) -> ShutterResult<()> {
        self.ensure_locked()?;
        if !self.capabilities.supports_exposure_mode(mode) {
            return Err(ShutterError::invalid_state(format!(
                "exposure mode {mode:?} unsupported"
            )));
        }
        if point.is_some() && !self.capabilities.exposure_point_supported {
            return Err(ShutterError::invalid_state(
                "exposure point of interest unsupported",
            ));
        }
        self.exposure_mode = mode;
        self.exposure_point = point;
        Ok(())
    }

    fn torch_mode(&self) -> TorchMode {
        self.torch
    }

    fn set_torch_mode(&mut self, mode: TorchMode) -> ShutterResult<()> {
        self.ensure_locked()?;
        if !self.capabilities.torch_usable() {
            return Err(ShutterError::invalid_state("torch unavailable"));
        }
        self.torch = mode;
        Ok(())
    }
}

fn default_cameras() -> Vec<CameraSpec> {
    let rear = DeviceCapabilities {
        min_zoom: 1.0,
        max_zoom: 10.0,
        focus_point_supported: true,
        exposure_point_supported: true,
        focus_modes: vec![
            FocusMode::Locked,
            FocusMode::AutoFocus,
            FocusMode::ContinuousAutoFocus,
        ],
        exposure_modes: vec![
            ExposureMode::Locked,
            ExposureMode::AutoExpose,
            ExposureMode::ContinuousAutoExposure,
        ],
        has_torch: true,
        torch_available: true,
        has_flash: true,
        flash_available: true,
    };
    let front = DeviceCapabilities {
        min_zoom: 1.0,
        max_zoom: 4.0,
        focus_point_supported: false,
        exposure_point_supported: true,
        focus_modes: vec![FocusMode::Locked],
        exposure_modes: vec![
            ExposureMode::Locked,
            ExposureMode::AutoExpose,
            ExposureMode::ContinuousAutoExposure,
        ],
        has_torch: false,
        torch_available: false,
        has_flash: false,
        flash_available: false,
    };

    vec![
        CameraSpec {
            info: DeviceInfo {
                id: "virtual-back-wide".to_string(),
                name: "Back Wide Camera".to_string(),
                kind: DeviceKind::Video,
                device_type: DeviceType::WideAngleCamera,
                position: CameraPosition::Back,
            },
            capabilities: DeviceCapabilities {
                max_zoom: 5.0,
                ..rear.clone()
            },
        },
        CameraSpec {
            info: DeviceInfo {
                id: "virtual-back-dual".to_string(),
                name: "Back Dual Camera".to_string(),
                kind: DeviceKind::Video,
                device_type: DeviceType::DualCamera,
                position: CameraPosition::Back,
            },
            capabilities: rear,
        },
        CameraSpec {
            info: DeviceInfo {
                id: "virtual-front".to_string(),
                name: "Front Camera".to_string(),
                kind: DeviceKind::Video,
                device_type: DeviceType::WideAngleCamera,
                position: CameraPosition::Front,
            },
            capabilities: front,
        },
    ]
}

fn external_camera() -> CameraSpec {
    CameraSpec {
        info: DeviceInfo {
            id: "virtual-external".to_string(),
            name: "USB Camera".to_string(),
            kind: DeviceKind::Video,
            device_type: DeviceType::WideAngleCamera,
            position: CameraPosition::Unspecified,
        },
        capabilities: DeviceCapabilities {
            focus_modes: vec![FocusMode::ContinuousAutoFocus],
            exposure_modes: vec![ExposureMode::ContinuousAutoExposure],
            ..DeviceCapabilities::audio_only()
        },
    }
}

/// Binary PPM gradient; brighter when the flash fired.
fn synthetic_photo(flash: bool) -> Vec<u8> {
    let boost: u16 = if flash { 64 } else { 0 };
    let mut data = format!("P6\n{PHOTO_WIDTH} {PHOTO_HEIGHT}\n255\n").into_bytes();
    data.reserve(PHOTO_WIDTH * PHOTO_HEIGHT * 3);
    for y in 0..PHOTO_HEIGHT {
        for x in 0..PHOTO_WIDTH {
            let r = (x * 255 / PHOTO_WIDTH) as u16 + boost;
            let g = (y * 255 / PHOTO_HEIGHT) as u16 + boost;
            let b = 128 + boost;
            data.extend([r.min(255) as u8, g.min(255) as u8, b.min(255) as u8]);
        }
    }
    data
}

fn synthetic_frame(sequence: u64, timestamp_ns: u64) -> VideoFrame {
    let shift = (sequence % 256) as u32;
    let data = (0..FRAME_WIDTH * FRAME_HEIGHT)
        .map(|i| ((i % FRAME_WIDTH) * 8 + shift) as u8)
        .collect();
    VideoFrame {
        sequence,
        timestamp_ns,
        width: FRAME_WIDTH,
        height: FRAME_HEIGHT,
        data,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    fn layout_with(backend: &VirtualBackend, position: CameraPosition, output: OutputKind) -> GraphLayout {
        GraphLayout {
            video_input: backend
                .discover_devices(DeviceKind::Video, position)
                .into_iter()
                .next(),
            audio_input: backend
                .discover_devices(DeviceKind::Audio, position)
                .into_iter()
                .next(),
            outputs: vec![output],
            ..GraphLayout::default()
        }
    }

    #[test]
    fn discovery_filters_by_position_and_ranks_dual_first() {
        let backend = VirtualBackend::new();
        let back = backend.discover_devices(DeviceKind::Video, CameraPosition::Back);
        assert_eq!(back.len(), 2);
        assert_eq!(back[0].device_type, DeviceType::DualCamera);

        let front = backend.discover_devices(DeviceKind::Video, CameraPosition::Front);
        assert_eq!(front.len(), 1);

        backend.controls().remove_cameras_at(CameraPosition::Front);
        assert!(backend
            .discover_devices(DeviceKind::Video, CameraPosition::Front)
            .is_empty());
    }

    #[test]
    fn photo_request_emits_one_completion() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend = VirtualBackend::new();
        backend.attach_sinks(tx, None);
        let layout = layout_with(&backend, CameraPosition::Back, OutputKind::Photo);
        backend.commit_configuration(&layout).unwrap();
        backend.start_running().unwrap();

        backend.capture_photo(PhotoSettings::default()).unwrap();

        match rx.try_recv().unwrap() {
            OutputEvent::PhotoCaptured(Ok(photo)) => {
                assert!(photo.data.starts_with(b"P6\n64 48\n255\n"));
                assert_eq!(photo.extension, "ppm");
            }
            other => panic!("unexpected event {other:?}"),
        }
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn capture_requires_running_session() {
        let mut backend = VirtualBackend::new();
        assert!(backend.capture_photo(PhotoSettings::default()).is_err());
    }

    #[test]
    fn switching_video_input_interrupts_recording() {
        let dir = tempfile::tempdir().unwrap();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let mut backend = VirtualBackend::new();
        backend.attach_sinks(tx, None);
        backend
            .commit_configuration(&layout_with(&backend, CameraPosition::Back, OutputKind::Movie))
            .unwrap();
        backend.start_running().unwrap();

        let path = dir.path().join("tmp.mov");
        backend.start_recording(&path).unwrap();
        assert!(matches!(
            rx.try_recv().unwrap(),
            OutputEvent::RecordingStarted { .. }
        ));

        backend
            .commit_configuration(&layout_with(&backend, CameraPosition::Front, OutputKind::Movie))
            .unwrap();

        match rx.try_recv().unwrap() {
            OutputEvent::RecordingFinished { path: finished, error } => {
                assert_eq!(finished, path);
                assert_eq!(error.unwrap().kind, OutputErrorKind::DeviceChanged);
            }
            other => panic!("unexpected event {other:?}"),
        }
        let contents = std::fs::read_to_string(&path).unwrap();
        assert!(contents.starts_with("SHUTTER-MOVIE"));
        assert!(contents.contains("duration_secs="));
    }

    #[test]
    fn frame_stream_delivers_frames_while_running() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let (frame_tx, mut frame_rx) = mpsc::channel(4);
        let mut backend = VirtualBackend::new();
        backend.attach_sinks(tx, Some(frame_tx));

        let mut layout = layout_with(&backend, CameraPosition::Back, OutputKind::Photo);
        layout.outputs.push(OutputKind::FrameStream);
        backend.commit_configuration(&layout).unwrap();
        backend.start_running().unwrap();

        let frame = frame_rx.blocking_recv().unwrap();
        assert_eq!(frame.sequence, 0);
        assert_eq!(frame.data.len(), (FRAME_WIDTH * FRAME_HEIGHT) as usize);

        backend.stop_running();
        assert!(!backend.is_running());
    }
}
