//! Capture session manager.
//!
//! Owns the capture graph, permission state, capture mode, the active
//! recording, and the most recent captured resource. Every method runs on
//! the caller's task; [`crate::runtime::SessionRuntime`] serializes calls.
//! Backend completions are fed back in through
//! [`CaptureSessionManager::handle_output_event`].

use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};

use shutter_common::config::CaptureDefaults;
use shutter_common::error::{ShutterError, ShutterResult};
use shutter_platform_core::{
    preferred_video_device, CameraPosition, CaptureMode, DeviceInfo, DeviceKind, ExposureMode,
    FlashMode, FocusMode, LibraryAsset, LibraryItem, NormalizedPoint, PermissionDomain,
    PermissionProvider, PermissionStatus, PhotoLibrary, TorchMode,
};

use crate::backend::{
    CaptureBackend, CapturedPhoto, OutputError, OutputEvent, PhotoSettings, VideoFrame,
};
use crate::device_lock::with_configuration_lock;
use crate::events::{CameraEvent, EventBus};
use crate::graph::{CaptureGraph, OutputKind};
use crate::permissions::{PermissionGate, PermissionSnapshot};
use crate::recording::{
    remove_files, CapturedResource, MoviePaths, RecordingPhase, RecordingSession, ResourceKind,
    StopCause,
};

/// Live frames queued before the backend starts dropping them.
pub const FRAME_QUEUE_DEPTH: usize = 8;

/// Why the last configuration attempt failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigurationFailure {
    PermissionDenied,
    DeviceNotFound,
    InputBinding,
    OutputBinding,
    Other,
}

impl ConfigurationFailure {
    fn from_error(error: &ShutterError) -> Self {
        match error {
            ShutterError::PermissionDenied { .. } => Self::PermissionDenied,
            ShutterError::DeviceNotFound { .. } => Self::DeviceNotFound,
            ShutterError::InputBindingFailed { .. } => Self::InputBinding,
            ShutterError::OutputBindingFailed { .. } => Self::OutputBinding,
            _ => Self::Other,
        }
    }
}

/// Session readiness.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum SessionStatus {
    #[default]
    Uninitialized,
    Configuring,
    Ready,
    ConfigurationFailed {
        failure: ConfigurationFailure,
        message: String,
    },
}

impl SessionStatus {
    pub fn is_ready(&self) -> bool {
        matches!(self, Self::Ready)
    }

    pub fn is_failed(&self) -> bool {
        matches!(self, Self::ConfigurationFailed { .. })
    }
}

impl fmt::Display for SessionStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Configuring => write!(f, "configuring"),
            Self::Ready => write!(f, "ready"),
            Self::ConfigurationFailed { message, .. } => {
                write!(f, "configuration failed: {message}")
            }
        }
    }
}

/// What a ready session is doing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CaptureActivity {
    Idle(CaptureMode),
    Recording,
    PhotoCapturing,
}

/// Zoom command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ZoomDirection {
    In,
    Out,
    /// Back to 1x.
    Reset,
}

/// Point-in-time view of the manager.
#[derive(Debug, Clone, PartialEq)]
pub struct SessionSnapshot {
    pub status: SessionStatus,
    pub permissions: PermissionSnapshot,
    pub running: bool,
    pub mode: CaptureMode,
    pub position: CameraPosition,
    pub activity: Option<CaptureActivity>,
    pub video_device: Option<DeviceInfo>,
    pub audio_device: Option<DeviceInfo>,
    pub outputs: Vec<OutputKind>,
    pub zoom: f64,
    pub zoom_range: (f64, f64),
    pub focus_point: Option<NormalizedPoint>,
    pub torch: TorchMode,
    pub flash: FlashMode,
    pub recording: bool,
    pub recording_phase: RecordingPhase,
    pub captured: Option<ResourceKind>,
}

/// The capture session state machine.
pub struct CaptureSessionManager {
    graph: CaptureGraph,
    gate: PermissionGate,
    library: Arc<dyn PhotoLibrary>,
    events: EventBus,
    settings: CaptureDefaults,
    status: SessionStatus,
    permissions: PermissionSnapshot,
    mode: CaptureMode,
    position: CameraPosition,
    flash: FlashMode,
    photo_in_flight: bool,
    recording: RecordingSession,
    movie_paths: MoviePaths,
    captured: Option<CapturedResource>,
    output_rx: Option<mpsc::UnboundedReceiver<OutputEvent>>,
    frame_rx: Option<mpsc::Receiver<VideoFrame>>,
}

impl CaptureSessionManager {
    pub fn new(
        mut backend: Box<dyn CaptureBackend>,
        permissions: Arc<dyn PermissionProvider>,
        library: Arc<dyn PhotoLibrary>,
        settings: CaptureDefaults,
    ) -> Self {
        let (output_tx, output_rx) = mpsc::unbounded_channel();
        let (frame_tx, frame_rx) = if settings.frame_stream {
            let (tx, rx) = mpsc::channel(FRAME_QUEUE_DEPTH);
            (Some(tx), Some(rx))
        } else {
            (None, None)
        };
        backend.attach_sinks(output_tx, frame_tx);
        tracing::debug!(backend = backend.name(), "Capture session created");

        Self {
            graph: CaptureGraph::new(backend),
            gate: PermissionGate::new(permissions),
            library,
            events: EventBus::new(),
            status: SessionStatus::Uninitialized,
            permissions: PermissionSnapshot::default(),
            mode: settings.initial_mode,
            position: settings.initial_position,
            flash: FlashMode::Off,
            photo_in_flight: false,
            recording: RecordingSession::default(),
            movie_paths: MoviePaths::new(settings.temp_dir.clone(), settings.unique_movie_files),
            captured: None,
            output_rx: Some(output_rx),
            frame_rx,
            settings,
        }
    }

    // ── Observation ────────────────────────────────────────────────

    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.events.subscribe()
    }

    pub fn events(&self) -> &EventBus {
        &self.events
    }

    pub fn status(&self) -> &SessionStatus {
        &self.status
    }

    pub fn permissions(&self) -> PermissionSnapshot {
        self.permissions
    }

    pub fn mode(&self) -> CaptureMode {
        self.mode
    }

    pub fn position(&self) -> CameraPosition {
        self.position
    }

    pub fn flash_mode(&self) -> FlashMode {
        self.flash
    }

    pub fn graph(&self) -> &CaptureGraph {
        &self.graph
    }

    pub fn settings(&self) -> &CaptureDefaults {
        &self.settings
    }

    pub fn is_running(&self) -> bool {
        self.graph.backend().is_running()
    }

    /// Recording flag as confirmed by the hardware.
    pub fn is_recording(&self) -> bool {
        self.recording.is_confirmed()
    }

    pub fn recording_phase(&self) -> RecordingPhase {
        self.recording.phase()
    }

    pub fn captured_resource(&self) -> Option<&CapturedResource> {
        self.captured.as_ref()
    }

    pub fn activity(&self) -> Option<CaptureActivity> {
        if !self.status.is_ready() {
            return None;
        }
        Some(if self.recording.is_active() {
            CaptureActivity::Recording
        } else if self.photo_in_flight {
            CaptureActivity::PhotoCapturing
        } else {
            CaptureActivity::Idle(self.mode)
        })
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let device = self.graph.video_device();
        SessionSnapshot {
            status: self.status.clone(),
            permissions: self.permissions,
            running: self.is_running(),
            mode: self.mode,
            position: self.position,
            activity: self.activity(),
            video_device: device.map(|d| d.info().clone()),
            audio_device: self.graph.audio_device().map(|d| d.info().clone()),
            outputs: self.graph.outputs().to_vec(),
            zoom: device.map(|d| d.zoom_factor()).unwrap_or(1.0),
            zoom_range: device
                .map(|d| (d.capabilities().min_zoom, d.capabilities().max_zoom))
                .unwrap_or((1.0, 1.0)),
            focus_point: device.and_then(|d| d.focus_point()),
            torch: device.map(|d| d.torch_mode()).unwrap_or_default(),
            flash: self.flash,
            recording: self.is_recording(),
            recording_phase: self.recording.phase(),
            captured: self.captured.as_ref().map(|c| c.kind()),
        }
    }

    /// Receiver for backend completions. Taken by the runtime; once taken,
    /// [`Self::drain_output_events`] has nothing to drain.
    pub fn take_output_receiver(&mut self) -> Option<mpsc::UnboundedReceiver<OutputEvent>> {
        self.output_rx.take()
    }

    /// Receiver for live frames, present when the frame stream is enabled.
    pub fn take_frame_receiver(&mut self) -> Option<mpsc::Receiver<VideoFrame>> {
        self.frame_rx.take()
    }

    // ── Permissions and configuration ──────────────────────────────

    /// Resolve all three permission domains. Undetermined domains are
    /// requested; a capture domain that ends up not granted fails the session.
    pub async fn request_permissions(&mut self) -> PermissionSnapshot {
        let resolved = self.gate.resolve_all().await;
        for domain in PermissionDomain::ALL {
            self.update_permission(domain, resolved.get(domain));
        }

        if let Some(domain) = resolved.first_capture_denial() {
            self.fail_configuration(&ShutterError::permission_denied(domain));
        }
        resolved
    }

    fn update_permission(&mut self, domain: PermissionDomain, status: PermissionStatus) {
        if self.permissions.get(domain) != status {
            self.permissions.set(domain, status);
            self.events
                .emit(CameraEvent::PermissionChanged { domain, status });
        }
    }

    fn set_status(&mut self, status: SessionStatus) {
        if self.status != status {
            tracing::info!(from = %self.status, to = %status, "Session status changed");
            self.status = status.clone();
            self.events.emit(CameraEvent::SessionStatusChanged(status));
        }
    }

    fn fail_configuration(&mut self, error: &ShutterError) {
        tracing::warn!(error = %error, "Session configuration failed");
        self.set_status(SessionStatus::ConfigurationFailed {
            failure: ConfigurationFailure::from_error(error),
            message: error.to_string(),
        });
    }

    fn ensure_ready(&self) -> ShutterResult<()> {
        if self.status.is_ready() {
            Ok(())
        } else {
            Err(ShutterError::invalid_state(format!(
                "session is {}",
                self.status
            )))
        }
    }

    /// Bind a camera, the microphone, and the output for the current mode.
    ///
    /// Requires camera and microphone permission. Any failure is terminal
    /// for this attempt: the status becomes configuration-failed and nothing
    /// is bound. Configuring a ready session is a no-op.
    pub fn configure(&mut self) -> ShutterResult<()> {
        if self.status.is_ready() {
            return Ok(());
        }
        if let Some(domain) = self.permissions.first_capture_denial() {
            let err = ShutterError::permission_denied(domain);
            self.fail_configuration(&err);
            return Err(err);
        }

        self.set_status(SessionStatus::Configuring);
        match self.bind_initial_graph() {
            Ok(position) => {
                self.set_status(SessionStatus::Ready);
                self.set_position(position);
                self.reset_device_defaults();
                self.publish_device_state();
                Ok(())
            }
            Err(e) => {
                self.fail_configuration(&e);
                Err(e)
            }
        }
    }

    fn bind_initial_graph(&mut self) -> ShutterResult<CameraPosition> {
        let video_info = self.discover_camera(self.position)?;
        let audio_info = self
            .graph
            .backend()
            .discover_devices(DeviceKind::Audio, CameraPosition::Unspecified)
            .into_iter()
            .next()
            .ok_or_else(|| ShutterError::device_not_found(DeviceKind::Audio))?;

        let video = self.graph.backend_mut().open_device(&video_info)?;
        let audio = self.graph.backend_mut().open_device(&audio_info)?;

        let capture_output = OutputKind::for_mode(self.mode);
        let frame_stream = self.settings.frame_stream;
        let preset = self.settings.preset;

        let mut tx = self.graph.begin_configuration();
        tx.set_preset(preset);
        tx.set_video_input(video);
        tx.set_audio_input(audio);
        tx.add_output(capture_output)?;
        if frame_stream {
            tx.add_output(OutputKind::FrameStream)?;
        }
        tx.commit()?;

        tracing::info!(
            camera = %video_info.name,
            microphone = %audio_info.name,
            mode = %self.mode,
            "Capture session configured"
        );
        Ok(video_info.position)
    }

    fn discover_camera(&self, position: CameraPosition) -> ShutterResult<DeviceInfo> {
        let devices = self
            .graph
            .backend()
            .discover_devices(DeviceKind::Video, position);
        preferred_video_device(&devices)
            .cloned()
            .ok_or_else(|| ShutterError::device_not_found(DeviceKind::Video))
    }

    fn set_position(&mut self, position: CameraPosition) {
        if self.position != position {
            self.position = position;
            self.events.emit(CameraEvent::CameraPositionChanged(position));
        }
    }

    fn publish_device_state(&mut self) {
        let flash_usable = self
            .graph
            .video_device()
            .map(|d| d.capabilities().flash_usable())
            .unwrap_or(false);
        if !flash_usable {
            self.flash = FlashMode::Off;
        }

        let (zoom, focus, torch) = match self.graph.video_device() {
            Some(d) => (d.zoom_factor(), d.focus_point(), d.torch_mode()),
            None => return,
        };
        self.events.emit(CameraEvent::CaptureModeChanged(self.mode));
        self.events.emit(CameraEvent::CameraPositionChanged(self.position));
        self.events.emit(CameraEvent::ZoomChanged(zoom));
        self.events.emit(CameraEvent::FocusChanged(focus));
        self.events.emit(CameraEvent::TorchChanged(torch));
        self.events.emit(CameraEvent::FlashChanged(self.flash));
    }

    /// Zoom 1x, continuous focus and exposure, torch off.
    fn reset_device_defaults(&mut self) {
        let Some(device) = self.graph.video_device_mut() else {
            return;
        };
        let result = with_configuration_lock(device, |d| {
            let caps = d.capabilities().clone();
            d.set_zoom_factor(caps.clamp_zoom(1.0))?;
            if caps.supports_focus_mode(FocusMode::ContinuousAutoFocus) {
                d.set_focus(FocusMode::ContinuousAutoFocus, None)?;
            }
            if caps.supports_exposure_mode(ExposureMode::ContinuousAutoExposure) {
                d.set_exposure(ExposureMode::ContinuousAutoExposure, None)?;
            }
            if caps.torch_usable() {
                d.set_torch_mode(TorchMode::Off)?;
            }
            Ok(())
        });
        if let Err(e) = result {
            tracing::warn!(error = %e, "Could not reset device defaults");
        }
    }

    // ── Running ────────────────────────────────────────────────────

    /// Start the session. A no-op when already running or not ready.
    pub fn start(&mut self) -> ShutterResult<()> {
        if !self.status.is_ready() {
            tracing::debug!(status = %self.status, "Session not ready; start ignored");
            return Ok(());
        }
        if self.is_running() {
            return Ok(());
        }
        self.graph.backend_mut().start_running()?;
        tracing::info!("Capture session started");
        self.events.emit(CameraEvent::RunningChanged(true));
        Ok(())
    }

    /// Stop the session. A no-op when already stopped.
    pub fn stop(&mut self) {
        if !self.is_running() {
            return;
        }
        self.graph.backend_mut().stop_running();
        tracing::info!("Capture session stopped");
        self.events.emit(CameraEvent::RunningChanged(false));
    }

    // ── Mode and camera ────────────────────────────────────────────

    /// Swap the photo output for the movie output or back.
    pub fn toggle_capture_mode(&mut self) -> ShutterResult<CaptureMode> {
        let target = self.mode.toggled();
        self.switch_capture_mode(target)?;
        Ok(target)
    }

    fn switch_capture_mode(&mut self, target: CaptureMode) -> ShutterResult<()> {
        self.ensure_ready()?;
        if self.mode == target {
            return Ok(());
        }
        if self.recording.is_active() || self.photo_in_flight {
            return Err(ShutterError::invalid_state(
                "cannot change capture mode during a capture",
            ));
        }

        let current_output = OutputKind::for_mode(self.mode);
        let mut tx = self.graph.begin_configuration();
        tx.remove_output(current_output);
        tx.add_output(OutputKind::for_mode(target))?;
        tx.commit()?;

        tracing::info!(from = %self.mode, to = %target, "Capture mode changed");
        self.mode = target;
        self.events.emit(CameraEvent::CaptureModeChanged(target));
        Ok(())
    }

    /// Bind the preferred camera at the opposite position. A camera with no
    /// position flips to the front camera.
    ///
    /// On failure the previous camera stays bound and the position is
    /// unchanged. When a positionless camera has no front camera to flip to,
    /// the error is `UnknownCameraPosition`. Flipping while recording is
    /// allowed; the backend reports the switch as a device-change interruption.
    pub fn flip_camera(&mut self) -> ShutterResult<CameraPosition> {
        self.ensure_ready()?;
        if self.photo_in_flight {
            return Err(ShutterError::invalid_state(
                "cannot flip camera while a photo is in flight",
            ));
        }

        match self.rebind_camera() {
            Ok(target) => {
                tracing::info!(position = %target, "Camera flipped");
                self.set_position(target);
                self.reset_device_defaults();
                self.publish_device_state();
                Ok(target)
            }
            Err(e) => {
                tracing::warn!(position = %self.position, error = %e, "Camera flip failed");
                self.events.emit(CameraEvent::CameraFlipFailed {
                    position: self.position,
                    reason: e.to_string(),
                });
                Err(e)
            }
        }
    }

    fn rebind_camera(&mut self) -> ShutterResult<CameraPosition> {
        let target = self.position.flipped();
        let info = match self.discover_camera(target) {
            Err(ShutterError::DeviceNotFound { .. })
                if self.position == CameraPosition::Unspecified =>
            {
                return Err(ShutterError::UnknownCameraPosition);
            }
            found => found?,
        };
        let device = self.graph.backend_mut().open_device(&info)?;

        let mut tx = self.graph.begin_configuration();
        tx.set_video_input(device);
        tx.commit()?;
        Ok(target)
    }

    // ── Device controls ────────────────────────────────────────────

    /// Step the zoom factor within the device range, or reset it to 1x.
    pub fn zoom(&mut self, direction: ZoomDirection) -> ShutterResult<f64> {
        let step = self.settings.zoom_step;
        let device = self
            .graph
            .video_device_mut()
            .ok_or(ShutterError::NoDeviceBound)?;

        let current = device.zoom_factor();
        let requested = match direction {
            ZoomDirection::In => current + step,
            ZoomDirection::Out => current - step,
            ZoomDirection::Reset => 1.0,
        };
        let target = device
            .capabilities()
            .clamp_zoom((requested * 1000.0).round() / 1000.0);
        if target == current {
            return Ok(current);
        }

        with_configuration_lock(device, |d| d.set_zoom_factor(target)).map_err(|e| {
            tracing::warn!(error = %e, target, "Zoom change abandoned");
            e
        })?;

        tracing::debug!(zoom = target, "Zoom changed");
        self.events.emit(CameraEvent::ZoomChanged(target));
        Ok(target)
    }

    /// Point focus and exposure at `point`. Capabilities the device lacks
    /// are skipped; a device supporting neither is left untouched.
    pub fn focus_and_expose(&mut self, point: NormalizedPoint) -> ShutterResult<()> {
        let device = self
            .graph
            .video_device_mut()
            .ok_or(ShutterError::NoDeviceBound)?;

        let focus = device.capabilities().can_focus_at_point();
        let expose = device.capabilities().can_expose_at_point();
        if !focus && !expose {
            tracing::debug!("Device has no point of interest support");
            return Ok(());
        }

        with_configuration_lock(device, |d| {
            if focus {
                d.set_focus(FocusMode::AutoFocus, Some(point))?;
            }
            if expose {
                d.set_exposure(ExposureMode::AutoExpose, Some(point))?;
            }
            Ok(())
        })
        .map_err(|e| {
            tracing::warn!(error = %e, "Focus change abandoned");
            e
        })?;

        self.events.emit(CameraEvent::FocusChanged(Some(point)));
        Ok(())
    }

    /// Return focus and exposure to their continuous modes.
    pub fn restore_continuous_focus(&mut self) -> ShutterResult<()> {
        let device = self
            .graph
            .video_device_mut()
            .ok_or(ShutterError::NoDeviceBound)?;
        let caps = device.capabilities().clone();

        with_configuration_lock(device, |d| {
            if caps.supports_focus_mode(FocusMode::ContinuousAutoFocus) {
                d.set_focus(FocusMode::ContinuousAutoFocus, None)?;
            }
            if caps.supports_exposure_mode(ExposureMode::ContinuousAutoExposure) {
                d.set_exposure(ExposureMode::ContinuousAutoExposure, None)?;
            }
            Ok(())
        })
        .map_err(|e| {
            tracing::warn!(error = %e, "Focus reset abandoned");
            e
        })?;

        self.events.emit(CameraEvent::FocusChanged(None));
        Ok(())
    }

    /// Toggle the torch between on and off. No-op without a usable torch.
    pub fn toggle_torch(&mut self) -> ShutterResult<TorchMode> {
        let device = self
            .graph
            .video_device_mut()
            .ok_or(ShutterError::NoDeviceBound)?;

        let current = device.torch_mode();
        if !device.capabilities().torch_usable() {
            tracing::debug!("Torch unavailable");
            return Ok(current);
        }

        let next = current.toggled();
        with_configuration_lock(device, |d| d.set_torch_mode(next)).map_err(|e| {
            tracing::warn!(error = %e, "Torch change abandoned");
            e
        })?;

        self.events.emit(CameraEvent::TorchChanged(next));
        Ok(next)
    }

    /// Toggle the flash used by the next photo. No-op without a usable flash.
    pub fn toggle_flash(&mut self) -> ShutterResult<FlashMode> {
        let device = self
            .graph
            .video_device()
            .ok_or(ShutterError::NoDeviceBound)?;
        if !device.capabilities().flash_usable() {
            tracing::debug!("Flash unavailable");
            return Ok(self.flash);
        }

        self.flash = self.flash.toggled();
        self.events.emit(CameraEvent::FlashChanged(self.flash));
        Ok(self.flash)
    }

    // ── Capture ────────────────────────────────────────────────────

    /// Switch to photo mode if needed, then issue one photo request.
    pub fn take_picture(&mut self) -> ShutterResult<()> {
        self.ensure_ready()?;
        if self.photo_in_flight {
            return Err(ShutterError::invalid_state(
                "a photo capture is already in flight",
            ));
        }
        if self.recording.is_active() {
            return Err(ShutterError::invalid_state(
                "cannot take a picture while recording",
            ));
        }
        if !self.is_running() {
            return Err(ShutterError::capture("session is not running"));
        }

        self.switch_capture_mode(CaptureMode::Photo)?;

        let flash_usable = self
            .graph
            .video_device()
            .map(|d| d.capabilities().flash_usable())
            .unwrap_or(false);
        let settings = PhotoSettings {
            flash: if flash_usable { self.flash } else { FlashMode::Off },
        };
        self.graph.backend_mut().capture_photo(settings)?;
        self.photo_in_flight = true;
        tracing::info!(flash = ?settings.flash, "Photo requested");
        Ok(())
    }

    /// Switch to video mode if needed, then start recording. The recording
    /// flag is raised only when the hardware confirms.
    pub fn start_recording(&mut self) -> ShutterResult<()> {
        self.ensure_ready()?;
        if self.recording.is_active() {
            return Err(ShutterError::invalid_state("already recording"));
        }
        if self.photo_in_flight {
            return Err(ShutterError::invalid_state(
                "cannot record while a photo is in flight",
            ));
        }
        if !self.is_running() {
            return Err(ShutterError::capture("session is not running"));
        }

        self.switch_capture_mode(CaptureMode::Video)?;

        // The next file may reuse the path of an unsaved movie.
        if matches!(self.captured, Some(CapturedResource::Movie { .. })) {
            tracing::info!("Discarding unsaved movie before recording");
            self.clear_captured();
        }

        let path = self.movie_paths.next(false);
        if let Some(dir) = path.parent() {
            std::fs::create_dir_all(dir)?;
        }
        self.recording.begin(path.clone());
        if let Err(e) = self.graph.backend_mut().start_recording(&path) {
            self.recording.abandon();
            return Err(e);
        }
        tracing::info!(path = %path.display(), "Recording requested");
        Ok(())
    }

    /// Ask the hardware to finish the recording. A no-op when idle.
    pub fn stop_recording(&mut self) -> ShutterResult<()> {
        match self.recording.phase() {
            RecordingPhase::Idle => {
                tracing::debug!("Not recording; stop ignored");
                Ok(())
            }
            RecordingPhase::Stopping => Ok(()),
            RecordingPhase::Starting | RecordingPhase::Recording => {
                self.recording.request_stop();
                match self.graph.backend_mut().stop_recording() {
                    // The backend already finished this file; its completion is queued.
                    Err(ShutterError::InvalidState { message }) => {
                        tracing::debug!(%message, "Stop requested while a completion is pending");
                        Ok(())
                    }
                    result => result,
                }
            }
        }
    }

    // ── Completions ────────────────────────────────────────────────

    /// Apply one backend completion.
    pub fn handle_output_event(&mut self, event: OutputEvent) {
        match event {
            OutputEvent::PhotoCaptured(result) => self.on_photo_captured(result),
            OutputEvent::RecordingStarted { path } => self.on_recording_started(path),
            OutputEvent::RecordingFinished { path, error } => {
                self.on_recording_finished(path, error)
            }
        }
    }

    /// Apply every completion queued so far, including ones raised while
    /// applying them. Returns how many were applied.
    pub fn drain_output_events(&mut self) -> usize {
        let mut applied = 0;
        loop {
            let next = match self.output_rx.as_mut() {
                Some(rx) => rx.try_recv().ok(),
                None => None,
            };
            let Some(event) = next else {
                return applied;
            };
            self.handle_output_event(event);
            applied += 1;
        }
    }

    fn on_photo_captured(&mut self, result: Result<CapturedPhoto, OutputError>) {
        if !self.photo_in_flight {
            tracing::warn!("Photo completion without a pending request");
        }
        self.photo_in_flight = false;

        match result {
            Ok(photo) => {
                tracing::info!(bytes = photo.data.len(), "Photo captured");
                self.replace_captured(CapturedResource::Photo(photo));
                self.events.emit(CameraEvent::OutputFinished {
                    kind: ResourceKind::Photo,
                    success: true,
                    message: None,
                });
                self.stop_after_capture();
            }
            Err(e) => {
                tracing::warn!(error = %e, "Photo capture failed");
                self.events.emit(CameraEvent::OutputFinished {
                    kind: ResourceKind::Photo,
                    success: false,
                    message: Some(e.to_string()),
                });
            }
        }
    }

    fn on_recording_started(&mut self, path: PathBuf) {
        if !self.recording.is_active() {
            tracing::warn!(path = %path.display(), "Recording started without a request");
            return;
        }
        if self.recording.confirm_started(&path) {
            tracing::info!(path = %path.display(), "Recording started");
            self.events.emit(CameraEvent::RecordingChanged(true));
        } else {
            tracing::debug!(path = %path.display(), "Recording segment started");
        }
    }

    fn on_recording_finished(&mut self, path: PathBuf, error: Option<OutputError>) {
        if !self.recording.is_active() {
            tracing::warn!(path = %path.display(), "Recording finished without a request");
            return;
        }

        match StopCause::classify(error.as_ref()) {
            StopCause::InterruptedByDeviceChange if self.settings.continuous_recording => {
                if self.recording.stop_requested() {
                    self.recording.complete_segment(path);
                    self.finish_recording();
                } else {
                    self.continue_recording(path);
                }
            }
            StopCause::StoppedByUser => {
                self.recording.complete_segment(path);
                self.finish_recording();
            }
            cause => {
                let confirmed = self.recording.is_confirmed();
                let mut files = self.recording.abandon();
                if !files.contains(&path) {
                    files.push(path);
                }
                remove_files(&files);

                let message = error.map(|e| e.to_string());
                tracing::warn!(?cause, error = ?message, "Recording failed");
                if confirmed {
                    self.events.emit(CameraEvent::RecordingChanged(false));
                }
                self.events.emit(CameraEvent::OutputFinished {
                    kind: ResourceKind::Movie,
                    success: false,
                    message,
                });
            }
        }
    }

    fn continue_recording(&mut self, finished: PathBuf) {
        self.recording.complete_segment(finished.clone());
        let segment = self.recording.segments().len();
        tracing::info!(path = %finished.display(), segment, "Recording segment completed");
        self.events.emit(CameraEvent::RecordingSegmentCompleted {
            path: finished,
            segment,
        });

        let next = self.movie_paths.next(true);
        self.recording.continue_into(next.clone());
        if let Err(e) = self.graph.backend_mut().start_recording(&next) {
            tracing::warn!(error = %e, "Could not continue recording; keeping completed segments");
            self.finish_recording();
        }
    }

    fn finish_recording(&mut self) {
        let confirmed = self.recording.is_confirmed();
        let (segments, duration_secs) = self.recording.finish();
        tracing::info!(
            segments = segments.len(),
            duration_secs,
            "Recording finished"
        );

        self.replace_captured(CapturedResource::Movie {
            segments,
            duration_secs,
        });
        if confirmed {
            self.events.emit(CameraEvent::RecordingChanged(false));
        }
        self.events.emit(CameraEvent::OutputFinished {
            kind: ResourceKind::Movie,
            success: true,
            message: None,
        });
        self.stop_after_capture();
    }

    fn stop_after_capture(&mut self) {
        if self.settings.stop_after_capture {
            self.stop();
        }
    }

    fn replace_captured(&mut self, resource: CapturedResource) {
        if let Some(previous) = self.captured.take() {
            tracing::debug!(kind = ?previous.kind(), "Replacing unsaved capture");
            let stale: Vec<PathBuf> = previous
                .temp_files()
                .iter()
                .filter(|p| !resource.temp_files().contains(p))
                .cloned()
                .collect();
            remove_files(&stale);
        }
        self.captured = Some(resource);
    }

    fn clear_captured(&mut self) -> bool {
        match self.captured.take() {
            Some(resource) => {
                resource.cleanup();
                self.events.emit(CameraEvent::CapturedResourceCleared);
                true
            }
            None => false,
        }
    }

    // ── Persistence ────────────────────────────────────────────────

    /// Write the captured resource to the photo library.
    ///
    /// Photo-library permission is checked again first. Whatever the
    /// outcome, the captured resource is cleared and its temporary files
    /// are removed.
    pub async fn save_captured_resource(&mut self) -> ShutterResult<Vec<LibraryAsset>> {
        let resource = self
            .captured
            .take()
            .ok_or_else(|| ShutterError::invalid_state("nothing has been captured"))?;

        let status = self.gate.resolve(PermissionDomain::PhotoLibrary).await;
        self.update_permission(PermissionDomain::PhotoLibrary, status);

        let result = if status.is_granted() {
            write_to_library(Arc::clone(&self.library), &resource).await
        } else {
            tracing::warn!(?status, "Photo library access not granted; capture not saved");
            Err(ShutterError::permission_denied(PermissionDomain::PhotoLibrary))
        };

        resource.cleanup();
        self.events.emit(CameraEvent::CapturedResourceCleared);

        match &result {
            Ok(assets) => self.events.emit(CameraEvent::LibraryWriteFinished {
                success: true,
                assets: assets.iter().map(|a| a.id.clone()).collect(),
                message: None,
            }),
            Err(e) => {
                tracing::warn!(error = %e, "Library write failed");
                self.events.emit(CameraEvent::LibraryWriteFinished {
                    success: false,
                    assets: Vec::new(),
                    message: Some(e.to_string()),
                });
            }
        }
        result
    }

    /// Drop the captured resource without saving and resume the session.
    pub fn discard(&mut self) -> ShutterResult<()> {
        if !self.clear_captured() {
            tracing::debug!("Nothing captured to discard");
        }
        self.start()
    }
}

async fn write_to_library(
    library: Arc<dyn PhotoLibrary>,
    resource: &CapturedResource,
) -> ShutterResult<Vec<LibraryAsset>> {
    match resource {
        CapturedResource::Photo(photo) => {
            let asset = library
                .save(LibraryItem::Photo {
                    data: &photo.data,
                    extension: &photo.extension,
                })
                .await?;
            Ok(vec![asset])
        }
        CapturedResource::Movie { segments, .. } => {
            let mut assets = Vec::with_capacity(segments.len());
            for segment in segments {
                assets.push(library.save(LibraryItem::Movie { path: segment }).await?);
            }
            Ok(assets)
        }
    }
}
