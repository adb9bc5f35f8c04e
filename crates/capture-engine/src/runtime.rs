//! Serial session runtime.
//!
//! One tokio task owns the [`CaptureSessionManager`] and is the only place
//! it is touched. Commands from any number of [`SessionHandle`]s and
//! completions from the backend are applied one at a time, in arrival
//! order. On spawn the task resolves permissions, configures, and starts
//! the session before it accepts the first command; commands sent in the
//! meantime wait in the queue.

use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;

use shutter_common::error::{ShutterError, ShutterResult};
use shutter_platform_core::{
    CameraPosition, CaptureMode, FlashMode, LibraryAsset, NormalizedPoint, TorchMode,
};

use crate::backend::OutputEvent;
use crate::events::{CameraEvent, EventBus};
use crate::session::{CaptureSessionManager, SessionSnapshot, ZoomDirection};

const COMMAND_QUEUE_DEPTH: usize = 32;

type Reply<T> = oneshot::Sender<ShutterResult<T>>;

enum Command {
    Start(Reply<()>),
    Stop(Reply<()>),
    ToggleCaptureMode(Reply<CaptureMode>),
    FlipCamera(Reply<CameraPosition>),
    Zoom(ZoomDirection, Reply<f64>),
    FocusAndExpose(NormalizedPoint, Reply<()>),
    RestoreContinuousFocus(Reply<()>),
    ToggleTorch(Reply<TorchMode>),
    ToggleFlash(Reply<FlashMode>),
    TakePicture(Reply<()>),
    StartRecording(Reply<()>),
    StopRecording(Reply<()>),
    Save(Reply<Vec<LibraryAsset>>),
    Discard(Reply<()>),
    Snapshot(Reply<SessionSnapshot>),
    Shutdown,
}

/// The running session task.
pub struct SessionRuntime {
    handle: SessionHandle,
    task: JoinHandle<()>,
}

impl SessionRuntime {
    /// Spawn the session task on the current tokio runtime.
    pub fn spawn(manager: CaptureSessionManager) -> Self {
        let (tx, rx) = mpsc::channel(COMMAND_QUEUE_DEPTH);
        let handle = SessionHandle {
            commands: tx,
            events: manager.events().clone(),
        };
        let task = tokio::spawn(run(manager, rx));
        Self { handle, task }
    }

    pub fn handle(&self) -> SessionHandle {
        self.handle.clone()
    }

    /// Stop the session and wait for the task to exit.
    pub async fn shutdown(self) -> ShutterResult<()> {
        // A closed queue means the task is already gone.
        let _ = self.handle.commands.send(Command::Shutdown).await;
        self.task
            .await
            .map_err(|e| ShutterError::Other(anyhow::anyhow!("session task failed: {e}")))
    }
}

async fn run(mut manager: CaptureSessionManager, mut commands: mpsc::Receiver<Command>) {
    let mut outputs = manager.take_output_receiver();
    startup(&mut manager).await;

    loop {
        tokio::select! {
            biased;
            Some(event) = next_output(&mut outputs) => manager.handle_output_event(event),
            command = commands.recv() => match command {
                Some(Command::Shutdown) | None => break,
                Some(command) => dispatch(&mut manager, command).await,
            },
        }
    }

    manager.stop();
    if let Some(rx) = outputs.as_mut() {
        while let Ok(event) = rx.try_recv() {
            manager.handle_output_event(event);
        }
    }
    tracing::debug!("Session runtime exited");
}

async fn startup(manager: &mut CaptureSessionManager) {
    let permissions = manager.request_permissions().await;
    if !permissions.capture_granted() {
        tracing::warn!(?permissions, "Capture permissions not granted; session left unconfigured");
        return;
    }
    if manager.configure().is_err() {
        return;
    }
    if let Err(e) = manager.start() {
        tracing::warn!(error = %e, "Session failed to start");
    }
}

async fn next_output(
    outputs: &mut Option<mpsc::UnboundedReceiver<OutputEvent>>,
) -> Option<OutputEvent> {
    match outputs {
        Some(rx) => rx.recv().await,
        None => std::future::pending().await,
    }
}

async fn dispatch(manager: &mut CaptureSessionManager, command: Command) {
    match command {
        Command::Start(reply) => {
            let _ = reply.send(manager.start());
        }
        Command::Stop(reply) => {
            manager.stop();
            let _ = reply.send(Ok(()));
        }
        Command::ToggleCaptureMode(reply) => {
            let _ = reply.send(manager.toggle_capture_mode());
        }
        Command::FlipCamera(reply) => {
            let _ = reply.send(manager.flip_camera());
        }
        Command::Zoom(direction, reply) => {
            let _ = reply.send(manager.zoom(direction));
        }
        Command::FocusAndExpose(point, reply) => {
            let _ = reply.send(manager.focus_and_expose(point));
        }
        Command::RestoreContinuousFocus(reply) => {
            let _ = reply.send(manager.restore_continuous_focus());
        }
        Command::ToggleTorch(reply) => {
            let _ = reply.send(manager.toggle_torch());
        }
        Command::ToggleFlash(reply) => {
            let _ = reply.send(manager.toggle_flash());
        }
        Command::TakePicture(reply) => {
            let _ = reply.send(manager.take_picture());
        }
        Command::StartRecording(reply) => {
            let _ = reply.send(manager.start_recording());
        }
        Command::StopRecording(reply) => {
            let _ = reply.send(manager.stop_recording());
        }
        Command::Save(reply) => {
            let _ = reply.send(manager.save_captured_resource().await);
        }
        Command::Discard(reply) => {
            let _ = reply.send(manager.discard());
        }
        Command::Snapshot(reply) => {
            let _ = reply.send(Ok(manager.snapshot()));
        }
        Command::Shutdown => {}
    }
}

/// Cloneable handle for sending commands to a [`SessionRuntime`].
#[derive(Clone)]
pub struct SessionHandle {
    commands: mpsc::Sender<Command>,
    events: EventBus,
}

impl SessionHandle {
    pub fn subscribe(&self) -> broadcast::Receiver<CameraEvent> {
        self.events.subscribe()
    }

    async fn call<T>(&self, command: impl FnOnce(Reply<T>) -> Command) -> ShutterResult<T> {
        let (tx, rx) = oneshot::channel();
        self.commands
            .send(command(tx))
            .await
            .map_err(|_| runtime_gone())?;
        rx.await.map_err(|_| runtime_gone())?
    }

    pub async fn start(&self) -> ShutterResult<()> {
        self.call(Command::Start).await
    }

    pub async fn stop(&self) -> ShutterResult<()> {
        self.call(Command::Stop).await
    }

    pub async fn toggle_capture_mode(&self) -> ShutterResult<CaptureMode> {
        self.call(Command::ToggleCaptureMode).await
    }

    pub async fn flip_camera(&self) -> ShutterResult<CameraPosition> {
        self.call(Command::FlipCamera).await
    }

    pub async fn zoom(&self, direction: ZoomDirection) -> ShutterResult<f64> {
        self.call(|reply| Command::Zoom(direction, reply)).await
    }

    pub async fn focus_and_expose(&self, point: NormalizedPoint) -> ShutterResult<()> {
        self.call(|reply| Command::FocusAndExpose(point, reply)).await
    }

    pub async fn restore_continuous_focus(&self) -> ShutterResult<()> {
        self.call(Command::RestoreContinuousFocus).await
    }

    pub async fn toggle_torch(&self) -> ShutterResult<TorchMode> {
        self.call(Command::ToggleTorch).await
    }

    pub async fn toggle_flash(&self) -> ShutterResult<FlashMode> {
        self.call(Command::ToggleFlash).await
    }

    pub async fn take_picture(&self) -> ShutterResult<()> {
        self.call(Command::TakePicture).await
    }

    pub async fn start_recording(&self) -> ShutterResult<()> {
        self.call(Command::StartRecording).await
    }

    pub async fn stop_recording(&self) -> ShutterResult<()> {
        self.call(Command::StopRecording).await
    }

    pub async fn save_captured_resource(&self) -> ShutterResult<Vec<LibraryAsset>> {
        self.call(Command::Save).await
    }

    pub async fn discard(&self) -> ShutterResult<()> {
        self.call(Command::Discard).await
    }

    pub async fn snapshot(&self) -> ShutterResult<SessionSnapshot> {
        self.call(Command::Snapshot).await
    }
}

fn runtime_gone() -> ShutterError {
    ShutterError::invalid_state("session runtime has shut down")
}
