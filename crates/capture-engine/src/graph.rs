//! The capture graph: inputs and outputs bound to the session.
//!
//! All mutation goes through a [`GraphTransaction`], the begin/commit
//! configuration bracket. Changes are staged on the transaction and only
//! reach the graph and the backend on [`GraphTransaction::commit`];
//! dropping an uncommitted transaction discards them. The transaction
//! borrows the graph mutably, so two brackets can never overlap.

use shutter_common::error::{ShutterError, ShutterResult};
use shutter_platform_core::{CaptureDevice, CaptureMode, DeviceInfo, SessionPreset};

use crate::backend::CaptureBackend;

/// An output sink attached to the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum OutputKind {
    Photo,
    Movie,
    /// Live frames for preview or analysis.
    FrameStream,
}

impl OutputKind {
    /// The capturing output a mode requires.
    pub fn for_mode(mode: CaptureMode) -> Self {
        match mode {
            CaptureMode::Photo => Self::Photo,
            CaptureMode::Video => Self::Movie,
        }
    }

    /// Photo and movie outputs capture; the frame stream does not.
    pub fn is_capturing(self) -> bool {
        matches!(self, Self::Photo | Self::Movie)
    }
}

/// Snapshot of a committed graph, handed to the backend.
#[derive(Debug, Clone, PartialEq, Default)]
pub struct GraphLayout {
    pub preset: SessionPreset,
    pub video_input: Option<DeviceInfo>,
    pub audio_input: Option<DeviceInfo>,
    pub outputs: Vec<OutputKind>,
}

impl GraphLayout {
    pub fn has_output(&self, kind: OutputKind) -> bool {
        self.outputs.contains(&kind)
    }
}

/// The live session graph. Owns the backend and the bound input devices.
pub struct CaptureGraph {
    backend: Box<dyn CaptureBackend>,
    preset: SessionPreset,
    video: Option<Box<dyn CaptureDevice>>,
    audio: Option<Box<dyn CaptureDevice>>,
    outputs: Vec<OutputKind>,
    commits: u64,
}

impl CaptureGraph {
    pub fn new(backend: Box<dyn CaptureBackend>) -> Self {
        Self {
            backend,
            preset: SessionPreset::default(),
            video: None,
            audio: None,
            outputs: Vec::new(),
            commits: 0,
        }
    }

    /// Open a configuration bracket.
    pub fn begin_configuration(&mut self) -> GraphTransaction<'_> {
        GraphTransaction {
            preset: self.preset,
            video: InputChange::Keep,
            audio: InputChange::Keep,
            outputs: self.outputs.clone(),
            graph: self,
        }
    }

    pub fn backend(&self) -> &dyn CaptureBackend {
        self.backend.as_ref()
    }

    pub fn backend_mut(&mut self) -> &mut dyn CaptureBackend {
        self.backend.as_mut()
    }

    pub fn preset(&self) -> SessionPreset {
        self.preset
    }

    pub fn video_device(&self) -> Option<&dyn CaptureDevice> {
        self.video.as_deref()
    }

    pub fn video_device_mut(&mut self) -> Option<&mut (dyn CaptureDevice + 'static)> {
        self.video.as_deref_mut()
    }

    pub fn audio_device(&self) -> Option<&dyn CaptureDevice> {
        self.audio.as_deref()
    }

    pub fn outputs(&self) -> &[OutputKind] {
        &self.outputs
    }

    pub fn has_output(&self, kind: OutputKind) -> bool {
        self.outputs.contains(&kind)
    }

    /// Number of committed configuration brackets.
    pub fn commit_count(&self) -> u64 {
        self.commits
    }
}

enum InputChange {
    Keep,
    Replace(Box<dyn CaptureDevice>),
}

impl InputChange {
    fn staged_info<'a>(&'a self, current: Option<&'a dyn CaptureDevice>) -> Option<&'a DeviceInfo> {
        match self {
            Self::Keep => current.map(|d| d.info()),
            Self::Replace(device) => Some(device.info()),
        }
    }
}

/// A begin/commit configuration bracket on a [`CaptureGraph`].
pub struct GraphTransaction<'a> {
    graph: &'a mut CaptureGraph,
    preset: SessionPreset,
    video: InputChange,
    audio: InputChange,
    outputs: Vec<OutputKind>,
}

impl<'a> GraphTransaction<'a> {
    pub fn set_preset(&mut self, preset: SessionPreset) {
        self.preset = preset;
    }

    /// Bind a video input, replacing any current one.
    pub fn set_video_input(&mut self, device: Box<dyn CaptureDevice>) {
        self.video = InputChange::Replace(device);
    }

    /// Bind an audio input, replacing any current one.
    pub fn set_audio_input(&mut self, device: Box<dyn CaptureDevice>) {
        self.audio = InputChange::Replace(device);
    }

    /// Attach an output. Fails when it is already attached or the backend
    /// refuses it.
    pub fn add_output(&mut self, kind: OutputKind) -> ShutterResult<()> {
        if self.outputs.contains(&kind) {
            return Err(ShutterError::output_binding(format!(
                "{kind:?} output already attached"
            )));
        }
        if !self.graph.backend.can_add_output(kind) {
            return Err(ShutterError::output_binding(format!(
                "backend cannot add {kind:?} output"
            )));
        }
        self.outputs.push(kind);
        Ok(())
    }

    /// Detach an output; detaching a missing output is a no-op.
    pub fn remove_output(&mut self, kind: OutputKind) {
        self.outputs.retain(|o| *o != kind);
    }

    /// Staged video input.
    pub fn video_input(&self) -> Option<&DeviceInfo> {
        self.video.staged_info(self.graph.video.as_deref())
    }

    /// Staged audio input.
    pub fn audio_input(&self) -> Option<&DeviceInfo> {
        self.audio.staged_info(self.graph.audio.as_deref())
    }

    pub fn outputs(&self) -> &[OutputKind] {
        &self.outputs
    }

    /// Validate the staged graph, realize it on the backend, then apply it.
    /// On error nothing changes.
    pub fn commit(mut self) -> ShutterResult<()> {
        let capturing = self.outputs.iter().filter(|o| o.is_capturing()).count();
        if capturing > 1 {
            return Err(ShutterError::output_binding(
                "only one capturing output may be attached",
            ));
        }

        let layout = GraphLayout {
            preset: self.preset,
            video_input: self.video_input().cloned(),
            audio_input: self.audio_input().cloned(),
            outputs: self.outputs.clone(),
        };
        self.graph.backend.commit_configuration(&layout)?;

        let GraphTransaction {
            graph,
            preset,
            video,
            audio,
            outputs,
        } = self;

        graph.preset = preset;
        match video {
            InputChange::Keep => {}
            InputChange::Replace(device) => graph.video = Some(device),
        }
        match audio {
            InputChange::Keep => {}
            InputChange::Replace(device) => graph.audio = Some(device),
        }
        graph.outputs = outputs;
        graph.commits += 1;

        tracing::debug!(
            preset = ?layout.preset,
            video = ?layout.video_input.as_ref().map(|d| &d.id),
            audio = ?layout.audio_input.as_ref().map(|d| &d.id),
            outputs = ?layout.outputs,
            "Committed capture graph"
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::VirtualBackend;
    use shutter_platform_core::{CameraPosition, DeviceKind};

    fn graph() -> (CaptureGraph, crate::backend::VirtualControls) {
        let backend = VirtualBackend::new();
        let controls = backend.controls();
        (CaptureGraph::new(Box::new(backend)), controls)
    }

    fn open_back_camera(graph: &mut CaptureGraph) -> Box<dyn CaptureDevice> {
        let info = graph
            .backend()
            .discover_devices(DeviceKind::Video, CameraPosition::Back)
            .remove(0);
        graph.backend_mut().open_device(&info).unwrap()
    }

    #[test]
    fn commit_applies_staged_changes() {
        let (mut graph, _) = graph();
        let camera = open_back_camera(&mut graph);

        let mut tx = graph.begin_configuration();
        tx.set_preset(SessionPreset::Medium);
        tx.set_video_input(camera);
        tx.add_output(OutputKind::Movie).unwrap();
        tx.commit().unwrap();

        assert_eq!(graph.preset(), SessionPreset::Medium);
        assert!(graph.video_device().is_some());
        assert_eq!(graph.outputs(), &[OutputKind::Movie]);
        assert_eq!(graph.commit_count(), 1);
    }

    #[test]
    fn dropped_transaction_rolls_back() {
        let (mut graph, _) = graph();
        let camera = open_back_camera(&mut graph);

        {
            let mut tx = graph.begin_configuration();
            tx.set_video_input(camera);
            tx.add_output(OutputKind::Photo).unwrap();
            assert!(tx.video_input().is_some());
        }

        assert!(graph.video_device().is_none());
        assert!(graph.outputs().is_empty());
        assert_eq!(graph.commit_count(), 0);
    }

    #[test]
    fn rejects_two_capturing_outputs() {
        let (mut graph, _) = graph();
        let mut tx = graph.begin_configuration();
        tx.add_output(OutputKind::Photo).unwrap();
        tx.add_output(OutputKind::Movie).unwrap();
        tx.add_output(OutputKind::FrameStream).unwrap();

        let err = tx.commit().unwrap_err();
        assert!(matches!(err, ShutterError::OutputBindingFailed { .. }));
        assert!(graph.outputs().is_empty());
    }

    #[test]
    fn rejects_duplicate_and_refused_outputs() {
        let (mut graph, controls) = graph();
        controls.reject_output(OutputKind::Photo);

        let mut tx = graph.begin_configuration();
        tx.add_output(OutputKind::Movie).unwrap();
        assert!(tx.add_output(OutputKind::Movie).is_err());
        assert!(tx.add_output(OutputKind::Photo).is_err());
        assert_eq!(tx.outputs(), &[OutputKind::Movie]);
    }
}
