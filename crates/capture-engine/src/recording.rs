//! Movie recording bookkeeping.
//!
//! A recording is a list of segments. Normally there is exactly one; with
//! continuous recording enabled, an interruption caused by an input device
//! change closes the current segment and opens the next, and the segments
//! are kept together for later concatenation.

use std::path::{Path, PathBuf};

use shutter_common::clock::{file_timestamp, RecordingClock};

use crate::backend::{CapturedPhoto, OutputError, OutputErrorKind};

/// File name used when movie files are not unique.
pub const SHARED_MOVIE_FILE: &str = "tmp.mov";

/// Allocates paths for in-progress movie files.
#[derive(Debug, Clone)]
pub struct MoviePaths {
    dir: PathBuf,
    unique: bool,
    counter: u64,
}

impl MoviePaths {
    pub fn new(dir: impl Into<PathBuf>, unique: bool) -> Self {
        Self {
            dir: dir.into(),
            unique,
            counter: 0,
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path for the next file. Continuation segments always get a fresh
    /// name so they never overwrite the segment before them.
    pub fn next(&mut self, continuation: bool) -> PathBuf {
        if !self.unique && !continuation {
            return self.dir.join(SHARED_MOVIE_FILE);
        }
        self.counter += 1;
        self.dir.join(format!(
            "movie_{}_{}_{:03}.mov",
            file_timestamp(),
            std::process::id(),
            self.counter
        ))
    }
}

/// Why a movie output finished.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopCause {
    StoppedByUser,
    /// The input device changed; the segment written so far is usable.
    InterruptedByDeviceChange,
    Failed,
}

impl StopCause {
    pub fn classify(error: Option<&OutputError>) -> Self {
        match error.map(|e| e.kind) {
            None => Self::StoppedByUser,
            Some(OutputErrorKind::DeviceChanged) => Self::InterruptedByDeviceChange,
            Some(OutputErrorKind::SessionStopped) | Some(OutputErrorKind::Other) => Self::Failed,
        }
    }
}

/// Progress of the active recording.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum RecordingPhase {
    #[default]
    Idle,
    /// Start requested; waiting for the hardware to confirm.
    Starting,
    Recording,
    /// Stop requested; waiting for the completion.
    Stopping,
}

/// State of one recording across its segments.
#[derive(Debug, Default)]
pub struct RecordingSession {
    phase: RecordingPhase,
    segments: Vec<PathBuf>,
    current: Option<PathBuf>,
    clock: Option<RecordingClock>,
    confirmed: bool,
}

impl RecordingSession {
    pub fn phase(&self) -> RecordingPhase {
        self.phase
    }

    /// A recording is in progress in any phase but idle.
    pub fn is_active(&self) -> bool {
        self.phase != RecordingPhase::Idle
    }

    /// The hardware has confirmed at least one segment.
    pub fn is_confirmed(&self) -> bool {
        self.confirmed
    }

    pub fn stop_requested(&self) -> bool {
        self.phase == RecordingPhase::Stopping
    }

    pub fn current_path(&self) -> Option<&Path> {
        self.current.as_deref()
    }

    pub fn segments(&self) -> &[PathBuf] {
        &self.segments
    }

    /// A first segment has been requested at `path`.
    pub fn begin(&mut self, path: PathBuf) {
        self.phase = RecordingPhase::Starting;
        self.segments.clear();
        self.current = Some(path);
        self.clock = None;
        self.confirmed = false;
    }

    /// A continuation segment has been requested at `path`.
    pub fn continue_into(&mut self, path: PathBuf) {
        self.current = Some(path);
        if self.phase != RecordingPhase::Stopping {
            self.phase = RecordingPhase::Starting;
        }
    }

    /// The hardware started writing `path`. Returns true for the first
    /// segment of the recording.
    pub fn confirm_started(&mut self, path: &Path) -> bool {
        if self.current.as_deref() != Some(path) {
            tracing::warn!(path = %path.display(), "Start confirmation for an unknown movie file");
        }
        if self.phase == RecordingPhase::Starting {
            self.phase = RecordingPhase::Recording;
        }
        if self.clock.is_none() {
            self.clock = Some(RecordingClock::start());
        }
        let first = !self.confirmed;
        self.confirmed = true;
        first
    }

    pub fn request_stop(&mut self) {
        if self.is_active() {
            self.phase = RecordingPhase::Stopping;
        }
    }

    /// Close the current segment and keep it.
    pub fn complete_segment(&mut self, path: PathBuf) {
        self.current = None;
        self.segments.push(path);
    }

    /// End the recording, returning its segments and duration.
    pub fn finish(&mut self) -> (Vec<PathBuf>, f64) {
        let duration = self.clock.take().map(|c| c.elapsed_secs()).unwrap_or(0.0);
        let segments = std::mem::take(&mut self.segments);
        *self = Self::default();
        (segments, duration)
    }

    /// End the recording without keeping anything. Returns every file it
    /// touched so the caller can remove them.
    pub fn abandon(&mut self) -> Vec<PathBuf> {
        let mut files = std::mem::take(&mut self.segments);
        files.extend(self.current.take());
        *self = Self::default();
        files
    }
}

/// Kind of captured resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResourceKind {
    Photo,
    Movie,
}

/// The most recent capture, waiting to be saved or discarded.
#[derive(Debug, Clone, PartialEq)]
pub enum CapturedResource {
    Photo(CapturedPhoto),
    Movie {
        segments: Vec<PathBuf>,
        duration_secs: f64,
    },
}

impl CapturedResource {
    pub fn kind(&self) -> ResourceKind {
        match self {
            Self::Photo(_) => ResourceKind::Photo,
            Self::Movie { .. } => ResourceKind::Movie,
        }
    }

    /// Local temporary files backing this resource.
    pub fn temp_files(&self) -> &[PathBuf] {
        match self {
            Self::Photo(_) => &[],
            Self::Movie { segments, .. } => segments,
        }
    }

    /// Remove local temporary files. Files already moved away are ignored.
    pub fn cleanup(&self) {
        remove_files(self.temp_files());
    }
}

pub(crate) fn remove_files(paths: &[PathBuf]) {
    for path in paths {
        match std::fs::remove_file(path) {
            Ok(()) => tracing::debug!(path = %path.display(), "Removed temporary movie file"),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "Failed to remove temporary file")
            }
        }
    }
}
