//! Application configuration.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::error::{ShutterError, ShutterResult};
use crate::types::{CameraPosition, CaptureMode, PermissionDomain, PermissionStatus, SessionPreset};

/// Global application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Directory the photo library writes captured resources into.
    pub library_dir: PathBuf,

    /// Capture session defaults.
    pub capture: CaptureDefaults,

    /// Host permission answers.
    pub permissions: PermissionPolicy,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Default capture session parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureDefaults {
    /// Capture mode the session is configured with.
    pub initial_mode: CaptureMode,

    /// Camera position used for the first device discovery.
    pub initial_position: CameraPosition,

    /// Session quality preset.
    pub preset: SessionPreset,

    /// Zoom factor increment for a single zoom in/out step.
    pub zoom_step: f64,

    /// Stop the session after a completed capture ("shoot, then preview").
    /// When false the session keeps running for multi-shot flows.
    pub stop_after_capture: bool,

    /// Restart recording into a new segment when the input device changes
    /// mid-recording instead of ending the recording.
    pub continuous_recording: bool,

    /// Generate a fresh file per recording instead of reusing `tmp.mov`.
    pub unique_movie_files: bool,

    /// Attach a live frame-stream output next to the capture output.
    pub frame_stream: bool,

    /// Directory for in-progress movie files.
    pub temp_dir: PathBuf,
}

/// Answers the host permission provider gives for each domain.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PermissionPolicy {
    /// Status reported before any request has been made.
    pub initial: BTreeMap<PermissionDomain, PermissionStatus>,

    /// Status an undetermined domain resolves to once requested.
    pub on_request: BTreeMap<PermissionDomain, PermissionStatus>,

    /// Simulated user response delay in milliseconds.
    pub response_delay_ms: u64,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "shutter_capture_engine=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,

    /// Optional log file path.
    pub file: Option<PathBuf>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            library_dir: default_library_dir(),
            capture: CaptureDefaults::default(),
            permissions: PermissionPolicy::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for CaptureDefaults {
    fn default() -> Self {
        Self {
            initial_mode: CaptureMode::Video,
            initial_position: CameraPosition::Unspecified,
            preset: SessionPreset::High,
            zoom_step: 0.1,
            stop_after_capture: true,
            continuous_recording: false,
            unique_movie_files: false,
            frame_stream: false,
            temp_dir: std::env::temp_dir().join("shutter"),
        }
    }
}

impl Default for PermissionPolicy {
    fn default() -> Self {
        let initial = PermissionDomain::ALL
            .iter()
            .map(|d| (*d, PermissionStatus::Undetermined))
            .collect();
        let on_request = PermissionDomain::ALL
            .iter()
            .map(|d| (*d, PermissionStatus::Granted))
            .collect();
        Self {
            initial,
            on_request,
            response_delay_ms: 0,
        }
    }
}

impl PermissionPolicy {
    /// A policy where every domain is already granted.
    pub fn all_granted() -> Self {
        Self::uniform(PermissionStatus::Granted)
    }

    /// A policy where every domain starts with the same status.
    pub fn uniform(status: PermissionStatus) -> Self {
        Self {
            initial: PermissionDomain::ALL.iter().map(|d| (*d, status)).collect(),
            ..Self::default()
        }
    }

    pub fn initial_status(&self, domain: PermissionDomain) -> PermissionStatus {
        self.initial.get(&domain).copied().unwrap_or_default()
    }

    pub fn requested_status(&self, domain: PermissionDomain) -> PermissionStatus {
        self.on_request
            .get(&domain)
            .copied()
            .unwrap_or(PermissionStatus::Denied)
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
            file: None,
        }
    }
}

impl AppConfig {
    /// Load config from the standard location. A missing file yields defaults.
    pub fn load() -> ShutterResult<Self> {
        Self::load_from(&config_file_path())
    }

    /// Load config from an explicit path. A missing file yields defaults;
    /// an unreadable or malformed one is an error.
    pub fn load_from(config_path: &Path) -> ShutterResult<Self> {
        if !config_path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(config_path)?;
        serde_json::from_str(&content).map_err(|e| {
            ShutterError::config(format!("failed to parse {}: {e}", config_path.display()))
        })
    }

    /// Save config to the standard location.
    pub fn save(&self) -> Result<PathBuf, std::io::Error> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, config_path: &Path) -> Result<(), std::io::Error> {
        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self).map_err(std::io::Error::other)?;
        std::fs::write(config_path, json)
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("shutter").join("config.json")
}

/// Default photo library directory.
fn default_library_dir() -> PathBuf {
    let base = std::env::var("XDG_PICTURES_DIR")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join("Pictures")
        });
    base.join("Shutter")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_source_behavior() {
        let config = AppConfig::default();
        assert_eq!(config.capture.initial_mode, CaptureMode::Video);
        assert!((config.capture.zoom_step - 0.1).abs() < 1e-9);
        assert!(config.capture.stop_after_capture);
        assert_eq!(
            config.permissions.initial_status(PermissionDomain::Camera),
            PermissionStatus::Undetermined
        );
        assert_eq!(
            config.permissions.requested_status(PermissionDomain::PhotoLibrary),
            PermissionStatus::Granted
        );
    }

    #[test]
    fn test_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = AppConfig::default();
        config.capture.continuous_recording = true;
        config.permissions = PermissionPolicy::uniform(PermissionStatus::Denied);
        config.save_to(&path).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert!(loaded.capture.continuous_recording);
        assert_eq!(
            loaded.permissions.initial_status(PermissionDomain::Microphone),
            PermissionStatus::Denied
        );
    }

    #[test]
    fn test_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{ "capture": { "zoom_step": 0.25 } }"#).unwrap();

        let loaded = AppConfig::load_from(&path).unwrap();
        assert!((loaded.capture.zoom_step - 0.25).abs() < 1e-9);
        assert_eq!(loaded.logging.level, "info");
    }

    #[test]
    fn test_missing_file_yields_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = AppConfig::load_from(&dir.path().join("absent.json")).unwrap();
        assert_eq!(loaded.capture.preset, SessionPreset::High);
    }

    #[test]
    fn test_unparseable_file_is_a_config_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "not json").unwrap();

        let err = AppConfig::load_from(&path).unwrap_err();
        assert!(matches!(err, ShutterError::Config { .. }));
        assert!(err.to_string().contains("config.json"));
    }
}
