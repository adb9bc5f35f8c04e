//! Error types shared across Shutter crates.

use std::path::PathBuf;

/// Top-level error type for Shutter operations.
///
/// Permission and discovery failures are normally folded into a
/// configuration-failed session status rather than returned to the UI;
/// they still travel as `ShutterError` inside the engine so the cause is
/// logged and reported with the status.
#[derive(Debug, thiserror::Error)]
pub enum ShutterError {
    #[error("Permission denied: {domain}")]
    PermissionDenied { domain: String },

    #[error("No {kind} device found")]
    DeviceNotFound { kind: String },

    #[error("Input binding failed: {message}")]
    InputBindingFailed { message: String },

    #[error("Output binding failed: {message}")]
    OutputBindingFailed { message: String },

    #[error("Could not lock device for configuration: {message}")]
    ConfigurationLockFailed { message: String },

    #[error("Capture failed: {message}")]
    CaptureFailed { message: String },

    #[error("Photo library write failed: {message}")]
    LibraryWriteFailed { message: String },

    #[error("Unknown camera position")]
    UnknownCameraPosition,

    #[error("No video device bound to the session")]
    NoDeviceBound,

    #[error("Invalid state: {message}")]
    InvalidState { message: String },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using ShutterError.
pub type ShutterResult<T> = Result<T, ShutterError>;

impl ShutterError {
    pub fn permission_denied(domain: impl std::fmt::Display) -> Self {
        Self::PermissionDenied {
            domain: domain.to_string(),
        }
    }

    pub fn device_not_found(kind: impl std::fmt::Display) -> Self {
        Self::DeviceNotFound {
            kind: kind.to_string(),
        }
    }

    pub fn input_binding(msg: impl Into<String>) -> Self {
        Self::InputBindingFailed {
            message: msg.into(),
        }
    }

    pub fn output_binding(msg: impl Into<String>) -> Self {
        Self::OutputBindingFailed {
            message: msg.into(),
        }
    }

    pub fn lock_failed(msg: impl Into<String>) -> Self {
        Self::ConfigurationLockFailed {
            message: msg.into(),
        }
    }

    pub fn capture(msg: impl Into<String>) -> Self {
        Self::CaptureFailed {
            message: msg.into(),
        }
    }

    pub fn library_write(msg: impl Into<String>) -> Self {
        Self::LibraryWriteFailed {
            message: msg.into(),
        }
    }

    pub fn invalid_state(msg: impl Into<String>) -> Self {
        Self::InvalidState {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_messages() {
        assert_eq!(
            ShutterError::permission_denied("camera").to_string(),
            "Permission denied: camera"
        );
        assert_eq!(
            ShutterError::device_not_found("video").to_string(),
            "No video device found"
        );
        assert_eq!(
            ShutterError::NoDeviceBound.to_string(),
            "No video device bound to the session"
        );
    }
}
