//! Small value types shared by configuration and the engine.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Which side of the device a camera faces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CameraPosition {
    Front,
    Back,
    /// No preference; the first discovered camera wins.
    #[default]
    Unspecified,
}

impl CameraPosition {
    /// The position a flip moves to. An unspecified position flips to the
    /// front camera, matching a session that started on the back camera.
    pub fn flipped(self) -> Self {
        match self {
            Self::Front => Self::Back,
            Self::Back | Self::Unspecified => Self::Front,
        }
    }
}

impl fmt::Display for CameraPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Front => write!(f, "front"),
            Self::Back => write!(f, "back"),
            Self::Unspecified => write!(f, "unspecified"),
        }
    }
}

/// Whether the session produces still photos or continuous video.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CaptureMode {
    Photo,
    #[default]
    Video,
}

impl CaptureMode {
    pub fn toggled(self) -> Self {
        match self {
            Self::Photo => Self::Video,
            Self::Video => Self::Photo,
        }
    }
}

impl fmt::Display for CaptureMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Photo => write!(f, "photo"),
            Self::Video => write!(f, "video"),
        }
    }
}

/// Session quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionPreset {
    #[default]
    High,
    Medium,
    Low,
    Photo,
}

impl SessionPreset {
    /// Frame dimensions produced by the preset.
    pub fn dimensions(self) -> (u32, u32) {
        match self {
            Self::High => (1920, 1080),
            Self::Medium => (1280, 720),
            Self::Low => (640, 480),
            Self::Photo => (4032, 3024),
        }
    }
}

/// An authorization the app needs from the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermissionDomain {
    Camera,
    Microphone,
    PhotoLibrary,
}

impl PermissionDomain {
    pub const ALL: [PermissionDomain; 3] = [Self::Camera, Self::Microphone, Self::PhotoLibrary];
}

impl fmt::Display for PermissionDomain {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Camera => write!(f, "camera"),
            Self::Microphone => write!(f, "microphone"),
            Self::PhotoLibrary => write!(f, "photo library"),
        }
    }
}

/// Tri-state authorization result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum PermissionStatus {
    Granted,
    Denied,
    #[default]
    Undetermined,
}

impl PermissionStatus {
    pub fn is_granted(self) -> bool {
        self == Self::Granted
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flip_positions() {
        assert_eq!(CameraPosition::Front.flipped(), CameraPosition::Back);
        assert_eq!(CameraPosition::Back.flipped(), CameraPosition::Front);
        assert_eq!(CameraPosition::Unspecified.flipped(), CameraPosition::Front);
    }

    #[test]
    fn test_mode_toggle() {
        assert_eq!(CaptureMode::Photo.toggled(), CaptureMode::Video);
        assert_eq!(CaptureMode::Video.toggled().toggled(), CaptureMode::Video);
    }

    #[test]
    fn test_permission_serde_names() {
        let json = serde_json::to_string(&PermissionDomain::PhotoLibrary).unwrap();
        assert_eq!(json, "\"photo_library\"");
        let status: PermissionStatus = serde_json::from_str("\"undetermined\"").unwrap();
        assert_eq!(status, PermissionStatus::Undetermined);
    }
}
