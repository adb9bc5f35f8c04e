//! Capture device descriptors, capabilities, and the device trait.

use serde::{Deserialize, Serialize};
use std::fmt;

use shutter_common::error::ShutterResult;
use shutter_common::types::CameraPosition;

use crate::NormalizedPoint;

/// Media a device produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceKind {
    Video,
    Audio,
}

impl fmt::Display for DeviceKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Video => write!(f, "video"),
            Self::Audio => write!(f, "audio"),
        }
    }
}

/// Physical device family.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DeviceType {
    DualCamera,
    DualWideCamera,
    TripleCamera,
    UltraWideCamera,
    WideAngleCamera,
    Microphone,
}

impl DeviceType {
    /// Discovery preference for video devices; lower ranks win.
    pub fn preference_rank(self) -> u8 {
        match self {
            Self::DualCamera => 0,
            Self::TripleCamera => 1,
            Self::DualWideCamera => 2,
            Self::WideAngleCamera => 3,
            Self::UltraWideCamera => 4,
            Self::Microphone => 5,
        }
    }
}

/// A discoverable device.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceInfo {
    /// Stable device identifier.
    pub id: String,
    /// Human-readable name.
    pub name: String,
    pub kind: DeviceKind,
    pub device_type: DeviceType,
    pub position: CameraPosition,
}

/// Pick the preferred video device out of a discovery result.
pub fn preferred_video_device(devices: &[DeviceInfo]) -> Option<&DeviceInfo> {
    devices
        .iter()
        .filter(|d| d.kind == DeviceKind::Video)
        .min_by_key(|d| d.device_type.preference_rank())
}

/// Focus behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FocusMode {
    Locked,
    /// Single focus pass at the point of interest, then hold.
    AutoFocus,
    #[default]
    ContinuousAutoFocus,
}

/// Exposure behaviour.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ExposureMode {
    Locked,
    /// Single exposure pass at the point of interest, then hold.
    AutoExpose,
    #[default]
    ContinuousAutoExposure,
}

/// Torch (continuous light) setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TorchMode {
    #[default]
    Off,
    On,
    Auto,
}

impl TorchMode {
    /// Next mode for a toggle. Auto collapses to off; the toggle never picks auto.
    pub fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On | Self::Auto => Self::Off,
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::On
    }
}

/// Flash (photo-time light) setting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum FlashMode {
    #[default]
    Off,
    On,
    Auto,
}

impl FlashMode {
    /// Next mode for a toggle. Auto collapses to off; the toggle never picks auto.
    pub fn toggled(self) -> Self {
        match self {
            Self::Off => Self::On,
            Self::On | Self::Auto => Self::Off,
        }
    }

    pub fn is_active(self) -> bool {
        self == Self::On
    }
}

/// What a bound device can do.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeviceCapabilities {
    pub min_zoom: f64,
    pub max_zoom: f64,
    pub focus_point_supported: bool,
    pub exposure_point_supported: bool,
    pub focus_modes: Vec<FocusMode>,
    pub exposure_modes: Vec<ExposureMode>,
    pub has_torch: bool,
    pub torch_available: bool,
    pub has_flash: bool,
    pub flash_available: bool,
}

impl DeviceCapabilities {
    /// Capabilities of a microphone, which has no adjustable optics.
    pub fn audio_only() -> Self {
        Self {
            min_zoom: 1.0,
            max_zoom: 1.0,
            focus_point_supported: false,
            exposure_point_supported: false,
            focus_modes: Vec::new(),
            exposure_modes: Vec::new(),
            has_torch: false,
            torch_available: false,
            has_flash: false,
            flash_available: false,
        }
    }

    pub fn supports_focus_mode(&self, mode: FocusMode) -> bool {
        self.focus_modes.contains(&mode)
    }

    pub fn supports_exposure_mode(&self, mode: ExposureMode) -> bool {
        self.exposure_modes.contains(&mode)
    }

    pub fn can_focus_at_point(&self) -> bool {
        self.focus_point_supported && self.supports_focus_mode(FocusMode::AutoFocus)
    }

    pub fn can_expose_at_point(&self) -> bool {
        self.exposure_point_supported && self.supports_exposure_mode(ExposureMode::AutoExpose)
    }

    pub fn torch_usable(&self) -> bool {
        self.has_torch && self.torch_available
    }

    pub fn flash_usable(&self) -> bool {
        self.has_flash && self.flash_available
    }

    /// Clamp a zoom factor into the supported range.
    pub fn clamp_zoom(&self, factor: f64) -> f64 {
        factor.clamp(self.min_zoom, self.max_zoom)
    }
}

/// A hardware device bound to the capture session as an input.
///
/// Setters are only valid while the device is locked for configuration;
/// implementations reject them otherwise.
pub trait CaptureDevice: Send {
    /// Descriptor of the underlying device.
    fn info(&self) -> &DeviceInfo;

    /// Capability flags.
    fn capabilities(&self) -> &DeviceCapabilities;

    /// Acquire exclusive configuration access.
    fn lock_for_configuration(&mut self) -> ShutterResult<()>;

    /// Release configuration access.
    fn unlock_for_configuration(&mut self);

    /// Whether configuration access is currently held.
    fn is_locked(&self) -> bool;

    fn zoom_factor(&self) -> f64;
    fn set_zoom_factor(&mut self, factor: f64) -> ShutterResult<()>;

    fn focus_mode(&self) -> FocusMode;
    fn focus_point(&self) -> Option<NormalizedPoint>;
    fn set_focus(&mut self, mode: FocusMode, point: Option<NormalizedPoint>) -> ShutterResult<()>;

    fn exposure_mode(&self) -> ExposureMode;
    fn exposure_point(&self) -> Option<NormalizedPoint>;
    fn set_exposure(
        &mut self,
        mode: ExposureMode,
        point: Option<NormalizedPoint>,
    ) -> ShutterResult<()>;

    fn torch_mode(&self) -> TorchMode;
    fn set_torch_mode(&mut self, mode: TorchMode) -> ShutterResult<()>;
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device(id: &str, device_type: DeviceType) -> DeviceInfo {
        DeviceInfo {
            id: id.to_string(),
            name: id.to_string(),
            kind: DeviceKind::Video,
            device_type,
            position: CameraPosition::Back,
        }
    }

    #[test]
    fn prefers_dual_camera() {
        let devices = vec![
            device("wide", DeviceType::WideAngleCamera),
            device("dual", DeviceType::DualCamera),
            device("ultra", DeviceType::UltraWideCamera),
        ];
        assert_eq!(preferred_video_device(&devices).unwrap().id, "dual");
        assert!(preferred_video_device(&[]).is_none());
    }

    #[test]
    fn toggles_never_choose_auto() {
        assert_eq!(TorchMode::Off.toggled(), TorchMode::On);
        assert_eq!(TorchMode::On.toggled(), TorchMode::Off);
        assert_eq!(TorchMode::Auto.toggled(), TorchMode::Off);
        assert_eq!(FlashMode::Auto.toggled(), FlashMode::Off);
        assert!(!FlashMode::Auto.is_active());
    }

    #[test]
    fn zoom_clamps_to_capability_range() {
        let caps = DeviceCapabilities {
            min_zoom: 1.0,
            max_zoom: 6.0,
            ..DeviceCapabilities::audio_only()
        };
        assert_eq!(caps.clamp_zoom(0.5), 1.0);
        assert_eq!(caps.clamp_zoom(10.0), 6.0);
        assert!(!caps.torch_usable());
    }
}
