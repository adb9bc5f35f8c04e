//! Shutter platform core contracts.
//!
//! The camera hardware, the authorization subsystem, and the photo library
//! are owned by the host. This crate describes them as data structures and
//! traits so the capture engine can drive them without coupling to a
//! concrete backend.

pub mod device;
pub mod library;
pub mod permissions;

pub use device::*;
pub use library::*;
pub use permissions::*;
pub use shutter_common::types::{
    CameraPosition, CaptureMode, PermissionDomain, PermissionStatus, SessionPreset,
};

use serde::{Deserialize, Serialize};

/// A coordinate in `[0.0, 1.0]` on both axes, relative to the preview.
///
/// Used as the point of interest for focus and exposure.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct NormalizedPoint {
    pub x: f64,
    pub y: f64,
}

impl NormalizedPoint {
    /// The center of the frame.
    pub const CENTER: NormalizedPoint = NormalizedPoint { x: 0.5, y: 0.5 };

    /// Create a point, clamping both axes into `[0.0, 1.0]`.
    pub fn new(x: f64, y: f64) -> Self {
        Self {
            x: clamp_unit(x),
            y: clamp_unit(y),
        }
    }

    /// Normalize a location inside a view of the given size.
    pub fn from_view(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self::new(x / width.max(1.0), y / height.max(1.0))
    }

    /// Denormalize back into view coordinates.
    pub fn to_view(&self, width: f64, height: f64) -> (f64, f64) {
        (self.x * width.max(1.0), self.y * height.max(1.0))
    }
}

fn clamp_unit(v: f64) -> f64 {
    if v.is_nan() {
        0.5
    } else {
        v.clamp(0.0, 1.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalizes_view_coordinates() {
        let p = NormalizedPoint::from_view(195.0, 422.0, 390.0, 844.0);
        assert!((p.x - 0.5).abs() < 1e-9);
        assert!((p.y - 0.5).abs() < 1e-9);
    }

    #[test]
    fn clamps_out_of_bounds_taps() {
        let p = NormalizedPoint::from_view(-20.0, 900.0, 390.0, 844.0);
        assert_eq!(p.x, 0.0);
        assert_eq!(p.y, 1.0);

        let nan = NormalizedPoint::new(f64::NAN, 0.2);
        assert_eq!(nan.x, 0.5);
    }

    #[test]
    fn zero_sized_view_does_not_divide_by_zero() {
        let p = NormalizedPoint::from_view(0.5, 0.5, 0.0, 0.0);
        assert!(p.x.is_finite() && p.y.is_finite());
        assert_eq!(p.to_view(100.0, 200.0), (50.0, 100.0));
    }
}
