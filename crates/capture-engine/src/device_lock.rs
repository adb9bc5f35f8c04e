//! Exclusive device configuration access.

use std::ops::{Deref, DerefMut};

use shutter_common::error::ShutterResult;
use shutter_platform_core::CaptureDevice;

/// Holds a device's configuration lock; releases it when dropped.
///
/// Acquire, mutate, and drop within one synchronous call. The guard
/// borrows the device, so it cannot outlive the call that owns the session.
pub struct ConfigurationGuard<'a> {
    device: &'a mut (dyn CaptureDevice + 'a),
}

impl<'a> ConfigurationGuard<'a> {
    pub fn acquire(device: &'a mut (dyn CaptureDevice + 'a)) -> ShutterResult<Self> {
        device.lock_for_configuration()?;
        Ok(Self { device })
    }
}

impl<'a> Deref for ConfigurationGuard<'a> {
    type Target = dyn CaptureDevice + 'a;

    fn deref(&self) -> &Self::Target {
        &*self.device
    }
}

impl<'a> DerefMut for ConfigurationGuard<'a> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut *self.device
    }
}

impl Drop for ConfigurationGuard<'_> {
    fn drop(&mut self) {
        self.device.unlock_for_configuration();
    }
}

/// Run `f` with the device locked for configuration.
///
/// The lock is released on every exit path, including when `f` fails.
pub fn with_configuration_lock<'a, R>(
    device: &'a mut (dyn CaptureDevice + 'a),
    f: impl FnOnce(&mut ConfigurationGuard<'a>) -> ShutterResult<R>,
) -> ShutterResult<R> {
    let mut guard = ConfigurationGuard::acquire(device)?;
    f(&mut guard)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{CaptureBackend, VirtualBackend};
    use shutter_common::error::ShutterError;
    use shutter_platform_core::{CameraPosition, DeviceKind};

    fn back_camera() -> (Box<dyn CaptureDevice>, crate::backend::VirtualControls) {
        let mut backend = VirtualBackend::new();
        let controls = backend.controls();
        let info = backend
            .discover_devices(DeviceKind::Video, CameraPosition::Back)
            .remove(0);
        (backend.open_device(&info).unwrap(), controls)
    }

    #[test]
    fn guard_unlocks_on_drop() {
        let (mut device, _) = back_camera();
        {
            let mut guard = ConfigurationGuard::acquire(device.as_mut()).unwrap();
            assert!(guard.is_locked());
            guard.set_zoom_factor(2.0).unwrap();
        }
        assert!(!device.is_locked());
        assert!((device.zoom_factor() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn lock_released_when_mutation_fails() {
        let (mut device, _) = back_camera();
        let result = with_configuration_lock(device.as_mut(), |d| d.set_zoom_factor(1000.0));
        assert!(result.is_err());
        assert!(!device.is_locked());
    }

    #[test]
    fn acquisition_failure_is_reported() {
        let (mut device, controls) = back_camera();
        controls.set_lock_failure(true);

        let err = with_configuration_lock(device.as_mut(), |d| d.set_zoom_factor(2.0))
            .unwrap_err();
        assert!(matches!(err, ShutterError::ConfigurationLockFailed { .. }));
        assert!(!device.is_locked());
        assert!((device.zoom_factor() - 1.0).abs() < 1e-9);
    }

    #[test]
    fn setters_require_the_lock() {
        let (mut device, _) = back_camera();
        assert!(device.set_zoom_factor(2.0).is_err());
    }
}
