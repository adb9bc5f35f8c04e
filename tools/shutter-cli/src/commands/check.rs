//! Check permissions and camera availability.

use shutter_common::config::AppConfig;
use shutter_platform_core::{CameraPosition, DeviceKind};
use shutter_platform_host::permissions::{check_permissions, print_permission_report};
use shutter_platform_host::PolicyPermissionProvider;

use crate::session::backend;
use crate::BackendKind;

pub fn run(config: &AppConfig, kind: BackendKind) -> anyhow::Result<()> {
    println!("Shutter System Check");
    println!("{}", "=".repeat(50));

    let backend = match backend(kind) {
        Ok(backend) => {
            println!("[OK] Capture backend: {}", backend.name());
            Some(backend)
        }
        Err(e) => {
            println!("[FAIL] Capture backend: {e}");
            None
        }
    };

    let mut cameras_ok = false;
    let mut microphone_ok = false;
    if let Some(backend) = &backend {
        let cameras = backend.discover_devices(DeviceKind::Video, CameraPosition::Unspecified);
        let microphones = backend.discover_devices(DeviceKind::Audio, CameraPosition::Unspecified);
        cameras_ok = !cameras.is_empty();
        microphone_ok = !microphones.is_empty();

        let count = |position| cameras.iter().filter(|c| c.position == position).count();
        let tag = if cameras_ok { "[OK]" } else { "[FAIL]" };
        println!(
            "{tag} Cameras: {} back, {} front, {} other",
            count(CameraPosition::Back),
            count(CameraPosition::Front),
            count(CameraPosition::Unspecified)
        );
        let tag = if microphone_ok { "[OK]" } else { "[FAIL]" };
        println!("{tag} Microphones: {}", microphones.len());
    }
    println!("     Library: {}", config.library_dir.display());

    let provider = PolicyPermissionProvider::new(config.permissions.clone());
    let reports = check_permissions(&provider);
    println!();
    print_permission_report(&reports);

    let permissions_ok = reports
        .iter()
        .filter(|r| r.required)
        .all(|r| !matches!(r.status, shutter_platform_core::PermissionStatus::Denied));

    println!();
    if cameras_ok && microphone_ok && permissions_ok {
        println!("Camera, microphone, and permissions are in place. Shutter is ready.");
    } else {
        println!("Some requirements are missing. See above for fixes.");
    }

    Ok(())
}
