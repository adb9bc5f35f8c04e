//! List capture devices.

use shutter_platform_core::{CameraPosition, DeviceKind};

use crate::session::backend;
use crate::BackendKind;

pub fn run(kind: BackendKind) -> anyhow::Result<()> {
    let mut backend = backend(kind)?;

    println!("Cameras ({}):", backend.name());
    let cameras = backend.discover_devices(DeviceKind::Video, CameraPosition::Unspecified);
    if cameras.is_empty() {
        println!("  (none)");
    }
    for info in &cameras {
        println!(
            "  {} [{}] {:?}, {}",
            info.name, info.id, info.device_type, info.position
        );
        match backend.open_device(info) {
            Ok(device) => {
                let caps = device.capabilities();
                println!(
                    "    zoom {:.1}x-{:.1}x, focus point: {}, exposure point: {}, torch: {}, flash: {}",
                    caps.min_zoom,
                    caps.max_zoom,
                    yes_no(caps.can_focus_at_point()),
                    yes_no(caps.can_expose_at_point()),
                    yes_no(caps.torch_usable()),
                    yes_no(caps.flash_usable()),
                );
            }
            Err(e) => println!("    cannot open: {e}"),
        }
    }

    println!();
    println!("Microphones:");
    let microphones = backend.discover_devices(DeviceKind::Audio, CameraPosition::Unspecified);
    if microphones.is_empty() {
        println!("  (none)");
    }
    for info in &microphones {
        println!("  {} [{}]", info.name, info.id);
    }

    Ok(())
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}
