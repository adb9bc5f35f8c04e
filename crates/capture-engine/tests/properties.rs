use std::sync::Arc;

use proptest::prelude::*;

use shutter_capture_engine::{
    CaptureSessionManager, OutputKind, VirtualBackend, VirtualControls, ZoomDirection,
};
use shutter_common::config::{CaptureDefaults, PermissionPolicy};
use shutter_platform_core::CameraPosition;
use shutter_platform_host::{DirectoryLibrary, PolicyPermissionProvider};

fn running_manager(dir: &tempfile::TempDir) -> (CaptureSessionManager, VirtualControls) {
    let backend = VirtualBackend::new();
    let controls = backend.controls();
    let settings = CaptureDefaults {
        temp_dir: dir.path().join("tmp"),
        stop_after_capture: false,
        ..CaptureDefaults::default()
    };
    let mut manager = CaptureSessionManager::new(
        Box::new(backend),
        Arc::new(PolicyPermissionProvider::new(PermissionPolicy::all_granted())),
        Arc::new(DirectoryLibrary::new(dir.path().join("library"))),
        settings,
    );

    let rt = tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
        .expect("runtime should build");
    rt.block_on(manager.request_permissions());
    manager.configure().expect("configuration should succeed");
    manager.start().expect("session should start");
    (manager, controls)
}

#[derive(Debug, Clone, Copy)]
enum Op {
    ToggleMode,
    Flip,
    Photo,
    Record,
    StopRecording,
    HideFront,
    RestoreFront,
}

fn op() -> impl Strategy<Value = Op> {
    prop_oneof![
        3 => Just(Op::ToggleMode),
        2 => Just(Op::Flip),
        2 => Just(Op::Photo),
        1 => Just(Op::Record),
        1 => Just(Op::StopRecording),
        1 => Just(Op::HideFront),
        1 => Just(Op::RestoreFront),
    ]
}

fn zoom_direction() -> impl Strategy<Value = ZoomDirection> {
    prop_oneof![
        4 => Just(ZoomDirection::In),
        3 => Just(ZoomDirection::Out),
        1 => Just(ZoomDirection::Reset),
    ]
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn exactly_one_capturing_output_and_a_bound_camera(ops in prop::collection::vec(op(), 0..24)) {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, controls) = running_manager(&dir);

        for op in ops {
            // Individual commands may be refused; the invariants must hold regardless.
            let _ = match op {
                Op::ToggleMode => manager.toggle_capture_mode().map(|_| ()),
                Op::Flip => manager.flip_camera().map(|_| ()),
                Op::Photo => manager.take_picture(),
                Op::Record => manager.start_recording(),
                Op::StopRecording => manager.stop_recording(),
                Op::HideFront => {
                    controls.remove_cameras_at(CameraPosition::Front);
                    Ok(())
                }
                Op::RestoreFront => {
                    controls.restore_cameras_at(CameraPosition::Front);
                    Ok(())
                }
            };
            manager.drain_output_events();

            let outputs = manager.graph().outputs();
            let photo = outputs.contains(&OutputKind::Photo);
            let movie = outputs.contains(&OutputKind::Movie);
            prop_assert!(photo != movie, "outputs {:?}", outputs);
            prop_assert_eq!(OutputKind::for_mode(manager.mode()), if photo { OutputKind::Photo } else { OutputKind::Movie });

            let device = manager.graph().video_device();
            prop_assert!(device.is_some());
            prop_assert_eq!(device.map(|d| d.info().position), Some(manager.position()));
        }
    }

    #[test]
    fn zoom_stays_within_device_range(directions in prop::collection::vec(zoom_direction(), 1..60)) {
        let dir = tempfile::tempdir().unwrap();
        let (mut manager, _) = running_manager(&dir);
        let caps = manager.graph().video_device().unwrap().capabilities().clone();

        for direction in directions {
            let factor = manager.zoom(direction).unwrap();
            prop_assert!(factor >= caps.min_zoom && factor <= caps.max_zoom);
            if direction == ZoomDirection::Reset {
                prop_assert_eq!(factor, 1.0);
            }
            prop_assert_eq!(manager.graph().video_device().unwrap().zoom_factor(), factor);
        }
    }
}
