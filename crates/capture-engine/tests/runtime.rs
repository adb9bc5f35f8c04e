use std::sync::Arc;
use std::time::Duration;

use shutter_capture_engine::{
    CameraEvent, CaptureSessionManager, ResourceKind, SessionRuntime, SessionStatus,
    VirtualBackend, ZoomDirection,
};
use shutter_common::config::{CaptureDefaults, PermissionPolicy};
use shutter_common::error::ShutterError;
use shutter_platform_core::{CameraPosition, CaptureMode, PermissionDomain, PermissionStatus};
use shutter_platform_host::{DirectoryLibrary, PolicyPermissionProvider};
use tokio::sync::broadcast;

fn manager(dir: &tempfile::TempDir, policy: PermissionPolicy) -> CaptureSessionManager {
    let settings = CaptureDefaults {
        temp_dir: dir.path().join("tmp"),
        ..CaptureDefaults::default()
    };
    CaptureSessionManager::new(
        Box::new(VirtualBackend::new()),
        Arc::new(PolicyPermissionProvider::new(policy)),
        Arc::new(DirectoryLibrary::new(dir.path().join("library"))),
        settings,
    )
}

async fn wait_for(
    events: &mut broadcast::Receiver<CameraEvent>,
    matches: impl Fn(&CameraEvent) -> bool,
) -> CameraEvent {
    tokio::time::timeout(Duration::from_secs(5), async {
        loop {
            match events.recv().await {
                Ok(event) if matches(&event) => return event,
                Ok(_) => {}
                Err(broadcast::error::RecvError::Lagged(_)) => {}
                Err(broadcast::error::RecvError::Closed) => panic!("event channel closed"),
            }
        }
    })
    .await
    .expect("event should arrive")
}

#[tokio::test]
async fn commands_wait_for_startup() {
    let dir = tempfile::tempdir().unwrap();
    let mut policy = PermissionPolicy::default();
    policy.response_delay_ms = 30;
    let runtime = SessionRuntime::spawn(manager(&dir, policy));
    let handle = runtime.handle();

    // Queued behind the permission requests, configuration, and start.
    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.status, SessionStatus::Ready);
    assert!(snapshot.running);
    assert_eq!(snapshot.permissions.camera, PermissionStatus::Granted);
    assert_eq!(snapshot.position, CameraPosition::Back);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn photo_round_trip_through_handle() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir, PermissionPolicy::all_granted());
    let mut events = manager.subscribe();
    let runtime = SessionRuntime::spawn(manager);
    let handle = runtime.handle();

    handle.take_picture().await.unwrap();
    let finished = wait_for(&mut events, |e| {
        matches!(e, CameraEvent::OutputFinished { .. })
    })
    .await;
    assert_eq!(
        finished,
        CameraEvent::OutputFinished {
            kind: ResourceKind::Photo,
            success: true,
            message: None,
        }
    );

    let snapshot = handle.snapshot().await.unwrap();
    assert_eq!(snapshot.mode, CaptureMode::Photo);
    assert_eq!(snapshot.captured, Some(ResourceKind::Photo));
    assert!(!snapshot.running);

    let assets = handle.save_captured_resource().await.unwrap();
    assert_eq!(assets.len(), 1);
    handle.discard().await.unwrap();
    assert!(handle.snapshot().await.unwrap().running);

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn recording_through_handle_confirms_on_callback() {
    let dir = tempfile::tempdir().unwrap();
    let manager = manager(&dir, PermissionPolicy::all_granted());
    let mut events = manager.subscribe();
    let runtime = SessionRuntime::spawn(manager);
    let handle = runtime.handle();

    handle.start_recording().await.unwrap();
    wait_for(&mut events, |e| *e == CameraEvent::RecordingChanged(true)).await;
    assert!(handle.snapshot().await.unwrap().recording);

    handle.stop_recording().await.unwrap();
    wait_for(&mut events, |e| *e == CameraEvent::RecordingChanged(false)).await;
    let snapshot = handle.snapshot().await.unwrap();
    assert!(!snapshot.recording);
    assert_eq!(snapshot.captured, Some(ResourceKind::Movie));

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn denied_camera_keeps_commands_answering() {
    let dir = tempfile::tempdir().unwrap();
    let mut policy = PermissionPolicy::default();
    policy
        .initial
        .insert(PermissionDomain::Camera, PermissionStatus::Denied);
    let runtime = SessionRuntime::spawn(manager(&dir, policy));
    let handle = runtime.handle();

    let snapshot = handle.snapshot().await.unwrap();
    assert!(snapshot.status.is_failed());
    assert!(!snapshot.running);
    assert!(snapshot.video_device.is_none());

    handle.start().await.unwrap();
    assert!(!handle.snapshot().await.unwrap().running);
    assert!(matches!(
        handle.zoom(ZoomDirection::In).await,
        Err(ShutterError::NoDeviceBound)
    ));
    assert!(handle.take_picture().await.is_err());

    runtime.shutdown().await.unwrap();
}

#[tokio::test]
async fn handle_reports_shutdown() {
    let dir = tempfile::tempdir().unwrap();
    let runtime = SessionRuntime::spawn(manager(&dir, PermissionPolicy::all_granted()));
    let handle = runtime.handle();
    runtime.shutdown().await.unwrap();

    assert!(matches!(
        handle.snapshot().await,
        Err(ShutterError::InvalidState { .. })
    ));
}
