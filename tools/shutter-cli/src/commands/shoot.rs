//! Take photos and save them to the library.

use shutter_common::config::AppConfig;
use shutter_platform_core::{CameraPosition, FlashMode};
use shutter_presentation::DisplayState;

use crate::session::{describe, Session};
use crate::BackendKind;

pub async fn run(
    mut config: AppConfig,
    kind: BackendKind,
    count: u32,
    front: bool,
    flash: bool,
) -> anyhow::Result<()> {
    anyhow::ensure!(count > 0, "--count must be at least 1");
    if front {
        config.capture.initial_position = CameraPosition::Front;
    }

    let session = Session::open(&config, kind).await?;
    let view = &session.view;

    if flash
        && view.state().flash == FlashMode::Off
        && view.toggle_flash().await? == FlashMode::Off
    {
        println!("Flash is not available on this camera");
    }

    let state = view.state();
    println!(
        "Shooting {count} photo(s) with the {} camera (flash {:?})",
        state.position, state.flash
    );

    for n in 1..=count {
        view.shutter_tap().await?;
        let state = session
            .settle("the photo", |v| {
                v.display == DisplayState::PhotoPreview || v.last_error.is_some()
            })
            .await?;
        if state.display != DisplayState::PhotoPreview {
            let reason = state.last_error.unwrap_or_default();
            session.close().await?;
            anyhow::bail!("Photo {n} failed: {reason}");
        }

        let assets = view.save().await?;
        for asset in &assets {
            println!("  [{n}/{count}] {}", describe(asset));
        }
        session
            .settle("the preview to resume", |v| {
                v.display == DisplayState::CaptureMode && v.running
            })
            .await?;
    }

    session.close().await
}
