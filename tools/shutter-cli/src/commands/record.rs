//! Record a movie and save it to the library.

use std::time::{Duration, Instant};

use shutter_common::config::AppConfig;
use shutter_presentation::DisplayState;

use crate::session::{describe, Session};
use crate::BackendKind;

pub async fn run(
    mut config: AppConfig,
    kind: BackendKind,
    secs: f64,
    continuous: bool,
    switch_at: Option<f64>,
) -> anyhow::Result<()> {
    anyhow::ensure!(secs.is_finite() && secs > 0.0, "--secs must be positive");
    if let Some(at) = switch_at {
        anyhow::ensure!(
            at.is_finite() && at >= 0.0 && at < secs,
            "--switch-at must fall inside the recording"
        );
    }
    config.capture.continuous_recording = continuous;

    let session = Session::open(&config, kind).await?;
    let view = &session.view;

    view.shutter_long_press().await?;
    session.settle("recording to start", |v| v.recording).await?;
    println!("Recording for {secs:.1}s (Ctrl+C to stop early)...");

    let started = Instant::now();
    let total = Duration::from_secs_f64(secs);
    let mut interrupted = false;

    if let Some(at) = switch_at {
        interrupted = wait_or_interrupt(Duration::from_secs_f64(at)).await?;
        if !interrupted {
            match view.flip_camera().await {
                Ok(position) => println!("Switched to the {position} camera"),
                Err(e) => println!("Camera switch failed: {e}"),
            }
        }
    }
    if !interrupted {
        wait_or_interrupt(total.saturating_sub(started.elapsed())).await?;
    }

    view.session().stop_recording().await?;
    let state = session
        .settle("the movie", |v| {
            v.display == DisplayState::MoviePreview || (!v.recording && v.last_error.is_some())
        })
        .await?;
    if state.display != DisplayState::MoviePreview {
        let reason = state.last_error.unwrap_or_default();
        session.close().await?;
        anyhow::bail!("Recording failed: {reason}");
    }

    println!("Recorded {:.1}s", started.elapsed().as_secs_f64());
    let assets = view.save().await?;
    for asset in &assets {
        println!("  {}", describe(asset));
    }

    session.close().await
}

/// Sleep for `duration`; returns true when Ctrl+C came first.
async fn wait_or_interrupt(duration: Duration) -> anyhow::Result<bool> {
    tokio::select! {
        _ = tokio::time::sleep(duration) => Ok(false),
        signal = tokio::signal::ctrl_c() => {
            signal?;
            println!();
            Ok(true)
        }
    }
}
