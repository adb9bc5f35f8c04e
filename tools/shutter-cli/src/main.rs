//! Shutter CLI: drive the capture session from a terminal.
//!
//! Usage:
//!   shutter check                  Report permissions and camera availability
//!   shutter devices                List cameras and microphones
//!   shutter shoot [OPTIONS]        Take photos and save them to the library
//!   shutter record --secs <S>      Record a movie and save it to the library
//!   shutter config [--write]       Show (or write) the effective configuration

use std::path::{Path, PathBuf};

use clap::{Parser, Subcommand, ValueEnum};
use shutter_common::config::AppConfig;
use shutter_common::error::ShutterError;

mod commands;
mod session;

#[derive(Parser)]
#[command(
    name = "shutter",
    about = "Camera capture session: photos, movies, and a photo library",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Config file (defaults to $XDG_CONFIG_HOME/shutter/config.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Capture backend
    #[arg(long, global = true, value_enum, default_value_t = BackendKind::Virtual)]
    backend: BackendKind,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum BackendKind {
    /// Simulated front and back cameras
    Virtual,
    /// V4L2 webcams through GStreamer
    Gstreamer,
}

#[derive(Subcommand)]
enum Commands {
    /// Check permissions and camera availability
    Check,

    /// List capture devices and their capabilities
    Devices,

    /// Take one or more photos
    Shoot {
        /// Number of photos
        #[arg(short = 'n', long, default_value = "1")]
        count: u32,

        /// Use the front camera
        #[arg(long)]
        front: bool,

        /// Fire the flash
        #[arg(long)]
        flash: bool,
    },

    /// Record a movie
    Record {
        /// Duration in seconds
        #[arg(long)]
        secs: f64,

        /// Keep recording across camera switches
        #[arg(long)]
        continuous: bool,

        /// Switch cameras this many seconds in
        #[arg(long)]
        switch_at: Option<f64>,
    },

    /// Show the effective configuration
    Config {
        /// Write it back to the config file
        #[arg(long)]
        write: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let (config, load_error) = load_config(cli.config.as_deref());

    let mut logging = config.logging.clone();
    if cli.verbose {
        logging.level = "debug".to_string();
    }
    shutter_common::logging::init_logging(&logging);
    if let Some(e) = load_error {
        tracing::warn!(error = %e, "Using default configuration");
    }

    match cli.command {
        Commands::Check => commands::check::run(&config, cli.backend),
        Commands::Devices => commands::devices::run(cli.backend),
        Commands::Shoot {
            count,
            front,
            flash,
        } => commands::shoot::run(config, cli.backend, count, front, flash).await,
        Commands::Record {
            secs,
            continuous,
            switch_at,
        } => commands::record::run(config, cli.backend, secs, continuous, switch_at).await,
        Commands::Config { write } => commands::config::run(&config, cli.config, write),
    }
}

/// Load the config, keeping any failure to report once logging is up.
fn load_config(path: Option<&Path>) -> (AppConfig, Option<ShutterError>) {
    let loaded = match path {
        Some(path) => AppConfig::load_from(path),
        None => AppConfig::load(),
    };
    match loaded {
        Ok(config) => (config, None),
        Err(e) => (AppConfig::default(), Some(e)),
    }
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_record_with_switch() {
        let cli = Cli::try_parse_from([
            "shutter",
            "record",
            "--secs",
            "3",
            "--continuous",
            "--switch-at",
            "1.5",
        ])
        .unwrap();
        assert_eq!(cli.backend, BackendKind::Virtual);
        match cli.command {
            Commands::Record {
                secs,
                continuous,
                switch_at,
            } => {
                assert_eq!(secs, 3.0);
                assert!(continuous);
                assert_eq!(switch_at, Some(1.5));
            }
            _ => panic!("expected record"),
        }
    }

    #[test]
    fn global_flags_follow_the_subcommand() {
        let cli =
            Cli::try_parse_from(["shutter", "shoot", "-n", "3", "--front", "--verbose"]).unwrap();
        assert!(cli.verbose);
        assert!(matches!(
            cli.command,
            Commands::Shoot {
                count: 3,
                front: true,
                flash: false
            }
        ));
    }

    #[test]
    fn malformed_config_falls_back_and_keeps_the_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, "{ not json").unwrap();

        let (config, error) = load_config(Some(&path));
        assert!(matches!(error, Some(ShutterError::Config { .. })));
        assert_eq!(config.logging.level, "info");
    }
}
