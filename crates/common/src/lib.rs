//! Shutter Common Utilities
//!
//! Shared infrastructure for all Shutter crates:
//! - Error taxonomy and result aliases
//! - Recording clock for durations and frame timestamps
//! - Tracing/logging initialization
//! - Configuration loading
//! - Value types shared by configuration and the engine

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;
pub mod types;

pub use clock::*;
pub use config::*;
pub use error::*;
pub use types::*;
