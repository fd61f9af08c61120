//! AimTune Common Utilities
//!
//! Shared infrastructure for all AimTune crates:
//! - Error types and result aliases
//! - Timestamp conversion and frame-rate sampling
//! - Tracing/logging initialization
//! - Analysis configuration loading and validation

pub mod clock;
pub mod config;
pub mod error;
pub mod logging;

pub use clock::*;
pub use config::*;
pub use error::*;
