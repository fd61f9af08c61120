//! AimTune Session Model
//!
//! Defines the records that flow through the analysis pipeline:
//! - **Motion:** per-frame-pair viewpoint displacement samples and tracking gaps
//! - **Combat:** timestamped shot/hit/kill events
//! - **Engagement:** segmented aim episodes and their kinematic features
//! - **Summary:** the session-level statistics and sensitivity recommendation
//!
//! Every record is immutable once produced and serializes with serde so the
//! summary can be handed to any storage or display layer as JSON.

pub mod combat;
pub mod engagement;
pub mod motion;
pub mod summary;

pub use combat::*;
pub use engagement::*;
pub use motion::*;
pub use summary::*;

/// Monotonic timestamp in nanoseconds since the start of the recording.
pub type TimestampNs = u64;

pub(crate) fn ns_to_secs(ns: TimestampNs) -> f64 {
    ns as f64 / 1_000_000_000.0
}
