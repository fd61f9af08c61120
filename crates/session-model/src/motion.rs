//! Viewpoint motion records.
//!
//! Displacements are normalized to the source frame width: a value of
//! `0.1` means the scene shifted by a tenth of the screen. Positive `dx`
//! means the view turned right, positive `dy` means it turned down.

use serde::{Deserialize, Serialize};

use crate::combat::CombatEvent;
use crate::{ns_to_secs, TimestampNs};

/// Estimated viewpoint displacement between two consecutive frames.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct MotionSample {
    /// Index of the frame pair (sample `k` spans frames `k` and `k + 1`).
    pub index: u64,

    /// Timestamp of the earlier frame.
    pub t0_ns: TimestampNs,

    /// Timestamp of the later frame.
    pub t1_ns: TimestampNs,

    /// Horizontal displacement (normalized to frame width).
    pub dx: f64,

    /// Vertical displacement (normalized to frame width).
    pub dy: f64,

    /// Horizontal displacement in degrees.
    pub yaw_deg: f64,

    /// Vertical displacement in degrees.
    pub pitch_deg: f64,

    /// Tracking quality in [0, 1].
    pub confidence: f64,

    /// Whether `confidence` fell below the acceptance floor.
    pub low_confidence: bool,
}

impl MotionSample {
    /// Duration covered by this sample in seconds.
    pub fn duration_secs(&self) -> f64 {
        ns_to_secs(self.t1_ns.saturating_sub(self.t0_ns))
    }

    /// Angular distance travelled during the sample (degrees).
    pub fn angular_distance_deg(&self) -> f64 {
        self.yaw_deg.hypot(self.pitch_deg)
    }

    /// Instantaneous angular speed (degrees per second).
    pub fn angular_speed(&self) -> f64 {
        let dt = self.duration_secs();
        if dt <= 0.0 {
            return 0.0;
        }
        self.angular_distance_deg() / dt
    }

    /// Angular velocity vector `(yaw, pitch)` in degrees per second.
    pub fn angular_velocity(&self) -> (f64, f64) {
        let dt = self.duration_secs();
        if dt <= 0.0 {
            return (0.0, 0.0);
        }
        (self.yaw_deg / dt, self.pitch_deg / dt)
    }

    /// End timestamp in seconds.
    pub fn t1_secs(&self) -> f64 {
        ns_to_secs(self.t1_ns)
    }
}

/// A run of consecutive low-confidence samples long enough to count as
/// lost tracking.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TrackingGap {
    /// Start of the first low-confidence sample.
    pub start_ns: TimestampNs,
    /// End of the last low-confidence sample.
    pub end_ns: TimestampNs,
    /// Number of samples in the run.
    pub samples: usize,
}

impl TrackingGap {
    pub fn duration_secs(&self) -> f64 {
        ns_to_secs(self.end_ns.saturating_sub(self.start_ns))
    }
}

/// Item of the motion stream handed from the extractor to the segmenter.
#[derive(Debug, Clone, PartialEq)]
pub enum MotionRecord {
    Sample(MotionSample),
    Gap(TrackingGap),
    Combat(CombatEvent),
}

impl MotionRecord {
    /// Timestamp used to order records: sample end, gap end, or event time.
    pub fn timestamp_ns(&self) -> TimestampNs {
        match self {
            Self::Sample(sample) => sample.t1_ns,
            Self::Gap(gap) => gap.end_ns,
            Self::Combat(event) => event.timestamp_ns,
        }
    }

    pub fn as_sample(&self) -> Option<&MotionSample> {
        match self {
            Self::Sample(sample) => Some(sample),
            _ => None,
        }
    }
}
