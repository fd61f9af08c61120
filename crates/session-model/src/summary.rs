//! Session summary and sensitivity recommendation.
//!
//! The summary is the only artifact that crosses the engine boundary. It is
//! built once at the end of a session and never mutated afterwards.

use serde::{Deserialize, Serialize};

use crate::engagement::EngagementReport;
use crate::motion::TrackingGap;

/// Schema version of the serialized summary.
pub const SUMMARY_SCHEMA_VERSION: &str = "1.0";

/// Suggested change to the player's sensitivity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Direction {
    Increase,
    Decrease,
    Keep,
}

/// Qualitative confidence bucket.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfidenceLevel {
    Low,
    Medium,
    High,
}

/// Caveat attached to a recommendation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Qualifier {
    /// Too few engagements or too much unreliable tracking for a firm call.
    LowConfidence,
}

/// The sensitivity recommendation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Recommendation {
    pub direction: Direction,
    /// Multiplier to apply to the current sensitivity (eDPI-equivalent).
    pub factor: f64,
    /// Confidence score in [0, 1].
    pub confidence_score: f64,
    pub confidence_level: ConfidenceLevel,
    #[serde(default)]
    pub qualifiers: Vec<Qualifier>,
    /// Human-readable reasons behind the decision.
    #[serde(default)]
    pub rationale: Vec<String>,
}

impl Recommendation {
    pub fn is_low_confidence(&self) -> bool {
        self.qualifiers.contains(&Qualifier::LowConfidence)
    }
}

/// Distribution statistics of one engagement feature.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureDistribution {
    pub count: usize,
    pub mean: f64,
    pub std_dev: f64,
    pub min: f64,
    pub p25: f64,
    pub median: f64,
    pub p75: f64,
    pub p90: f64,
    pub max: f64,
}

/// Distributions of every engagement feature.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct FeatureDistributions {
    pub duration_secs: FeatureDistribution,
    pub peak_velocity: FeatureDistribution,
    pub reversal_count: FeatureDistribution,
    pub settle_time_secs: FeatureDistribution,
    pub time_to_target_secs: FeatureDistribution,
    pub path_efficiency: FeatureDistribution,
    pub overshoot_deg: FeatureDistribution,
    pub undershoot_deg: FeatureDistribution,
}

/// Whole-session movement statistics, independent of segmentation.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
pub struct MotionStats {
    /// Total angular distance travelled (degrees).
    pub total_angular_distance_deg: f64,
    /// Mean angular speed over all samples (deg/s).
    pub mean_speed: f64,
    /// Fastest sample (deg/s).
    pub max_speed: f64,
    /// Standard deviation of the absolute consecutive speed changes (lower = smoother).
    pub smoothness: f64,
    /// Runs of slow, continuous movement.
    pub tracking_segment_count: u64,
    /// Angular distance covered inside tracking segments (degrees).
    pub tracking_distance_deg: f64,
}

/// Flick size bucket by direct angular displacement.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FlickBand {
    Small,
    Medium,
    Large,
}

/// Per-band engagement statistics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FlickBandSummary {
    pub band: FlickBand,
    pub count: usize,
    pub median_reversal_count: f64,
    pub median_path_efficiency: f64,
    pub median_peak_velocity: f64,
}

/// Engagement counts per outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct OutcomeCounts {
    pub hit: usize,
    pub miss: usize,
    pub disengaged: usize,
}

impl OutcomeCounts {
    pub fn total(&self) -> usize {
        self.hit + self.miss + self.disengaged
    }

    /// Hits over resolved shots (hits + misses), if any shots resolved.
    pub fn hit_rate(&self) -> Option<f64> {
        let shots = self.hit + self.miss;
        (shots > 0).then(|| self.hit as f64 / shots as f64)
    }
}

/// Aggregated result of analysing one session.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSummary {
    pub schema_version: String,
    /// Frames pulled from the frame source.
    pub frames_analyzed: u64,
    /// Motion samples produced (frames - 1).
    pub motion_samples: u64,
    /// Time span covered by the motion stream (seconds).
    pub duration_secs: f64,
    pub low_confidence_samples: u64,
    pub low_confidence_fraction: f64,
    pub tracking_gaps: Vec<TrackingGap>,
    /// Engagements dropped for being shorter than the minimum duration.
    pub discarded_engagements: u64,
    /// Combat events that arrived while no engagement was open.
    pub unattributed_combat_events: u64,
    pub outcomes: OutcomeCounts,
    pub hit_rate: Option<f64>,
    pub motion: MotionStats,
    pub features: FeatureDistributions,
    pub flick_bands: Vec<FlickBandSummary>,
    pub engagements: Vec<EngagementReport>,
    pub recommendation: Recommendation,
}

impl SessionSummary {
    pub fn engagement_count(&self) -> usize {
        self.engagements.len()
    }
}
