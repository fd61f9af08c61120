//! Aim engagements and their kinematic features.

use serde::{Deserialize, Serialize};

use crate::combat::CombatKind;
use crate::motion::MotionSample;
use crate::{ns_to_secs, TimestampNs};

/// How an engagement was resolved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Outcome {
    /// A hit or kill was confirmed.
    Hit,
    /// Shots were fired without confirmation.
    Miss,
    /// Neither happened before the resolving window timed out.
    Disengaged,
}

impl Outcome {
    /// Outcome implied by the most severe combat event of an engagement.
    pub fn from_decisive(kind: Option<CombatKind>) -> Self {
        match kind {
            Some(kind) if kind.is_hit() => Self::Hit,
            Some(_) => Self::Miss,
            None => Self::Disengaged,
        }
    }
}

/// Why the acquisition phase ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AcquisitionEnd {
    /// A combat event arrived during acquisition.
    CombatEvent,
    /// Aim speed stayed below the settle threshold long enough.
    Settled,
    /// Acquisition ran for the maximum allowed duration.
    MaxDuration,
    /// The motion stream ended mid-engagement.
    EndOfStream,
}

/// One aim-and-resolve episode, as cut by the segmenter.
#[derive(Debug, Clone, PartialEq)]
pub struct Engagement {
    /// Inclusive start.
    pub start_ns: TimestampNs,
    /// Exclusive end.
    pub end_ns: TimestampNs,
    /// Constituent motion samples in time order.
    pub samples: Vec<MotionSample>,
    pub outcome: Outcome,
    /// Most severe combat event kind inside the engagement.
    pub decisive_event: Option<CombatKind>,
    pub acquisition_end: AcquisitionEnd,
}

impl Engagement {
    pub fn duration_secs(&self) -> f64 {
        ns_to_secs(self.end_ns.saturating_sub(self.start_ns))
    }

    /// Fraction of constituent samples flagged low-confidence.
    pub fn low_confidence_fraction(&self) -> f64 {
        if self.samples.is_empty() {
            return 0.0;
        }
        let low = self.samples.iter().filter(|s| s.low_confidence).count();
        low as f64 / self.samples.len() as f64
    }
}

/// Kinematic features derived from an engagement's samples.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct EngagementFeatures {
    /// Engagement duration (seconds).
    pub duration_secs: f64,
    /// Maximum instantaneous angular speed (deg/s).
    pub peak_velocity: f64,
    /// Direction reversals among moving samples (overshoot corrections).
    pub reversal_count: u32,
    /// Time from peak speed to sustained stillness (seconds).
    pub settle_time_secs: f64,
    /// Time from engagement start to settled aim (seconds).
    pub time_to_target_secs: f64,
    /// Total angular path travelled (degrees).
    pub path_length_deg: f64,
    /// Straight-line angular displacement from start to end (degrees).
    pub direct_displacement_deg: f64,
    /// Direct displacement over path length; 1.0 is a perfectly clean flick.
    pub path_efficiency: f64,
    /// Travel past the final aim point along the flick direction (degrees).
    pub overshoot_deg: f64,
    /// Shortfall of the first ballistic stroke (degrees).
    pub undershoot_deg: f64,
}

/// Compact per-engagement row carried in the session summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngagementReport {
    pub start_secs: f64,
    pub end_secs: f64,
    pub outcome: Outcome,
    pub decisive_event: Option<CombatKind>,
    pub acquisition_end: AcquisitionEnd,
    pub low_confidence_fraction: f64,
    pub features: EngagementFeatures,
}

impl EngagementReport {
    pub fn new(engagement: &Engagement, features: EngagementFeatures) -> Self {
        Self {
            start_secs: ns_to_secs(engagement.start_ns),
            end_secs: ns_to_secs(engagement.end_ns),
            outcome: engagement.outcome,
            decisive_event: engagement.decisive_event,
            acquisition_end: engagement.acquisition_end,
            low_confidence_fraction: engagement.low_confidence_fraction(),
            features,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_outcome_from_decisive_kind() {
        assert_eq!(Outcome::from_decisive(Some(CombatKind::Kill)), Outcome::Hit);
        assert_eq!(
            Outcome::from_decisive(Some(CombatKind::HitConfirmed)),
            Outcome::Hit
        );
        assert_eq!(
            Outcome::from_decisive(Some(CombatKind::ShotFired)),
            Outcome::Miss
        );
        assert_eq!(Outcome::from_decisive(None), Outcome::Disengaged);
    }

    #[test]
    fn test_low_confidence_fraction() {
        let mut sample = MotionSample {
            index: 0,
            t0_ns: 0,
            t1_ns: 10,
            dx: 0.0,
            dy: 0.0,
            yaw_deg: 0.0,
            pitch_deg: 0.0,
            confidence: 0.1,
            low_confidence: true,
        };
        let mut samples = vec![sample];
        sample.low_confidence = false;
        samples.push(sample);

        let engagement = Engagement {
            start_ns: 0,
            end_ns: 500_000_000,
            samples,
            outcome: Outcome::Disengaged,
            decisive_event: None,
            acquisition_end: AcquisitionEnd::Settled,
        };
        assert!((engagement.low_confidence_fraction() - 0.5).abs() < 1e-9);
        assert!((engagement.duration_secs() - 0.5).abs() < 1e-9);
    }
}
