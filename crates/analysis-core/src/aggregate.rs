//! Session aggregation and the sensitivity recommendation policy.
//!
//! # Policy
//!
//! 1. Many reversals with an inefficient path means the player keeps
//!    overshooting: **decrease** sensitivity.
//! 2. Slow settling without reversals means the player can't get there fast
//!    enough: **increase** sensitivity.
//! 3. Otherwise **keep**.
//!
//! The adjustment grows with how far the median exceeds its threshold and is
//! capped at `max_adjustment`. Confidence combines the engagement count, the
//! spread of the deciding features, and the tracking quality.

use aimtune_common::config::{AnalysisConfig, FlickBands, RecommendationPolicy};
use aimtune_common::error::{AimtuneError, AimtuneResult};
use aimtune_session_model::{
    ConfidenceLevel, Direction, Engagement, EngagementFeatures, EngagementReport,
    FeatureDistributions, FlickBand, FlickBandSummary, MotionSample, Outcome, OutcomeCounts,
    Qualifier, Recommendation, SessionSummary, TrackingGap, SUMMARY_SCHEMA_VERSION,
};

use crate::stats::{coefficient_of_variation, distribution, median, MotionAccumulator};

/// Decide the recommendation for a set of scored engagements.
///
/// `low_confidence_fraction` is the share of motion samples whose tracking
/// confidence fell below the floor.
pub fn recommend(
    features: &[EngagementFeatures],
    low_confidence_fraction: f64,
    config: &AnalysisConfig,
) -> AimtuneResult<Recommendation> {
    let n = features.len();
    if n == 0 {
        return Err(AimtuneError::InsufficientData { engagements: 0 });
    }
    let policy = &config.policy;

    let reversals: Vec<f64> = features.iter().map(|f| f.reversal_count as f64).collect();
    let efficiency: Vec<f64> = features.iter().map(|f| f.path_efficiency).collect();
    let settle: Vec<f64> = features.iter().map(|f| f.settle_time_secs).collect();
    let median_reversals = median(&reversals);
    let median_efficiency = median(&efficiency);
    let median_settle = median(&settle);

    let mut rationale = Vec::new();
    let (direction, factor) = if median_reversals > policy.overshoot_reversal_threshold
        && median_efficiency < policy.efficiency_floor
    {
        let excess = (median_reversals - policy.overshoot_reversal_threshold)
            / policy.overshoot_reversal_threshold;
        rationale.push(format!(
            "median reversal count {median_reversals:.1} exceeds {:.1} with path efficiency {median_efficiency:.2} below {:.2}: aim overshoots and corrects",
            policy.overshoot_reversal_threshold, policy.efficiency_floor
        ));
        (
            Direction::Decrease,
            1.0 - (policy.decrease_gain * excess).min(policy.max_adjustment),
        )
    } else if median_settle > policy.sluggish_settle_secs
        && median_reversals <= policy.low_reversal_ceiling
    {
        let excess = (median_settle - policy.sluggish_settle_secs) / policy.sluggish_settle_secs;
        rationale.push(format!(
            "median settle time {median_settle:.2}s exceeds {:.2}s with few reversals ({median_reversals:.1}): aim is slow to reach targets",
            policy.sluggish_settle_secs
        ));
        (
            Direction::Increase,
            1.0 + (policy.increase_gain * excess).min(policy.max_adjustment),
        )
    } else {
        rationale.push(format!(
            "median reversals {median_reversals:.1}, path efficiency {median_efficiency:.2}, settle time {median_settle:.2}s are within policy bounds"
        ));
        (Direction::Keep, 1.0)
    };

    let (score, qualified) = confidence(
        n,
        &reversals,
        &efficiency,
        low_confidence_fraction,
        config,
    );

    let mut qualifiers = Vec::new();
    if qualified {
        qualifiers.push(Qualifier::LowConfidence);
        if n < config.min_sample_count {
            rationale.push(format!(
                "only {n} engagement(s) detected, fewer than {}",
                config.min_sample_count
            ));
        }
        if low_confidence_fraction >= policy.max_low_confidence_fraction {
            rationale.push(format!(
                "{:.0}% of motion samples had unreliable tracking",
                low_confidence_fraction * 100.0
            ));
        }
    }

    let confidence_level = if qualified {
        ConfidenceLevel::Low
    } else {
        confidence_level(score, policy)
    };

    Ok(Recommendation {
        direction,
        factor,
        confidence_score: score,
        confidence_level,
        qualifiers,
        rationale,
    })
}

/// Confidence score and whether the low-confidence qualifier applies.
fn confidence(
    n: usize,
    reversals: &[f64],
    efficiency: &[f64],
    low_confidence_fraction: f64,
    config: &AnalysisConfig,
) -> (f64, bool) {
    let min_samples = config.min_sample_count.max(1) as f64;
    let count_term = 1.0 - (-(n as f64) / min_samples).exp();
    let spread =
        (coefficient_of_variation(reversals) + coefficient_of_variation(efficiency)) / 2.0;
    let variance_term = 1.0 / (1.0 + spread);
    let tracking_term = 1.0 - low_confidence_fraction.clamp(0.0, 1.0) / 2.0;

    let score = (count_term * variance_term * tracking_term).clamp(0.0, 1.0);
    let qualified = n < config.min_sample_count
        || low_confidence_fraction >= config.policy.max_low_confidence_fraction;
    (score, qualified)
}

fn confidence_level(score: f64, policy: &RecommendationPolicy) -> ConfidenceLevel {
    if score >= policy.high_confidence_score {
        ConfidenceLevel::High
    } else if score >= policy.medium_confidence_score {
        ConfidenceLevel::Medium
    } else {
        ConfidenceLevel::Low
    }
}

/// Flick band of an engagement by its direct displacement.
pub fn flick_band(direct_displacement_deg: f64, bands: &FlickBands) -> FlickBand {
    if direct_displacement_deg < bands.small_flick_deg {
        FlickBand::Small
    } else if direct_displacement_deg < bands.large_flick_deg {
        FlickBand::Medium
    } else {
        FlickBand::Large
    }
}

fn flick_band_summaries(features: &[EngagementFeatures], bands: &FlickBands) -> Vec<FlickBandSummary> {
    [FlickBand::Small, FlickBand::Medium, FlickBand::Large]
        .into_iter()
        .filter_map(|band| {
            let members: Vec<&EngagementFeatures> = features
                .iter()
                .filter(|f| flick_band(f.direct_displacement_deg, bands) == band)
                .collect();
            if members.is_empty() {
                return None;
            }
            let collect = |get: fn(&EngagementFeatures) -> f64| -> Vec<f64> {
                members.iter().map(|f| get(f)).collect()
            };
            Some(FlickBandSummary {
                band,
                count: members.len(),
                median_reversal_count: median(&collect(|f| f.reversal_count as f64)),
                median_path_efficiency: median(&collect(|f| f.path_efficiency)),
                median_peak_velocity: median(&collect(|f| f.peak_velocity)),
            })
        })
        .collect()
}

fn feature_distributions(features: &[EngagementFeatures]) -> FeatureDistributions {
    let of = |get: fn(&EngagementFeatures) -> f64| {
        distribution(&features.iter().map(get).collect::<Vec<_>>())
    };
    FeatureDistributions {
        duration_secs: of(|f| f.duration_secs),
        peak_velocity: of(|f| f.peak_velocity),
        reversal_count: of(|f| f.reversal_count as f64),
        settle_time_secs: of(|f| f.settle_time_secs),
        time_to_target_secs: of(|f| f.time_to_target_secs),
        path_efficiency: of(|f| f.path_efficiency),
        overshoot_deg: of(|f| f.overshoot_deg),
        undershoot_deg: of(|f| f.undershoot_deg),
    }
}

/// Streaming accumulator for one session.
///
/// Engagements are reduced to their report rows as they arrive; the samples
/// of a finished engagement are not retained.
pub struct SessionAggregator<'a> {
    config: &'a AnalysisConfig,
    motion: MotionAccumulator,
    samples: u64,
    low_confidence_samples: u64,
    first_sample_ns: Option<u64>,
    last_sample_ns: Option<u64>,
    gaps: Vec<TrackingGap>,
    discarded: u64,
    unattributed: u64,
    outcomes: OutcomeCounts,
    reports: Vec<EngagementReport>,
}

impl<'a> SessionAggregator<'a> {
    pub fn new(config: &'a AnalysisConfig) -> Self {
        Self {
            config,
            motion: MotionAccumulator::new(config.tracking_segments),
            samples: 0,
            low_confidence_samples: 0,
            first_sample_ns: None,
            last_sample_ns: None,
            gaps: Vec::new(),
            discarded: 0,
            unattributed: 0,
            outcomes: OutcomeCounts::default(),
            reports: Vec::new(),
        }
    }

    pub fn observe_sample(&mut self, sample: &MotionSample) {
        self.samples += 1;
        if sample.low_confidence {
            self.low_confidence_samples += 1;
        }
        self.first_sample_ns.get_or_insert(sample.t0_ns);
        self.last_sample_ns = Some(sample.t1_ns);
        self.motion.push(sample);
    }

    pub fn observe_gap(&mut self, gap: TrackingGap) {
        self.gaps.push(gap);
    }

    pub fn record_discarded(&mut self) {
        self.discarded += 1;
    }

    pub fn record_unattributed(&mut self) {
        self.unattributed += 1;
    }

    pub fn add_engagement(&mut self, engagement: &Engagement, features: EngagementFeatures) {
        match engagement.outcome {
            Outcome::Hit => self.outcomes.hit += 1,
            Outcome::Miss => self.outcomes.miss += 1,
            Outcome::Disengaged => self.outcomes.disengaged += 1,
        }
        self.reports.push(EngagementReport::new(engagement, features));
    }

    pub fn engagement_count(&self) -> usize {
        self.reports.len()
    }

    fn low_confidence_fraction(&self) -> f64 {
        if self.samples == 0 {
            return 0.0;
        }
        self.low_confidence_samples as f64 / self.samples as f64
    }

    /// Build the session summary. Fails with `InsufficientData` when no
    /// engagement was detected.
    pub fn finish(self, frames_analyzed: u64) -> AimtuneResult<SessionSummary> {
        let features: Vec<EngagementFeatures> = self.reports.iter().map(|r| r.features).collect();
        let low_confidence_fraction = self.low_confidence_fraction();
        let recommendation = recommend(&features, low_confidence_fraction, self.config)?;

        let duration_secs = match (self.first_sample_ns, self.last_sample_ns) {
            (Some(first), Some(last)) => aimtune_common::clock::ns_to_secs(last.saturating_sub(first)),
            _ => 0.0,
        };

        tracing::info!(
            engagements = self.reports.len(),
            direction = ?recommendation.direction,
            factor = recommendation.factor,
            confidence = recommendation.confidence_score,
            "Session aggregated"
        );

        Ok(SessionSummary {
            schema_version: SUMMARY_SCHEMA_VERSION.to_string(),
            frames_analyzed,
            motion_samples: self.samples,
            duration_secs,
            low_confidence_samples: self.low_confidence_samples,
            low_confidence_fraction,
            tracking_gaps: self.gaps,
            discarded_engagements: self.discarded,
            unattributed_combat_events: self.unattributed,
            outcomes: self.outcomes,
            hit_rate: self.outcomes.hit_rate(),
            motion: self.motion.finish(),
            features: feature_distributions(&features),
            flick_bands: flick_band_summaries(&features, &self.config.flick_bands),
            engagements: self.reports,
            recommendation,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn features(reversals: u32, efficiency: f64, settle: f64) -> EngagementFeatures {
        EngagementFeatures {
            duration_secs: 0.6,
            peak_velocity: 200.0,
            reversal_count: reversals,
            settle_time_secs: settle,
            time_to_target_secs: settle + 0.1,
            path_length_deg: 20.0,
            direct_displacement_deg: 20.0 * efficiency,
            path_efficiency: efficiency,
            overshoot_deg: 0.0,
            undershoot_deg: 0.0,
        }
    }

    fn overshooting_session(n: usize) -> Vec<EngagementFeatures> {
        (0..n)
            .map(|i| features(3 + (i % 3) as u32, 0.35 + 0.05 * (i % 3) as f64, 0.2))
            .collect()
    }

    #[test]
    fn test_zero_engagements_is_insufficient_data() {
        let err = recommend(&[], 0.0, &AnalysisConfig::default()).unwrap_err();
        assert!(matches!(err, AimtuneError::InsufficientData { engagements: 0 }));
    }

    #[test]
    fn test_overshooting_player_decreases_with_high_confidence() {
        // 50 engagements, median reversals 4, median efficiency 0.4.
        let rec = recommend(&overshooting_session(50), 0.0, &AnalysisConfig::default()).unwrap();
        assert_eq!(rec.direction, Direction::Decrease);
        assert!((rec.factor - 0.9).abs() < 1e-9);
        assert_eq!(rec.confidence_level, ConfidenceLevel::High);
        assert!(rec.qualifiers.is_empty());
    }

    #[test]
    fn test_sluggish_player_increases() {
        let session: Vec<_> = (0..20).map(|_| features(0, 0.95, 0.7)).collect();
        let rec = recommend(&session, 0.0, &AnalysisConfig::default()).unwrap();
        assert_eq!(rec.direction, Direction::Increase);
        // 0.1 * (0.7 - 0.35) / 0.35 = 0.1
        assert!((rec.factor - 1.1).abs() < 1e-9);
    }

    #[test]
    fn test_adjustment_is_capped() {
        let session: Vec<_> = (0..20).map(|_| features(40, 0.1, 0.2)).collect();
        let rec = recommend(&session, 0.0, &AnalysisConfig::default()).unwrap();
        assert_eq!(rec.direction, Direction::Decrease);
        assert!((rec.factor - 0.7).abs() < 1e-9);
    }

    #[test]
    fn test_balanced_player_keeps() {
        let session: Vec<_> = (0..20).map(|_| features(1, 0.9, 0.2)).collect();
        let rec = recommend(&session, 0.0, &AnalysisConfig::default()).unwrap();
        assert_eq!(rec.direction, Direction::Keep);
        assert_eq!(rec.factor, 1.0);
    }

    #[test]
    fn test_few_engagements_are_low_confidence() {
        let rec = recommend(&overshooting_session(3), 0.0, &AnalysisConfig::default()).unwrap();
        assert!(rec.is_low_confidence());
        assert_eq!(rec.confidence_level, ConfidenceLevel::Low);
    }

    #[test]
    fn test_poor_tracking_is_low_confidence() {
        let rec = recommend(&overshooting_session(50), 0.8, &AnalysisConfig::default()).unwrap();
        assert!(rec.is_low_confidence());
        assert!(rec.rationale.iter().any(|r| r.contains("unreliable tracking")));
    }

    #[test]
    fn test_flick_bands() {
        let bands = FlickBands::default();
        assert_eq!(flick_band(2.0, &bands), FlickBand::Small);
        assert_eq!(flick_band(5.0, &bands), FlickBand::Medium);
        assert_eq!(flick_band(25.0, &bands), FlickBand::Large);

        let summaries = flick_band_summaries(
            &[features(0, 0.1, 0.2), features(2, 0.9, 0.2), features(4, 0.8, 0.2)],
            &bands,
        );
        assert_eq!(summaries.len(), 2);
        assert_eq!(summaries[0].band, FlickBand::Small);
        assert_eq!(summaries[1].band, FlickBand::Medium);
        assert_eq!(summaries[1].count, 2);
        assert_eq!(summaries[1].median_reversal_count, 3.0);
    }
}
