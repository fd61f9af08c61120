//! Property-based tests for scoring, segmentation, and the recommendation
//! policy.

use aimtune_analysis_core::{recommend, score_engagement, SegmentEvent, Segmenter};
use aimtune_common::config::AnalysisConfig;
use aimtune_common::error::AimtuneResult;
use aimtune_session_model::{
    AcquisitionEnd, Direction, Engagement, EngagementFeatures, MotionRecord, MotionSample, Outcome,
};
use proptest::prelude::*;

const DT: u64 = 33_333_333;

fn samples(steps: &[(f64, f64)]) -> Vec<MotionSample> {
    steps
        .iter()
        .enumerate()
        .map(|(i, &(yaw, pitch))| MotionSample {
            index: i as u64,
            t0_ns: i as u64 * DT,
            t1_ns: (i as u64 + 1) * DT,
            dx: 0.0,
            dy: 0.0,
            yaw_deg: yaw,
            pitch_deg: pitch,
            confidence: 1.0,
            low_confidence: false,
        })
        .collect()
}

fn engagement(steps: &[(f64, f64)]) -> Engagement {
    Engagement {
        start_ns: 0,
        end_ns: steps.len() as u64 * DT,
        samples: samples(steps),
        outcome: Outcome::Disengaged,
        decisive_event: None,
        acquisition_end: AcquisitionEnd::Settled,
    }
}

fn features(reversals: u32, efficiency: f64, settle: f64) -> EngagementFeatures {
    EngagementFeatures {
        duration_secs: 0.6,
        peak_velocity: 150.0,
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

fn step_strategy() -> impl Strategy<Value = Vec<(f64, f64)>> {
    prop::collection::vec((-12.0f64..12.0, -6.0f64..6.0), 1..60)
}

proptest! {
    /// Property: path efficiency lies in (0, 1] unless the engagement is a
    /// closed loop, which scores exactly 0.
    #[test]
    fn prop_path_efficiency_in_unit_interval(steps in step_strategy()) {
        let f = score_engagement(&engagement(&steps), &AnalysisConfig::default());
        let closed_loop = f.path_length_deg > f64::EPSILON && f.direct_displacement_deg < 1e-9;
        if closed_loop {
            prop_assert_eq!(f.path_efficiency, 0.0);
        } else {
            prop_assert!(f.path_efficiency > 0.0);
        }
        prop_assert!(f.path_efficiency <= 1.0);
        prop_assert!(f.overshoot_deg >= 0.0 && f.undershoot_deg >= 0.0);
        prop_assert!(f.settle_time_secs >= 0.0);
        prop_assert!(f.time_to_target_secs >= f.settle_time_secs);
    }

    /// Property: scoring the same engagement twice gives identical features.
    #[test]
    fn prop_scoring_is_deterministic(steps in step_strategy()) {
        let config = AnalysisConfig::default();
        let eng = engagement(&steps);
        prop_assert_eq!(score_engagement(&eng, &config), score_engagement(&eng, &config));
    }

    /// Property: engagements come out in order, never overlap, and every
    /// sample is passed through exactly once.
    #[test]
    fn prop_segmenter_engagements_do_not_overlap(
        speeds in prop::collection::vec(prop::sample::select(vec![0.0f64, 5.0, 30.0, 90.0, 200.0]), 0..200)
    ) {
        let config = AnalysisConfig::default();
        let steps: Vec<(f64, f64)> = speeds.iter().map(|v| (v * DT as f64 / 1e9, 0.0)).collect();
        let records = samples(&steps).into_iter().map(|s| Ok(MotionRecord::Sample(s)));

        let events: Vec<SegmentEvent> = Segmenter::new(records, &config)
            .collect::<AimtuneResult<_>>()
            .unwrap();

        let passed = events.iter().filter(|e| matches!(e, SegmentEvent::Sample(_))).count();
        prop_assert_eq!(passed, speeds.len());

        let spans: Vec<(u64, u64)> = events
            .iter()
            .filter_map(|e| match e {
                SegmentEvent::Engagement(eng) => Some((eng.start_ns, eng.end_ns)),
                SegmentEvent::Discarded { start_ns, end_ns } => Some((*start_ns, *end_ns)),
                _ => None,
            })
            .collect();
        for (start, end) in &spans {
            prop_assert!(start < end);
        }
        for pair in spans.windows(2) {
            prop_assert!(pair[0].1 <= pair[1].0);
        }
    }

    /// Property: more reversals never turn a decrease into something else,
    /// and never shrink the decrease.
    #[test]
    fn prop_decrease_is_monotone_in_reversals(
        low in 0u32..20,
        extra in 0u32..20,
        efficiency in 0.05f64..0.65,
        n in 1usize..40,
    ) {
        let config = AnalysisConfig::default();
        let session = |r: u32| vec![features(r, efficiency, 0.2); n];
        let a = recommend(&session(low), 0.0, &config).unwrap();
        let b = recommend(&session(low + extra), 0.0, &config).unwrap();

        if a.direction == Direction::Decrease {
            prop_assert_eq!(b.direction, Direction::Decrease);
            prop_assert!(b.factor <= a.factor + 1e-12);
        }
        prop_assert!(b.factor >= 1.0 - config.policy.max_adjustment - 1e-12);
    }

    /// Property: confidence never drops as identical engagements accumulate.
    #[test]
    fn prop_confidence_non_decreasing_in_count(
        n in 1usize..150,
        extra in 0usize..150,
        reversals in 0u32..8,
        efficiency in 0.1f64..1.0,
        low_conf in 0.0f64..1.0,
    ) {
        let config = AnalysisConfig::default();
        let f = features(reversals, efficiency, 0.3);
        let a = recommend(&vec![f; n], low_conf, &config).unwrap();
        let b = recommend(&vec![f; n + extra], low_conf, &config).unwrap();

        prop_assert!(b.confidence_score + 1e-12 >= a.confidence_score);
        prop_assert!(b.confidence_level >= a.confidence_level);
        prop_assert!((0.0..=1.0).contains(&a.confidence_score));
    }
}
