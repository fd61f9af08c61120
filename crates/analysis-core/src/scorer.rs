//! Per-engagement kinematic scoring.
//!
//! # Features
//!
//! - **Peak velocity:** fastest sample (deg/s).
//! - **Reversals:** consecutive moving samples (speed ≥ settle threshold)
//!   whose directions differ by more than 90°.
//! - **Settle time:** from the end of the peak sample until speed stays
//!   below the settle threshold for the dwell time.
//! - **Time to target:** engagement start to settled aim.
//! - **Path efficiency:** net displacement over travelled path. An engagement
//!   that never moved scores 1.0; a closed loop (moved, but ended where it
//!   started) has no net direction and scores 0.0.
//! - **Overshoot / undershoot:** measured along the net direction of travel.
//!   Overshoot is how far the aim got past where it ended; undershoot is how
//!   far the first ballistic stroke stopped short of it.

use aimtune_common::clock::{ns_to_secs, secs_to_ns};
use aimtune_common::config::AnalysisConfig;
use aimtune_session_model::{Engagement, EngagementFeatures, MotionSample};

/// Net displacements below this (degrees) have no usable direction.
const MIN_NET_DISPLACEMENT_DEG: f64 = 1e-9;

/// Compute the features of one engagement. Deterministic and side-effect free.
pub fn score_engagement(engagement: &Engagement, config: &AnalysisConfig) -> EngagementFeatures {
    let samples = &engagement.samples;
    let duration_secs = engagement.duration_secs();

    let Some((peak_index, peak_velocity)) = peak(samples) else {
        return EngagementFeatures {
            duration_secs,
            peak_velocity: 0.0,
            reversal_count: 0,
            settle_time_secs: 0.0,
            time_to_target_secs: 0.0,
            path_length_deg: 0.0,
            direct_displacement_deg: 0.0,
            path_efficiency: 1.0,
            overshoot_deg: 0.0,
            undershoot_deg: 0.0,
        };
    };

    let peak_end_ns = samples[peak_index].t1_ns;
    let settle_time_secs = settle_time(
        &samples[peak_index + 1..],
        peak_end_ns,
        engagement.end_ns,
        config,
    );
    let time_to_target_secs =
        ns_to_secs(peak_end_ns.saturating_sub(engagement.start_ns)) + settle_time_secs;

    let path_length_deg: f64 = samples.iter().map(|s| s.angular_distance_deg()).sum();
    let net_yaw: f64 = samples.iter().map(|s| s.yaw_deg).sum();
    let net_pitch: f64 = samples.iter().map(|s| s.pitch_deg).sum();
    let direct_displacement_deg = net_yaw.hypot(net_pitch);
    let path_efficiency = if path_length_deg <= f64::EPSILON {
        1.0
    } else if direct_displacement_deg < MIN_NET_DISPLACEMENT_DEG {
        0.0
    } else {
        (direct_displacement_deg / path_length_deg).min(1.0)
    };

    let (overshoot_deg, undershoot_deg) =
        stroke_errors(samples, (net_yaw, net_pitch), config.settle_threshold);

    EngagementFeatures {
        duration_secs,
        peak_velocity,
        reversal_count: reversal_count(samples, config.settle_threshold),
        settle_time_secs,
        time_to_target_secs,
        path_length_deg,
        direct_displacement_deg,
        path_efficiency,
        overshoot_deg,
        undershoot_deg,
    }
}

/// Index and speed of the first fastest sample.
fn peak(samples: &[MotionSample]) -> Option<(usize, f64)> {
    samples
        .iter()
        .map(MotionSample::angular_speed)
        .enumerate()
        .fold(None, |best, (i, v)| match best {
            Some((_, bv)) if bv >= v => best,
            _ => Some((i, v)),
        })
}

fn reversal_count(samples: &[MotionSample], settle_threshold: f64) -> u32 {
    let mut count = 0;
    let mut previous: Option<(f64, f64)> = None;
    for sample in samples {
        if sample.angular_speed() < settle_threshold {
            continue;
        }
        let direction = (sample.yaw_deg, sample.pitch_deg);
        if let Some((px, py)) = previous {
            if px * direction.0 + py * direction.1 < 0.0 {
                count += 1;
            }
        }
        previous = Some(direction);
    }
    count
}

fn settle_time(
    after_peak: &[MotionSample],
    peak_end_ns: u64,
    engagement_end_ns: u64,
    config: &AnalysisConfig,
) -> f64 {
    let dwell_ns = secs_to_ns(config.settle_dwell_secs);
    let mut run_start: Option<u64> = None;
    for sample in after_peak {
        if sample.angular_speed() < config.settle_threshold {
            let start = *run_start.get_or_insert(sample.t0_ns);
            if sample.t1_ns.saturating_sub(start) >= dwell_ns {
                return ns_to_secs(start.saturating_sub(peak_end_ns));
            }
        } else {
            run_start = None;
        }
    }
    ns_to_secs(engagement_end_ns.saturating_sub(peak_end_ns))
}

/// Overshoot and undershoot (degrees) along the net direction.
fn stroke_errors(samples: &[MotionSample], net: (f64, f64), settle_threshold: f64) -> (f64, f64) {
    let net_len = net.0.hypot(net.1);
    if net_len < MIN_NET_DISPLACEMENT_DEG {
        return (0.0, 0.0);
    }
    let (ux, uy) = (net.0 / net_len, net.1 / net_len);

    let mut projection = 0.0f64;
    let mut max_projection = 0.0f64;
    let mut stroke_started = false;
    let mut stroke_end: Option<f64> = None;
    for sample in samples {
        let progress = sample.yaw_deg * ux + sample.pitch_deg * uy;
        let moving = sample.angular_speed() >= settle_threshold;
        if stroke_end.is_none() {
            if moving && progress > 0.0 {
                stroke_started = true;
            } else if stroke_started {
                stroke_end = Some(projection);
            }
        }
        projection += progress;
        max_projection = max_projection.max(projection);
    }

    let final_projection = projection;
    let first_stroke = stroke_end.unwrap_or(final_projection);
    let overshoot = (max_projection - final_projection).max(0.0);
    let undershoot = (final_projection - first_stroke).max(0.0);
    (overshoot, undershoot)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aimtune_session_model::{AcquisitionEnd, Outcome};

    const DT: u64 = 33_333_333;

    fn engagement(steps: &[(f64, f64)]) -> Engagement {
        let samples: Vec<MotionSample> = steps
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
            .collect();
        Engagement {
            start_ns: 0,
            end_ns: steps.len() as u64 * DT,
            samples,
            outcome: Outcome::Disengaged,
            decisive_event: None,
            acquisition_end: AcquisitionEnd::Settled,
        }
    }

    #[test]
    fn test_clean_flick() {
        // 15 degrees right in three strokes, then still.
        let eng = engagement(&[
            (5.0, 0.0),
            (7.0, 0.0),
            (3.0, 0.0),
            (0.0, 0.0),
            (0.0, 0.0),
            (0.0, 0.0),
            (0.0, 0.0),
            (0.0, 0.0),
        ]);
        let f = score_engagement(&eng, &AnalysisConfig::default());

        assert_eq!(f.reversal_count, 0);
        assert!((f.path_efficiency - 1.0).abs() < 1e-12);
        assert!((f.direct_displacement_deg - 15.0).abs() < 1e-9);
        assert!((f.peak_velocity - 7.0 / ns_to_secs(DT)).abs() < 1e-6);
        assert_eq!(f.overshoot_deg, 0.0);
        assert_eq!(f.undershoot_deg, 0.0);
        // Peak ends at 2*DT; settles straight after the last stroke.
        assert!((f.settle_time_secs - ns_to_secs(DT)).abs() < 1e-9);
        assert!((f.time_to_target_secs - ns_to_secs(3 * DT)).abs() < 1e-9);
    }

    #[test]
    fn test_overshoot_and_correction() {
        // Flick 25 degrees, then pull back 5.
        let eng = engagement(&[
            (10.0, 0.0),
            (15.0, 0.0),
            (-3.0, 0.0),
            (-2.0, 0.0),
            (0.0, 0.0),
            (0.0, 0.0),
            (0.0, 0.0),
        ]);
        let f = score_engagement(&eng, &AnalysisConfig::default());

        assert_eq!(f.reversal_count, 1);
        assert!((f.overshoot_deg - 5.0).abs() < 1e-9);
        assert_eq!(f.undershoot_deg, 0.0);
        assert!((f.path_efficiency - 20.0 / 30.0).abs() < 1e-9);
    }

    #[test]
    fn test_undershoot_needs_second_stroke() {
        // Stop short at 12 degrees, pause, then add 4 more.
        let eng = engagement(&[
            (6.0, 0.0),
            (6.0, 0.0),
            (0.0, 0.0),
            (0.0, 0.0),
            (2.0, 0.0),
            (2.0, 0.0),
            (0.0, 0.0),
        ]);
        let f = score_engagement(&eng, &AnalysisConfig::default());

        assert!((f.undershoot_deg - 4.0).abs() < 1e-9);
        assert_eq!(f.overshoot_deg, 0.0);
        assert_eq!(f.reversal_count, 0);
    }

    #[test]
    fn test_never_settling_uses_engagement_end() {
        let eng = engagement(&[(5.0, 0.0), (8.0, 0.0), (5.0, 0.0), (5.0, 0.0)]);
        let f = score_engagement(&eng, &AnalysisConfig::default());
        assert!((f.settle_time_secs - ns_to_secs(2 * DT)).abs() < 1e-9);
    }

    #[test]
    fn test_zigzag_counts_every_reversal() {
        let eng = engagement(&[
            (4.0, 1.0),
            (-4.0, 0.0),
            (4.0, 0.0),
            (-4.0, -1.0),
            (4.0, 0.0),
        ]);
        let f = score_engagement(&eng, &AnalysisConfig::default());
        assert_eq!(f.reversal_count, 4);
        assert!(f.path_efficiency > 0.0 && f.path_efficiency <= 1.0);
    }

    #[test]
    fn test_motionless_engagement_is_perfectly_efficient() {
        let eng = engagement(&[(0.0, 0.0), (0.0, 0.0)]);
        let f = score_engagement(&eng, &AnalysisConfig::default());
        assert_eq!(f.path_efficiency, 1.0);
        assert_eq!(f.reversal_count, 0);
    }

    #[test]
    fn test_closed_loop_has_zero_efficiency() {
        let eng = engagement(&[(5.0, 0.0), (-5.0, 0.0)]);
        let f = score_engagement(&eng, &AnalysisConfig::default());
        assert_eq!(f.direct_displacement_deg, 0.0);
        assert!((f.path_length_deg - 10.0).abs() < 1e-12);
        assert_eq!(f.path_efficiency, 0.0);
        assert_eq!(f.overshoot_deg, 0.0);
    }

    #[test]
    fn test_scoring_is_deterministic() {
        let eng = engagement(&[(3.0, 1.0), (9.0, -2.0), (-1.0, 0.5), (0.0, 0.0)]);
        let config = AnalysisConfig::default();
        assert_eq!(score_engagement(&eng, &config), score_engagement(&eng, &config));
    }
}
