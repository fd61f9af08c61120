//! Descriptive statistics over engagement features and motion samples.

use aimtune_common::config::TrackingSegments;
use aimtune_session_model::{FeatureDistribution, MotionSample, MotionStats};

/// Arithmetic mean; 0 for an empty slice.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let m = mean(values);
    (values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64).sqrt()
}

/// Standard deviation relative to the mean magnitude; 0 when the mean is ~0.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values).abs();
    if m < 1e-12 {
        return 0.0;
    }
    std_dev(values) / m
}

/// Linear-interpolated percentile of already sorted values, `q` in [0, 1].
fn percentile_sorted(sorted: &[f64], q: f64) -> f64 {
    match sorted.len() {
        0 => 0.0,
        1 => sorted[0],
        n => {
            let pos = q.clamp(0.0, 1.0) * (n - 1) as f64;
            let lo = pos.floor() as usize;
            let hi = pos.ceil() as usize;
            let frac = pos - lo as f64;
            sorted[lo] + (sorted[hi] - sorted[lo]) * frac
        }
    }
}

pub fn median(values: &[f64]) -> f64 {
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    percentile_sorted(&sorted, 0.5)
}

/// Full distribution summary of `values`.
pub fn distribution(values: &[f64]) -> FeatureDistribution {
    if values.is_empty() {
        return FeatureDistribution::default();
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.total_cmp(b));
    FeatureDistribution {
        count: sorted.len(),
        mean: mean(&sorted),
        std_dev: std_dev(&sorted),
        min: sorted[0],
        p25: percentile_sorted(&sorted, 0.25),
        median: percentile_sorted(&sorted, 0.5),
        p75: percentile_sorted(&sorted, 0.75),
        p90: percentile_sorted(&sorted, 0.9),
        max: sorted[sorted.len() - 1],
    }
}

/// Streaming whole-session motion statistics.
#[derive(Debug, Clone)]
pub struct MotionAccumulator {
    segments: TrackingSegments,
    count: u64,
    total_distance: f64,
    speed_sum: f64,
    max_speed: f64,
    previous_speed: Option<f64>,
    // Welford state for absolute consecutive speed changes.
    change_count: u64,
    change_mean: f64,
    change_m2: f64,
    run_len: usize,
    run_distance: f64,
    segment_count: u64,
    segment_distance: f64,
}

impl MotionAccumulator {
    pub fn new(segments: TrackingSegments) -> Self {
        Self {
            segments,
            count: 0,
            total_distance: 0.0,
            speed_sum: 0.0,
            max_speed: 0.0,
            previous_speed: None,
            change_count: 0,
            change_mean: 0.0,
            change_m2: 0.0,
            run_len: 0,
            run_distance: 0.0,
            segment_count: 0,
            segment_distance: 0.0,
        }
    }

    pub fn push(&mut self, sample: &MotionSample) {
        let speed = sample.angular_speed();
        let distance = sample.angular_distance_deg();
        self.count += 1;
        self.total_distance += distance;
        self.speed_sum += speed;
        self.max_speed = self.max_speed.max(speed);

        if let Some(previous) = self.previous_speed {
            let change = (speed - previous).abs();
            self.change_count += 1;
            let delta = change - self.change_mean;
            self.change_mean += delta / self.change_count as f64;
            self.change_m2 += delta * (change - self.change_mean);
        }
        self.previous_speed = Some(speed);

        if speed <= self.segments.max_speed && distance > self.segments.min_step_deg {
            self.run_len += 1;
            self.run_distance += distance;
        } else {
            self.close_run();
        }
    }

    fn close_run(&mut self) {
        if self.run_len >= self.segments.min_samples {
            self.segment_count += 1;
            self.segment_distance += self.run_distance;
        }
        self.run_len = 0;
        self.run_distance = 0.0;
    }

    pub fn finish(mut self) -> MotionStats {
        self.close_run();
        let smoothness = if self.change_count > 1 {
            (self.change_m2 / self.change_count as f64).sqrt()
        } else {
            0.0
        };
        MotionStats {
            total_angular_distance_deg: self.total_distance,
            mean_speed: if self.count > 0 {
                self.speed_sum / self.count as f64
            } else {
                0.0
            },
            max_speed: self.max_speed,
            smoothness,
            tracking_segment_count: self.segment_count,
            tracking_distance_deg: self.segment_distance,
        }
    }
}
