//! Timestamp and sampling utilities.
//!
//! All AimTune streams use monotonic nanosecond timestamps relative to the
//! start of the analysed recording. This module provides:
//! - Conversion between nanoseconds and seconds
//! - Timestamps for the `n`-th sample at a given rate
//! - A frame sampler that thins a native-rate stream to a target rate

/// Monotonic timestamp in nanoseconds since the start of the recording.
pub type TimestampNs = u64;

pub const NANOS_PER_SEC: f64 = 1_000_000_000.0;

/// Convert a nanosecond timestamp to seconds.
pub fn ns_to_secs(ns: TimestampNs) -> f64 {
    ns as f64 / NANOS_PER_SEC
}

/// Convert seconds to nanoseconds. Negative inputs saturate to zero.
pub fn secs_to_ns(secs: f64) -> TimestampNs {
    (secs.max(0.0) * NANOS_PER_SEC).round() as TimestampNs
}

/// Timestamp of the `index`-th sample of a stream sampled at `rate_hz`.
pub fn sample_timestamp_ns(index: u64, rate_hz: f64) -> TimestampNs {
    ((index as f64) * NANOS_PER_SEC / rate_hz).round() as TimestampNs
}

/// Decides which frames of a native-rate stream to keep when sampling at a
/// lower target rate.
///
/// The first frame is always kept. Afterwards a frame is kept once the
/// next target slot has been reached, so a 60 Hz stream sampled at 30 Hz
/// keeps every other frame.
#[derive(Debug)]
pub struct FrameSampler {
    target_interval_ns: f64,
    next_slot_ns: Option<f64>,
}

impl FrameSampler {
    /// Create a sampler targeting the given rate in Hz.
    pub fn new(target_hz: f64) -> Self {
        Self {
            target_interval_ns: NANOS_PER_SEC / target_hz,
            next_slot_ns: None,
        }
    }

    /// Returns true if the frame at `timestamp_ns` should be kept.
    pub fn should_sample(&mut self, timestamp_ns: TimestampNs) -> bool {
        let t = timestamp_ns as f64;
        match self.next_slot_ns {
            None => {
                self.next_slot_ns = Some(t + self.target_interval_ns);
                true
            }
            // Half a nanosecond of slack absorbs rounding in native timestamps.
            Some(slot) if t + 0.5 >= slot => {
                let mut next = slot + self.target_interval_ns;
                while next <= t {
                    next += self.target_interval_ns;
                }
                self.next_slot_ns = Some(next);
                true
            }
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ns_to_secs_conversion() {
        assert!((ns_to_secs(1_500_000_000) - 1.5).abs() < 1e-9);
        assert_eq!(secs_to_ns(2.0), 2_000_000_000);
        assert_eq!(secs_to_ns(-1.0), 0);
    }

    #[test]
    fn test_sample_timestamps_are_monotonic() {
        let ts: Vec<u64> = (0..10).map(|i| sample_timestamp_ns(i, 30.0)).collect();
        assert!(ts.windows(2).all(|w| w[1] > w[0]));
        assert_eq!(ts[3], 100_000_000);
    }

    #[test]
    fn test_sampler_halves_native_rate() {
        let mut sampler = FrameSampler::new(30.0);
        let kept = (0..60)
            .map(|i| sample_timestamp_ns(i, 60.0))
            .filter(|t| sampler.should_sample(*t))
            .count();
        assert_eq!(kept, 30);
    }

    #[test]
    fn test_sampler_keeps_everything_below_target() {
        let mut sampler = FrameSampler::new(120.0);
        assert!(sampler.should_sample(0));
        assert!(sampler.should_sample(sample_timestamp_ns(1, 30.0)));
        assert!(sampler.should_sample(sample_timestamp_ns(2, 30.0)));
    }
}
