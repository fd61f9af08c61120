//! Displacement smoothing over the motion stream.
//!
//! Smoothing only touches sample displacements. Sample count, timestamps and
//! confidences are preserved, and gap/combat records pass through in their
//! original order. The moving average is centred, so it holds back up to
//! `window / 2` samples until their look-ahead has arrived.

use std::collections::VecDeque;

use aimtune_common::config::SmoothingConfig;
use aimtune_common::error::AimtuneResult;
use aimtune_session_model::{MotionRecord, MotionSample};

use crate::motion::angular_degrees;

/// Iterator adapter that smooths sample displacements.
pub struct MotionSmoother<I> {
    inner: I,
    algorithm: SmoothingConfig,
    fov_degrees: f64,
    queue: VecDeque<MotionRecord>,
    /// Raw displacements of the most recently emitted samples (look-behind).
    history: VecDeque<(f64, f64)>,
    ema: Option<(f64, f64)>,
    inner_done: bool,
}

impl<I> MotionSmoother<I>
where
    I: Iterator<Item = AimtuneResult<MotionRecord>>,
{
    pub fn new(inner: I, algorithm: SmoothingConfig, fov_degrees: f64) -> Self {
        Self {
            inner,
            algorithm,
            fov_degrees,
            queue: VecDeque::new(),
            history: VecDeque::new(),
            ema: None,
            inner_done: false,
        }
    }

    fn half_window(&self) -> usize {
        match self.algorithm {
            SmoothingConfig::MovingAverage { window } => window / 2,
            _ => 0,
        }
    }

    /// Pop the front record if it can be emitted without more look-ahead.
    fn try_emit(&mut self) -> Option<MotionRecord> {
        let half = self.half_window();
        let ready = match self.queue.front()? {
            MotionRecord::Sample(_) => {
                self.inner_done
                    || self
                        .queue
                        .iter()
                        .skip(1)
                        .filter(|r| r.as_sample().is_some())
                        .count()
                        >= half
            }
            _ => true,
        };
        if !ready {
            return None;
        }

        match self.queue.pop_front()? {
            MotionRecord::Sample(sample) => Some(MotionRecord::Sample(self.smooth(sample))),
            other => Some(other),
        }
    }

    fn smooth(&mut self, sample: MotionSample) -> MotionSample {
        let raw = (sample.dx, sample.dy);
        let (dx, dy) = match self.algorithm {
            SmoothingConfig::None => return sample,
            SmoothingConfig::Ema { strength } => {
                let alpha = (1.0 - strength).clamp(0.0, 1.0);
                let next = match self.ema {
                    Some((px, py)) => (
                        alpha * raw.0 + (1.0 - alpha) * px,
                        alpha * raw.1 + (1.0 - alpha) * py,
                    ),
                    None => raw,
                };
                self.ema = Some(next);
                next
            }
            SmoothingConfig::MovingAverage { window } => {
                let half = window / 2;
                let ahead = self
                    .queue
                    .iter()
                    .filter_map(|r| r.as_sample())
                    .take(half)
                    .map(|s| (s.dx, s.dy));
                let (mut sx, mut sy, mut n) = (raw.0, raw.1, 1.0);
                for (x, y) in self.history.iter().copied().chain(ahead) {
                    sx += x;
                    sy += y;
                    n += 1.0;
                }

                self.history.push_back(raw);
                while self.history.len() > half {
                    self.history.pop_front();
                }
                (sx / n, sy / n)
            }
        };

        MotionSample {
            dx,
            dy,
            yaw_deg: angular_degrees(dx, self.fov_degrees),
            pitch_deg: angular_degrees(dy, self.fov_degrees),
            ..sample
        }
    }
}

impl<I> Iterator for MotionSmoother<I>
where
    I: Iterator<Item = AimtuneResult<MotionRecord>>,
{
    type Item = AimtuneResult<MotionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.try_emit() {
                return Some(Ok(record));
            }
            if self.inner_done {
                return None;
            }
            match self.inner.next() {
                Some(Ok(record)) => self.queue.push_back(record),
                Some(Err(e)) => {
                    self.inner_done = true;
                    self.queue.clear();
                    return Some(Err(e));
                }
                None => self.inner_done = true,
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aimtune_session_model::{CombatEvent, CombatKind};

    fn sample(index: u64, dx: f64) -> MotionRecord {
        MotionRecord::Sample(MotionSample {
            index,
            t0_ns: index * 10,
            t1_ns: (index + 1) * 10,
            dx,
            dy: 0.0,
            yaw_deg: angular_degrees(dx, 103.0),
            pitch_deg: 0.0,
            confidence: 0.9,
            low_confidence: false,
        })
    }

    fn run(records: Vec<MotionRecord>, algorithm: SmoothingConfig) -> Vec<MotionRecord> {
        MotionSmoother::new(records.into_iter().map(Ok), algorithm, 103.0)
            .collect::<AimtuneResult<_>>()
            .unwrap()
    }

    fn dxs(records: &[MotionRecord]) -> Vec<f64> {
        records
            .iter()
            .filter_map(|r| r.as_sample())
            .map(|s| s.dx)
            .collect()
    }

    #[test]
    fn test_none_passes_through() {
        let input = vec![sample(0, 0.01), sample(1, -0.02)];
        assert_eq!(run(input.clone(), SmoothingConfig::None), input);
    }

    #[test]
    fn test_moving_average_is_centred() {
        let input = vec![
            sample(0, 0.0),
            sample(1, 0.03),
            sample(2, 0.0),
            sample(3, 0.03),
        ];
        let out = run(input, SmoothingConfig::MovingAverage { window: 3 });
        let dx = dxs(&out);
        assert_eq!(dx.len(), 4);
        assert!((dx[0] - 0.015).abs() < 1e-12);
        assert!((dx[1] - 0.01).abs() < 1e-12);
        assert!((dx[2] - 0.02).abs() < 1e-12);
        assert!((dx[3] - 0.015).abs() < 1e-12);
    }

    #[test]
    fn test_ema_reduces_jitter() {
        let input: Vec<MotionRecord> = (0..8)
            .map(|i| sample(i, if i % 2 == 0 { 0.02 } else { -0.02 }))
            .collect();
        let out = run(input, SmoothingConfig::Ema { strength: 0.7 });
        for dx in &dxs(&out)[2..] {
            assert!(dx.abs() < 0.02);
        }
    }

    #[test]
    fn test_non_sample_records_keep_their_position() {
        let event = MotionRecord::Combat(CombatEvent::new(15, CombatKind::ShotFired));
        let input = vec![
            sample(0, 0.01),
            event.clone(),
            sample(1, 0.01),
            sample(2, 0.01),
        ];
        let out = run(input, SmoothingConfig::MovingAverage { window: 5 });
        assert_eq!(out.len(), 4);
        assert_eq!(out[1], event);
        let timestamps: Vec<u64> = out.iter().map(|r| r.timestamp_ns()).collect();
        assert_eq!(timestamps, vec![10, 15, 20, 30]);
    }

    #[test]
    fn test_confidence_and_timestamps_preserved() {
        let out = run(
            vec![sample(0, 0.05), sample(1, 0.0)],
            SmoothingConfig::MovingAverage { window: 2 },
        );
        let s = out[1].as_sample().unwrap();
        assert_eq!((s.t0_ns, s.t1_ns, s.confidence), (10, 20, 0.9));
        assert!((s.dx - 0.025).abs() < 1e-12);
        assert!(s.yaw_deg > 0.0);
    }
}
