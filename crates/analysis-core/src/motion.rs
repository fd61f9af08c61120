//! Viewpoint motion extraction.
//!
//! Consumes ROI frames and produces one [`MotionSample`] per consecutive
//! frame pair, plus [`TrackingGap`] markers for sustained low-confidence
//! runs and HUD combat events when detection rules are configured.
//!
//! Displacements are normalized to the source frame width, then converted
//! to degrees with a pinhole camera model:
//!
//! ```text
//! focal = W / (2 * tan(fov / 2))
//! angle = atan(pixels / focal) = atan(2 * u * tan(fov / 2)),  u = pixels / W
//! ```

use std::collections::VecDeque;

use aimtune_common::clock::{ns_to_secs, TimestampNs};
use aimtune_common::config::{AnalysisConfig, CrosshairColorConfig, TrackingMode};
use aimtune_common::error::{AimtuneError, AimtuneResult, PipelineStage};
use aimtune_frame_source::Frame;
use aimtune_session_model::{MotionRecord, MotionSample, TrackingGap};
use image::RgbImage;

use crate::hud::HudDetector;
use crate::luma::{BlockMatcher, Pyramid};

/// Angle (degrees) subtended by a displacement `u`, expressed as a fraction
/// of the frame width, for a horizontal field of view of `fov_degrees`.
pub fn angular_degrees(u: f64, fov_degrees: f64) -> f64 {
    let half = (fov_degrees.to_radians() / 2.0).tan();
    (2.0 * u * half).atan().to_degrees()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Centroid {
    x: f64,
    y: f64,
    pixels: u32,
}

#[derive(Debug)]
enum Prepared {
    Scene(Pyramid),
    Crosshair(Option<Centroid>),
}

#[derive(Debug)]
struct PreparedFrame {
    timestamp_ns: TimestampNs,
    dims: (u32, u32),
    data: Prepared,
}

/// Iterator adapter from frames to motion records.
pub struct MotionExtractor<I> {
    frames: I,
    mode: TrackingMode,
    matcher: BlockMatcher,
    pyramid_factor: u32,
    crosshair: CrosshairColorConfig,
    fov_degrees: f64,
    min_confidence: f64,
    tracking_lost_run: usize,
    hud: Option<HudDetector>,
    previous: Option<PreparedFrame>,
    pending: VecDeque<MotionRecord>,
    low_run: Option<TrackingGap>,
    samples: u64,
    done: bool,
}

impl<I> MotionExtractor<I>
where
    I: Iterator<Item = AimtuneResult<Frame>>,
{
    pub fn new(frames: I, config: &AnalysisConfig) -> Self {
        Self {
            frames,
            mode: config.tracking.mode,
            matcher: BlockMatcher::from_config(&config.tracking),
            pyramid_factor: config.tracking.pyramid_factor,
            crosshair: config.tracking.crosshair_color,
            fov_degrees: config.field_of_view_degrees,
            min_confidence: config.min_confidence,
            tracking_lost_run: config.tracking_lost_run,
            hud: HudDetector::new(&config.hud.rules),
            previous: None,
            pending: VecDeque::new(),
            low_run: None,
            samples: 0,
            done: false,
        }
    }

    fn prepare(&self, frame: &Frame) -> PreparedFrame {
        let data = match self.mode {
            TrackingMode::SceneShift => {
                Prepared::Scene(Pyramid::new(&frame.image, self.pyramid_factor))
            }
            TrackingMode::CrosshairColor => {
                Prepared::Crosshair(crosshair_centroid(&frame.image, &self.crosshair))
            }
        };
        PreparedFrame {
            timestamp_ns: frame.timestamp_ns,
            dims: frame.roi_dimensions(),
            data,
        }
    }

    /// Displacement of the view in pixels and the confidence of the estimate.
    fn estimate(&self, previous: &PreparedFrame, current: &PreparedFrame) -> (f64, f64, f64) {
        match (&previous.data, &current.data) {
            (Prepared::Scene(a), Prepared::Scene(b)) => {
                let shift = self.matcher.estimate(a, b);
                // Content sliding left means the view turned right.
                (-shift.dx, -shift.dy, shift.confidence)
            }
            (Prepared::Crosshair(Some(a)), Prepared::Crosshair(Some(b))) => {
                let min_pixels = self.crosshair.min_pixels.max(1) as f64;
                let confidence = (a.pixels.min(b.pixels) as f64 / min_pixels).min(1.0);
                (b.x - a.x, b.y - a.y, confidence)
            }
            _ => (0.0, 0.0, 0.0),
        }
    }

    fn process(&mut self, frame: Frame) -> AimtuneResult<()> {
        let prepared = self.prepare(&frame);

        if let Some(previous) = self.previous.take() {
            if previous.dims != prepared.dims {
                return Err(AimtuneError::decode_at(
                    PipelineStage::MotionExtractor,
                    frame.timestamp_secs(),
                    format!(
                        "ROI size changed from {}x{} to {}x{}",
                        previous.dims.0, previous.dims.1, prepared.dims.0, prepared.dims.1
                    ),
                ));
            }
            if prepared.timestamp_ns <= previous.timestamp_ns {
                return Err(AimtuneError::decode_at(
                    PipelineStage::MotionExtractor,
                    frame.timestamp_secs(),
                    "frame timestamps are not strictly increasing",
                ));
            }

            let (dx_px, dy_px, confidence) = self.estimate(&previous, &prepared);
            let width = frame.source_width.max(1) as f64;
            let (dx, dy) = (dx_px / width, dy_px / width);
            let confidence = confidence.clamp(0.0, 1.0);
            let sample = MotionSample {
                index: self.samples,
                t0_ns: previous.timestamp_ns,
                t1_ns: prepared.timestamp_ns,
                dx,
                dy,
                yaw_deg: angular_degrees(dx, self.fov_degrees),
                pitch_deg: angular_degrees(dy, self.fov_degrees),
                confidence,
                low_confidence: confidence < self.min_confidence,
            };
            self.samples += 1;

            tracing::trace!(
                index = sample.index,
                yaw = sample.yaw_deg,
                pitch = sample.pitch_deg,
                confidence,
                "motion sample"
            );

            self.track_confidence(&sample);
            self.pending.push_back(MotionRecord::Sample(sample));
        }

        if let Some(hud) = &mut self.hud {
            for event in hud.detect(&frame) {
                self.pending.push_back(MotionRecord::Combat(event));
            }
        }

        self.previous = Some(prepared);
        Ok(())
    }

    fn track_confidence(&mut self, sample: &MotionSample) {
        if !sample.low_confidence {
            self.close_low_run();
            return;
        }
        match &mut self.low_run {
            Some(run) => {
                run.end_ns = sample.t1_ns;
                run.samples += 1;
            }
            None => {
                self.low_run = Some(TrackingGap {
                    start_ns: sample.t0_ns,
                    end_ns: sample.t1_ns,
                    samples: 1,
                });
            }
        }
    }

    fn close_low_run(&mut self) {
        let Some(run) = self.low_run.take() else {
            return;
        };
        if run.samples < self.tracking_lost_run {
            return;
        }
        let lost = AimtuneError::TrackingLost {
            start_secs: ns_to_secs(run.start_ns),
            end_secs: ns_to_secs(run.end_ns),
            samples: run.samples,
        };
        tracing::warn!(%lost, "Motion tracking degraded");
        self.pending.push_back(MotionRecord::Gap(run));
    }
}

impl<I> Iterator for MotionExtractor<I>
where
    I: Iterator<Item = AimtuneResult<Frame>>,
{
    type Item = AimtuneResult<MotionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(record) = self.pending.pop_front() {
                return Some(Ok(record));
            }
            if self.done {
                return None;
            }
            match self.frames.next() {
                Some(Ok(frame)) => {
                    if let Err(e) = self.process(frame) {
                        self.done = true;
                        self.pending.clear();
                        return Some(Err(e));
                    }
                }
                Some(Err(e)) => {
                    self.done = true;
                    self.pending.clear();
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    self.close_low_run();
                    tracing::debug!(samples = self.samples, "Motion extraction finished");
                }
            }
        }
    }
}

/// Centroid of crosshair-coloured pixels, if any are present.
fn crosshair_centroid(image: &RgbImage, color: &CrosshairColorConfig) -> Option<Centroid> {
    let (mut sx, mut sy, mut n) = (0.0f64, 0.0f64, 0u32);
    for (x, y, p) in image.enumerate_pixels() {
        if (0..3).all(|c| p[c] >= color.lower[c] && p[c] <= color.upper[c]) {
            sx += x as f64;
            sy += y as f64;
            n += 1;
        }
    }
    (n > 0).then(|| Centroid {
        x: sx / n as f64,
        y: sy / n as f64,
        pixels: n,
    })
}
