//! End-to-end session analysis.
//!
//! Frames flow through the stages lazily:
//!
//! ```text
//! frames -> MotionExtractor -> MotionSmoother -> MergeCombatEvents -> Segmenter
//!        -> score_engagement -> SessionAggregator
//! ```
//!
//! Only one frame pair and the currently open engagement are held at a time.

use std::cell::Cell;
use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use aimtune_common::config::AnalysisConfig;
use aimtune_common::error::{AimtuneError, AimtuneResult};
use aimtune_frame_source::{FfmpegFrameSource, Frame, ImageSequenceSource};
use aimtune_session_model::{CombatEvent, SessionSummary};

use crate::aggregate::SessionAggregator;
use crate::merge::MergeCombatEvents;
use crate::motion::MotionExtractor;
use crate::scorer::score_engagement;
use crate::segmenter::{SegmentEvent, Segmenter};
use crate::smoothing::MotionSmoother;

/// Cooperative cancellation flag, checked before each frame is pulled.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Counts frames pulled from the source and stops on cancellation.
struct FrameTap<'a, I> {
    inner: I,
    count: &'a Cell<u64>,
    cancel: Option<&'a CancelToken>,
    stopped: bool,
}

impl<I> Iterator for FrameTap<'_, I>
where
    I: Iterator<Item = AimtuneResult<Frame>>,
{
    type Item = AimtuneResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.stopped {
            return None;
        }
        if self.cancel.is_some_and(CancelToken::is_cancelled) {
            self.stopped = true;
            return Some(Err(AimtuneError::Cancelled));
        }
        let item = self.inner.next()?;
        if item.is_ok() {
            self.count.set(self.count.get() + 1);
        }
        Some(item)
    }
}

/// Analyze a stream of ROI frames.
///
/// `combat_events` are externally supplied events (e.g. from a game log);
/// they are merged with any events the HUD detector finds.
pub fn analyze_frames<I>(
    frames: I,
    combat_events: &[CombatEvent],
    config: &AnalysisConfig,
    cancel: Option<&CancelToken>,
) -> AimtuneResult<SessionSummary>
where
    I: IntoIterator<Item = AimtuneResult<Frame>>,
{
    config.validate()?;
    let started = Instant::now();

    let frame_count = Cell::new(0u64);
    let tapped = FrameTap {
        inner: frames.into_iter(),
        count: &frame_count,
        cancel,
        stopped: false,
    };

    let motion = MotionExtractor::new(tapped, config);
    let smoothed = MotionSmoother::new(motion, config.smoothing, config.field_of_view_degrees);
    let merged = MergeCombatEvents::new(smoothed, combat_events);
    let segments = Segmenter::new(merged, config);

    let mut aggregator = SessionAggregator::new(config);
    for event in segments {
        match event? {
            SegmentEvent::Sample(sample) => aggregator.observe_sample(&sample),
            SegmentEvent::Gap(gap) => aggregator.observe_gap(gap),
            SegmentEvent::Unattributed(event) => {
                tracing::debug!(
                    at = event.timestamp_secs(),
                    kind = ?event.kind,
                    "Combat event outside any engagement"
                );
                aggregator.record_unattributed();
            }
            SegmentEvent::Discarded { .. } => aggregator.record_discarded(),
            SegmentEvent::Engagement(engagement) => {
                let features = score_engagement(&engagement, config);
                tracing::debug!(
                    start = engagement.start_ns,
                    outcome = ?engagement.outcome,
                    reversals = features.reversal_count,
                    efficiency = features.path_efficiency,
                    "Engagement scored"
                );
                aggregator.add_engagement(&engagement, features);
            }
        }
    }

    let frames_analyzed = frame_count.get();
    if frames_analyzed == 0 {
        return Err(AimtuneError::empty_input("no frames decoded"));
    }

    tracing::info!(
        frames = frames_analyzed,
        engagements = aggregator.engagement_count(),
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Analysis pass complete"
    );

    aggregator.finish(frames_analyzed)
}

/// Decode `path` with ffmpeg and analyze it.
pub fn analyze_video(
    path: &Path,
    combat_events: &[CombatEvent],
    config: &AnalysisConfig,
    cancel: Option<&CancelToken>,
) -> AimtuneResult<SessionSummary> {
    config.validate()?;
    let source = FfmpegFrameSource::open(path, &config.region_of_interest, config.sampling_rate_hz)?;
    tracing::info!(
        path = %path.display(),
        width = source.info().width,
        height = source.info().height,
        duration_secs = source.info().duration_secs,
        "Analyzing video"
    );
    analyze_frames(source, combat_events, config, cancel)
}

/// Analyze a directory of still frames captured at `native_fps`.
pub fn analyze_image_sequence(
    dir: &Path,
    native_fps: f64,
    combat_events: &[CombatEvent],
    config: &AnalysisConfig,
    cancel: Option<&CancelToken>,
) -> AimtuneResult<SessionSummary> {
    config.validate()?;
    let source = ImageSequenceSource::open(
        dir,
        native_fps,
        &config.region_of_interest,
        config.sampling_rate_hz,
    )?;
    tracing::info!(dir = %dir.display(), native_fps, "Analyzing image sequence");
    analyze_frames(source, combat_events, config, cancel)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_cancel_token_is_shared() {
        let token = CancelToken::new();
        let clone = token.clone();
        assert!(!clone.is_cancelled());
        token.cancel();
        assert!(clone.is_cancelled());
    }

    #[test]
    fn test_frame_tap_stops_once_cancelled() {
        let count = Cell::new(0);
        let token = CancelToken::new();
        token.cancel();
        let mut tap = FrameTap {
            inner: std::iter::empty::<AimtuneResult<Frame>>(),
            count: &count,
            cancel: Some(&token),
            stopped: false,
        };
        assert!(matches!(tap.next(), Some(Err(AimtuneError::Cancelled))));
        assert!(tap.next().is_none());
        assert_eq!(count.get(), 0);
    }

    #[test]
    fn test_no_frames_is_empty_input() {
        let err = analyze_frames(
            std::iter::empty::<AimtuneResult<Frame>>(),
            &[],
            &AnalysisConfig::default(),
            None,
        )
        .unwrap_err();
        assert!(matches!(err, AimtuneError::EmptyInput { .. }));
    }
}
