//! Engagement segmentation.
//!
//! The motion stream is cut into aim engagements by a small state machine:
//!
//! ```text
//!            N fast samples             combat event / settled / max duration
//!   Idle ─────────────────▶ Acquiring ───────────────────────────────────▶ Resolving
//!    ▲                                                                       │
//!    └──────────── window elapsed / fast sample (re-acquire) ────────────────┘
//! ```
//!
//! [`step`] is a pure function of `(state, input, config)`; [`Segmenter`]
//! drives it over a record stream and yields what each transition emits.

use std::collections::VecDeque;

use aimtune_common::clock::{ns_to_secs, secs_to_ns, TimestampNs};
use aimtune_common::config::AnalysisConfig;
use aimtune_common::error::AimtuneResult;
use aimtune_session_model::{
    AcquisitionEnd, CombatEvent, CombatKind, Engagement, MotionRecord, MotionSample, Outcome,
    TrackingGap,
};

/// An engagement that has started but not yet been finalized.
#[derive(Debug, Clone, PartialEq)]
pub struct OpenEngagement {
    pub start_ns: TimestampNs,
    pub samples: Vec<MotionSample>,
    pub decisive_event: Option<CombatKind>,
    /// Start of the current run of below-settle samples.
    pub settle_since_ns: Option<TimestampNs>,
}

impl OpenEngagement {
    fn new(onset: Vec<MotionSample>) -> Self {
        Self {
            start_ns: onset.first().map_or(0, |s| s.t0_ns),
            samples: onset,
            decisive_event: None,
            settle_since_ns: None,
        }
    }

    fn last_sample_end(&self) -> TimestampNs {
        self.samples.last().map_or(self.start_ns, |s| s.t1_ns)
    }

    fn record_event(&mut self, kind: CombatKind) {
        self.decisive_event = self.decisive_event.max(Some(kind));
    }
}

/// Segmenter state.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmenterState {
    /// No engagement open; `onset` holds the current run of fast samples and
    /// `held` the combat events seen since that run began.
    Idle {
        onset: Vec<MotionSample>,
        held: Vec<CombatEvent>,
    },
    /// Aim is moving toward a target.
    Acquiring(OpenEngagement),
    /// Waiting for the outcome until `window_end_ns`.
    Resolving {
        engagement: OpenEngagement,
        acquisition_end: AcquisitionEnd,
        window_end_ns: TimestampNs,
    },
}

impl Default for SegmenterState {
    fn default() -> Self {
        Self::Idle {
            onset: Vec::new(),
            held: Vec::new(),
        }
    }
}

/// Input to the state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmenterInput {
    Sample(MotionSample),
    Combat(CombatEvent),
    Gap(TrackingGap),
    EndOfStream,
}

impl From<MotionRecord> for SegmenterInput {
    fn from(record: MotionRecord) -> Self {
        match record {
            MotionRecord::Sample(s) => Self::Sample(s),
            MotionRecord::Combat(e) => Self::Combat(e),
            MotionRecord::Gap(g) => Self::Gap(g),
        }
    }
}

/// Output of the segmentation stage.
#[derive(Debug, Clone, PartialEq)]
pub enum SegmentEvent {
    /// A motion sample, passed through for session statistics.
    Sample(MotionSample),
    /// A tracking gap, passed through for session statistics.
    Gap(TrackingGap),
    /// A combat event that arrived while no engagement was open.
    Unattributed(CombatEvent),
    /// An engagement shorter than the minimum duration.
    Discarded {
        start_ns: TimestampNs,
        end_ns: TimestampNs,
    },
    /// A finalized engagement.
    Engagement(Engagement),
}

/// Result of one [`step`].
#[derive(Debug, Clone, PartialEq)]
pub struct Transition {
    pub state: SegmenterState,
    pub emitted: Vec<SegmentEvent>,
}

impl Transition {
    fn stay(state: SegmenterState) -> Self {
        Self {
            state,
            emitted: Vec::new(),
        }
    }
}

/// Advance the segmenter by one input.
pub fn step(state: SegmenterState, input: SegmenterInput, config: &AnalysisConfig) -> Transition {
    match input {
        SegmenterInput::Sample(sample) => on_sample(state, sample, config),
        SegmenterInput::Combat(event) => on_combat(state, event, config),
        SegmenterInput::Gap(gap) => Transition {
            state,
            emitted: vec![SegmentEvent::Gap(gap)],
        },
        SegmenterInput::EndOfStream => match state {
            SegmenterState::Idle { held, .. } => Transition {
                state: SegmenterState::default(),
                emitted: unattributed(held),
            },
            SegmenterState::Acquiring(engagement) => Transition {
                state: SegmenterState::default(),
                emitted: vec![finalize(engagement, AcquisitionEnd::EndOfStream, config)],
            },
            SegmenterState::Resolving {
                engagement,
                acquisition_end,
                ..
            } => Transition {
                state: SegmenterState::default(),
                emitted: vec![finalize(engagement, acquisition_end, config)],
            },
        },
    }
}

fn on_sample(state: SegmenterState, sample: MotionSample, config: &AnalysisConfig) -> Transition {
    let speed = sample.angular_speed();
    match state {
        SegmenterState::Idle { mut onset, held } => {
            if speed < config.onset_threshold {
                return Transition {
                    state: SegmenterState::default(),
                    emitted: unattributed(held),
                };
            }
            onset.push(sample);
            if onset.len() < config.onset_min_samples {
                return Transition::stay(SegmenterState::Idle { onset, held });
            }
            tracing::debug!(
                start = ns_to_secs(onset[0].t0_ns),
                speed,
                held = held.len(),
                "Engagement onset"
            );
            let engagement = OpenEngagement::new(onset);
            let opened = Transition::stay(check_max_duration(engagement, sample.t1_ns, config));
            // Events from inside the onset run belong to the new engagement.
            held.into_iter().fold(opened, |mut acc, event| {
                let next = on_combat(acc.state, event, config);
                acc.emitted.extend(next.emitted);
                Transition {
                    state: next.state,
                    emitted: acc.emitted,
                }
            })
        }

        SegmenterState::Acquiring(mut engagement) => {
            engagement.samples.push(sample);
            if speed < config.settle_threshold {
                let since = *engagement.settle_since_ns.get_or_insert(sample.t0_ns);
                if sample.t1_ns.saturating_sub(since) >= secs_to_ns(config.settle_dwell_secs) {
                    return Transition::stay(resolving(
                        engagement,
                        AcquisitionEnd::Settled,
                        sample.t1_ns,
                        config,
                    ));
                }
            } else {
                engagement.settle_since_ns = None;
            }
            Transition::stay(check_max_duration(engagement, sample.t1_ns, config))
        }

        SegmenterState::Resolving {
            mut engagement,
            acquisition_end,
            window_end_ns,
        } => {
            let reacquire = speed >= config.onset_threshold;
            if reacquire || sample.t1_ns > window_end_ns {
                if reacquire {
                    tracing::debug!(t = sample.t1_secs(), "Re-acquisition ends engagement");
                }
                let finalized = finalize(engagement, acquisition_end, config);
                let mut next = on_sample(SegmenterState::default(), sample, config);
                next.emitted.insert(0, finalized);
                return next;
            }
            engagement.samples.push(sample);
            Transition::stay(SegmenterState::Resolving {
                engagement,
                acquisition_end,
                window_end_ns,
            })
        }
    }
}

fn on_combat(state: SegmenterState, event: CombatEvent, config: &AnalysisConfig) -> Transition {
    match state {
        SegmenterState::Idle { onset, mut held } => {
            if onset.is_empty() {
                return Transition {
                    state: SegmenterState::Idle { onset, held },
                    emitted: vec![SegmentEvent::Unattributed(event)],
                };
            }
            held.push(event);
            Transition::stay(SegmenterState::Idle { onset, held })
        }

        SegmenterState::Acquiring(mut engagement) => {
            engagement.record_event(event.kind);
            Transition::stay(resolving(
                engagement,
                AcquisitionEnd::CombatEvent,
                event.timestamp_ns,
                config,
            ))
        }

        SegmenterState::Resolving {
            mut engagement,
            acquisition_end,
            window_end_ns,
        } => {
            if event.timestamp_ns < window_end_ns {
                engagement.record_event(event.kind);
                return Transition::stay(SegmenterState::Resolving {
                    engagement,
                    acquisition_end,
                    window_end_ns,
                });
            }
            let finalized = finalize(engagement, acquisition_end, config);
            Transition {
                state: SegmenterState::default(),
                emitted: vec![finalized, SegmentEvent::Unattributed(event)],
            }
        }
    }
}

fn unattributed(events: Vec<CombatEvent>) -> Vec<SegmentEvent> {
    events.into_iter().map(SegmentEvent::Unattributed).collect()
}

fn resolving(
    engagement: OpenEngagement,
    acquisition_end: AcquisitionEnd,
    window_start_ns: TimestampNs,
    config: &AnalysisConfig,
) -> SegmenterState {
    tracing::trace!(
        reason = ?acquisition_end,
        t = ns_to_secs(window_start_ns),
        "Engagement resolving"
    );
    SegmenterState::Resolving {
        engagement,
        acquisition_end,
        window_end_ns: window_start_ns + secs_to_ns(config.resolve_window_secs),
    }
}

fn check_max_duration(
    engagement: OpenEngagement,
    now_ns: TimestampNs,
    config: &AnalysisConfig,
) -> SegmenterState {
    if now_ns.saturating_sub(engagement.start_ns) >= secs_to_ns(config.max_engagement_secs) {
        resolving(engagement, AcquisitionEnd::MaxDuration, now_ns, config)
    } else {
        SegmenterState::Acquiring(engagement)
    }
}

fn finalize(
    engagement: OpenEngagement,
    acquisition_end: AcquisitionEnd,
    config: &AnalysisConfig,
) -> SegmentEvent {
    let start_ns = engagement.start_ns;
    let end_ns = engagement.last_sample_end();
    if ns_to_secs(end_ns.saturating_sub(start_ns)) < config.min_engagement_duration {
        tracing::trace!(
            start = ns_to_secs(start_ns),
            end = ns_to_secs(end_ns),
            "Discarding short engagement"
        );
        return SegmentEvent::Discarded { start_ns, end_ns };
    }

    let outcome = Outcome::from_decisive(engagement.decisive_event);
    tracing::debug!(
        start = ns_to_secs(start_ns),
        end = ns_to_secs(end_ns),
        outcome = ?outcome,
        reason = ?acquisition_end,
        samples = engagement.samples.len(),
        "Engagement finalized"
    );
    SegmentEvent::Engagement(Engagement {
        start_ns,
        end_ns,
        samples: engagement.samples,
        outcome,
        decisive_event: engagement.decisive_event,
        acquisition_end,
    })
}

/// Iterator adapter that runs [`step`] over a motion record stream.
///
/// Every sample and gap is passed through ahead of whatever its transition
/// emits, so downstream consumers see the full stream in order.
pub struct Segmenter<'a, I> {
    inner: I,
    config: &'a AnalysisConfig,
    state: SegmenterState,
    pending: VecDeque<SegmentEvent>,
    done: bool,
}

impl<'a, I> Segmenter<'a, I>
where
    I: Iterator<Item = AimtuneResult<MotionRecord>>,
{
    pub fn new(inner: I, config: &'a AnalysisConfig) -> Self {
        Self {
            inner,
            config,
            state: SegmenterState::default(),
            pending: VecDeque::new(),
            done: false,
        }
    }

    fn apply(&mut self, input: SegmenterInput) {
        if let SegmenterInput::Sample(sample) = &input {
            self.pending.push_back(SegmentEvent::Sample(*sample));
        }
        let state = std::mem::take(&mut self.state);
        let transition = step(state, input, self.config);
        self.state = transition.state;
        self.pending.extend(transition.emitted);
    }
}

impl<'a, I> Iterator for Segmenter<'a, I>
where
    I: Iterator<Item = AimtuneResult<MotionRecord>>,
{
    type Item = AimtuneResult<SegmentEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            if let Some(event) = self.pending.pop_front() {
                return Some(Ok(event));
            }
            if self.done {
                return None;
            }
            match self.inner.next() {
                Some(Ok(record)) => self.apply(record.into()),
                Some(Err(e)) => {
                    self.done = true;
                    return Some(Err(e));
                }
                None => {
                    self.done = true;
                    self.apply(SegmenterInput::EndOfStream);
                }
            }
        }
    }
}
