//! Merging externally supplied combat events into the motion stream.

use std::collections::VecDeque;

use aimtune_common::error::AimtuneResult;
use aimtune_session_model::{CombatEvent, MotionRecord};

/// Interleaves time-sorted external combat events with motion records.
///
/// On equal timestamps the motion record goes first, so an event at frame
/// time `t` lands right after the sample ending at `t`.
pub struct MergeCombatEvents<I> {
    inner: I,
    external: VecDeque<CombatEvent>,
    peeked: Option<MotionRecord>,
    inner_done: bool,
}

impl<I> MergeCombatEvents<I>
where
    I: Iterator<Item = AimtuneResult<MotionRecord>>,
{
    pub fn new(inner: I, events: &[CombatEvent]) -> Self {
        let mut external: Vec<CombatEvent> = events.to_vec();
        external.sort_by_key(|e| e.timestamp_ns);
        Self {
            inner,
            external: external.into(),
            peeked: None,
            inner_done: false,
        }
    }
}

impl<I> Iterator for MergeCombatEvents<I>
where
    I: Iterator<Item = AimtuneResult<MotionRecord>>,
{
    type Item = AimtuneResult<MotionRecord>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.peeked.is_none() && !self.inner_done {
            match self.inner.next() {
                Some(Ok(record)) => self.peeked = Some(record),
                Some(Err(e)) => {
                    self.inner_done = true;
                    self.external.clear();
                    return Some(Err(e));
                }
                None => self.inner_done = true,
            }
        }

        let external_first = match (&self.peeked, self.external.front()) {
            (Some(record), Some(event)) => event.timestamp_ns < record.timestamp_ns(),
            (None, Some(_)) => true,
            _ => false,
        };

        if external_first {
            self.external.pop_front().map(|e| Ok(MotionRecord::Combat(e)))
        } else {
            self.peeked.take().map(Ok)
        }
    }
}
