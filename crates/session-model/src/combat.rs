//! Combat event types.
//!
//! Combat events come from two places: HUD indicators detected in the
//! video itself, and externally supplied logs in JSONL format (one JSON
//! object per line, `#` lines are comments).

use serde::{Deserialize, Serialize};

use crate::{ns_to_secs, TimestampNs};

/// What happened. Variants are declared in ascending severity so the
/// derived ordering gives `Kill > HitConfirmed > ShotFired`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CombatKind {
    ShotFired,
    HitConfirmed,
    Kill,
}

impl CombatKind {
    /// Whether the event confirms the target was hit.
    pub fn is_hit(&self) -> bool {
        matches!(self, Self::HitConfirmed | Self::Kill)
    }
}

/// Where a combat event was observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum CombatSource {
    /// Detected from HUD indicators in the analysed video.
    Hud,
    /// Supplied by the caller alongside the video.
    #[default]
    External,
}

/// A single timestamped combat event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CombatEvent {
    /// Nanoseconds since the start of the recording.
    #[serde(rename = "t")]
    pub timestamp_ns: TimestampNs,

    pub kind: CombatKind,

    #[serde(default)]
    pub source: CombatSource,
}

impl CombatEvent {
    pub fn new(timestamp_ns: TimestampNs, kind: CombatKind) -> Self {
        Self {
            timestamp_ns,
            kind,
            source: CombatSource::External,
        }
    }

    pub fn from_hud(timestamp_ns: TimestampNs, kind: CombatKind) -> Self {
        Self {
            timestamp_ns,
            kind,
            source: CombatSource::Hud,
        }
    }

    /// Timestamp as fractional seconds.
    pub fn timestamp_secs(&self) -> f64 {
        ns_to_secs(self.timestamp_ns)
    }
}

/// Parse combat events from JSONL content and return them in time order.
pub fn parse_combat_events(jsonl: &str) -> Result<Vec<CombatEvent>, serde_json::Error> {
    let mut events = jsonl
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty() && !line.starts_with('#'))
        .map(serde_json::from_str)
        .collect::<Result<Vec<CombatEvent>, _>>()?;
    events.sort_by_key(|e| e.timestamp_ns);
    Ok(events)
}

/// Serialize combat events to JSONL format.
pub fn serialize_combat_events(events: &[CombatEvent]) -> Result<String, serde_json::Error> {
    let mut output = String::new();
    for event in events {
        output.push_str(&serde_json::to_string(event)?);
        output.push('\n');
    }
    Ok(output)
}

/// The most severe kind among `events`, if any.
pub fn most_severe<'a>(events: impl IntoIterator<Item = &'a CombatEvent>) -> Option<CombatKind> {
    events.into_iter().map(|e| e.kind).max()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_severity_order() {
        assert!(CombatKind::Kill > CombatKind::HitConfirmed);
        assert!(CombatKind::HitConfirmed > CombatKind::ShotFired);
        let events = [
            CombatEvent::new(0, CombatKind::ShotFired),
            CombatEvent::new(1, CombatKind::Kill),
            CombatEvent::new(2, CombatKind::HitConfirmed),
        ];
        assert_eq!(most_severe(&events), Some(CombatKind::Kill));
        assert_eq!(most_severe(&[] as &[CombatEvent]), None);
    }

    #[test]
    fn test_parse_sorts_and_skips_comments() {
        let jsonl = "# exported from match 12\n\
                     {\"t\":2000000000,\"kind\":\"kill\"}\n\
                     \n\
                     {\"t\":1000000000,\"kind\":\"shot_fired\",\"source\":\"hud\"}\n";
        let events = parse_combat_events(jsonl).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].kind, CombatKind::ShotFired);
        assert_eq!(events[0].source, CombatSource::Hud);
        assert_eq!(events[1].source, CombatSource::External);
        assert!((events[1].timestamp_secs() - 2.0).abs() < 1e-9);
    }

    #[test]
    fn test_json_format() {
        let event = CombatEvent::new(1234, CombatKind::HitConfirmed);
        let line = serialize_combat_events(&[event]).unwrap();
        assert!(line.contains("\"t\":1234"));
        assert!(line.contains("\"kind\":\"hit_confirmed\""));
        assert!(line.ends_with('\n'));
    }

    #[test]
    fn test_malformed_line_is_an_error() {
        assert!(parse_combat_events("{\"t\":1,\"kind\":\"headshot\"}").is_err());
    }
}
