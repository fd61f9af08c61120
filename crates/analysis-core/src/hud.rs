//! HUD combat indicator detection.
//!
//! Each rule watches a sub-rectangle of the ROI for pixels inside an RGB
//! range. When the matching fraction rises above the rule's threshold a
//! combat event is emitted at the frame timestamp. The indicator must drop
//! below the threshold before it can fire again, and a per-rule cooldown
//! suppresses flicker.

use aimtune_common::clock::{secs_to_ns, TimestampNs};
use aimtune_common::config::{HudIndicator, HudRule};
use aimtune_frame_source::Frame;
use aimtune_session_model::{CombatEvent, CombatKind};

/// Combat kind signalled by a HUD indicator.
pub fn indicator_kind(indicator: HudIndicator) -> CombatKind {
    match indicator {
        HudIndicator::MuzzleFlash => CombatKind::ShotFired,
        HudIndicator::HitMarker => CombatKind::HitConfirmed,
        HudIndicator::KillBanner => CombatKind::Kill,
    }
}

#[derive(Debug, Clone)]
struct RuleState {
    rule: HudRule,
    cooldown_ns: TimestampNs,
    visible: bool,
    last_fired_ns: Option<TimestampNs>,
}

/// Stateful detector over a frame sequence.
#[derive(Debug, Clone)]
pub struct HudDetector {
    rules: Vec<RuleState>,
}

impl HudDetector {
    /// Returns `None` when there are no rules to evaluate.
    pub fn new(rules: &[HudRule]) -> Option<Self> {
        if rules.is_empty() {
            return None;
        }
        Some(Self {
            rules: rules
                .iter()
                .map(|rule| RuleState {
                    rule: *rule,
                    cooldown_ns: secs_to_ns(rule.cooldown_secs),
                    visible: false,
                    last_fired_ns: None,
                })
                .collect(),
        })
    }

    /// Evaluate every rule against `frame`, returning newly detected events.
    pub fn detect(&mut self, frame: &Frame) -> Vec<CombatEvent> {
        let mut events = Vec::new();
        for state in &mut self.rules {
            let fraction = match_fraction(frame, &state.rule);
            let visible = fraction >= state.rule.min_fraction && fraction > 0.0;
            let rising = visible && !state.visible;
            state.visible = visible;
            if !rising {
                continue;
            }

            let cooled = state
                .last_fired_ns
                .map_or(true, |last| frame.timestamp_ns.saturating_sub(last) >= state.cooldown_ns);
            if !cooled {
                tracing::trace!(
                    indicator = ?state.rule.indicator,
                    t = frame.timestamp_secs(),
                    "HUD indicator suppressed by cooldown"
                );
                continue;
            }

            state.last_fired_ns = Some(frame.timestamp_ns);
            let kind = indicator_kind(state.rule.indicator);
            tracing::debug!(
                kind = ?kind,
                fraction,
                t = frame.timestamp_secs(),
                "HUD combat indicator detected"
            );
            events.push(CombatEvent::from_hud(frame.timestamp_ns, kind));
        }
        events
    }
}

/// Fraction of pixels in the rule's region that fall inside its colour range.
fn match_fraction(frame: &Frame, rule: &HudRule) -> f64 {
    let (roi_w, roi_h) = frame.roi_dimensions();
    let (x, y, w, h) = rule.region.to_pixels(roi_w, roi_h);
    let mut matched = 0u64;
    for py in y..y + h {
        for px in x..x + w {
            let p = frame.image.get_pixel(px, py);
            if (0..3).all(|c| p[c] >= rule.lower[c] && p[c] <= rule.upper[c]) {
                matched += 1;
            }
        }
    }
    matched as f64 / (w as f64 * h as f64)
}

#[cfg(test)]
mod tests {
    use super::*;
    use aimtune_common::config::RegionOfInterest;
    use aimtune_frame_source::synthetic::fill_rect;
    use aimtune_session_model::CombatSource;
    use image::{Rgb, RgbImage};

    fn hit_marker_rule() -> HudRule {
        HudRule {
            indicator: HudIndicator::HitMarker,
            region: RegionOfInterest::centered(0.2, 0.2),
            lower: [200, 0, 0],
            upper: [255, 60, 60],
            min_fraction: 0.3,
            cooldown_secs: 0.1,
        }
    }

    fn frame(index: u64, marker: bool) -> Frame {
        let mut image = RgbImage::from_pixel(100, 100, Rgb([20, 20, 20]));
        if marker {
            fill_rect(&mut image, 40, 40, 20, 20, [255, 10, 10]);
        }
        Frame {
            index,
            timestamp_ns: index * 33_333_333,
            image,
            source_width: 100,
            source_height: 100,
        }
    }

    #[test]
    fn test_no_rules_disables_detection() {
        assert!(HudDetector::new(&[]).is_none());
    }

    #[test]
    fn test_fires_on_rising_edge_only() {
        let mut detector = HudDetector::new(&[hit_marker_rule()]).unwrap();
        assert!(detector.detect(&frame(0, false)).is_empty());

        let events = detector.detect(&frame(1, true));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].kind, CombatKind::HitConfirmed);
        assert_eq!(events[0].source, CombatSource::Hud);
        assert_eq!(events[0].timestamp_ns, 33_333_333);

        // Marker still visible: no new event.
        assert!(detector.detect(&frame(2, true)).is_empty());
    }

    #[test]
    fn test_cooldown_suppresses_flicker() {
        let mut detector = HudDetector::new(&[hit_marker_rule()]).unwrap();
        assert_eq!(detector.detect(&frame(0, true)).len(), 1);
        assert!(detector.detect(&frame(1, false)).is_empty());
        // 66ms after the first detection, inside the 100ms cooldown.
        assert!(detector.detect(&frame(2, true)).is_empty());
        assert!(detector.detect(&frame(3, false)).is_empty());
        assert_eq!(detector.detect(&frame(4, true)).len(), 1);
    }

    #[test]
    fn test_indicator_mapping() {
        assert_eq!(indicator_kind(HudIndicator::MuzzleFlash), CombatKind::ShotFired);
        assert_eq!(indicator_kind(HudIndicator::KillBanner), CombatKind::Kill);
    }
}
