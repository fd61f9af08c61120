//! Application and analysis configuration.
//!
//! [`AnalysisConfig`] is threaded explicitly through every pipeline stage;
//! nothing in the engine reads ambient state. [`AppConfig`] wraps it with
//! logging settings and handles loading from disk.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{AimtuneError, AimtuneResult};

/// Global application configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Analysis thresholds and stage settings.
    pub analysis: AnalysisConfig,

    /// Logging configuration.
    pub logging: LoggingConfig,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level filter (e.g., "info", "debug", "aimtune=debug,warn").
    pub level: String,

    /// Whether to output structured JSON logs.
    pub json: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

/// Crop rectangle for the HUD/crosshair area.
///
/// Coordinates are normalized: `(0.0, 0.0)` is top-left,
/// `(1.0, 1.0)` is bottom-right of the full video frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RegionOfInterest {
    /// Left edge (normalized).
    pub x: f64,
    /// Top edge (normalized).
    pub y: f64,
    /// Width (normalized).
    pub w: f64,
    /// Height (normalized).
    pub h: f64,
}

impl RegionOfInterest {
    /// The whole frame.
    pub const FULL: RegionOfInterest = RegionOfInterest {
        x: 0.0,
        y: 0.0,
        w: 1.0,
        h: 1.0,
    };

    /// Region of the given size centered on the screen (where the crosshair sits).
    pub fn centered(w: f64, h: f64) -> Self {
        let w = w.clamp(0.01, 1.0);
        let h = h.clamp(0.01, 1.0);
        Self {
            x: (1.0 - w) / 2.0,
            y: (1.0 - h) / 2.0,
            w,
            h,
        }
    }

    /// Resolve to a pixel rectangle `(x, y, width, height)` for a frame of the
    /// given size. Width and height are at least one pixel and the rectangle
    /// never extends past the frame.
    pub fn to_pixels(&self, frame_width: u32, frame_height: u32) -> (u32, u32, u32, u32) {
        let fw = frame_width as f64;
        let fh = frame_height as f64;
        let x = (self.x * fw).floor().clamp(0.0, (fw - 1.0).max(0.0)) as u32;
        let y = (self.y * fh).floor().clamp(0.0, (fh - 1.0).max(0.0)) as u32;
        let w = ((self.w * fw).round() as u32).clamp(1, frame_width.saturating_sub(x).max(1));
        let h = ((self.h * fh).round() as u32).clamp(1, frame_height.saturating_sub(y).max(1));
        (x, y, w, h)
    }

    fn validate(&self) -> AimtuneResult<()> {
        let in_unit = |v: f64| (0.0..=1.0).contains(&v);
        if !(in_unit(self.x) && in_unit(self.y)) || self.w <= 0.0 || self.h <= 0.0 {
            return Err(AimtuneError::config(format!(
                "region_of_interest must lie within the unit square, got {self:?}"
            )));
        }
        if self.x + self.w > 1.0 + 1e-9 || self.y + self.h > 1.0 + 1e-9 {
            return Err(AimtuneError::config(format!(
                "region_of_interest extends past the frame: {self:?}"
            )));
        }
        Ok(())
    }
}

impl Default for RegionOfInterest {
    fn default() -> Self {
        Self::centered(0.3, 0.4)
    }
}

/// How viewpoint motion is measured between two frames.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TrackingMode {
    /// Global block matching of the scene around the (masked) crosshair.
    #[default]
    SceneShift,
    /// Follow the centroid of crosshair-coloured pixels.
    CrosshairColor,
}

/// Colour range used to locate the crosshair in `crosshair_color` mode.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CrosshairColorConfig {
    /// Inclusive lower RGB bound.
    pub lower: [u8; 3],
    /// Inclusive upper RGB bound.
    pub upper: [u8; 3],
    /// Matched pixel count at which detection confidence saturates.
    pub min_pixels: u32,
}

impl Default for CrosshairColorConfig {
    fn default() -> Self {
        // Stock green crosshair.
        Self {
            lower: [0, 150, 0],
            upper: [150, 255, 150],
            min_pixels: 12,
        }
    }
}

/// Motion tracking parameters.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingConfig {
    pub mode: TrackingMode,

    /// Largest inter-frame shift searched, as a fraction of the ROI size.
    pub max_shift_fraction: f64,

    /// Downscale factor of the coarse search level.
    pub pyramid_factor: u32,

    /// Half-size of the masked crosshair box, as a fraction of the ROI size.
    pub crosshair_mask_fraction: f64,

    /// Pixel stride used when accumulating block-matching cost.
    pub sample_stride: u32,

    /// Luma standard deviation at which scene texture is considered
    /// sufficient for full confidence.
    pub texture_floor: f64,

    pub crosshair_color: CrosshairColorConfig,
}

impl Default for TrackingConfig {
    fn default() -> Self {
        Self {
            mode: TrackingMode::SceneShift,
            max_shift_fraction: 0.25,
            pyramid_factor: 4,
            crosshair_mask_fraction: 0.06,
            sample_stride: 2,
            texture_floor: 8.0,
            crosshair_color: CrosshairColorConfig::default(),
        }
    }
}

/// Optional smoothing of the displacement stream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize, Default)]
#[serde(tag = "algorithm", rename_all = "snake_case")]
pub enum SmoothingConfig {
    /// Pass displacements through unchanged.
    #[default]
    None,
    /// Exponential moving average; `strength` in [0.0, 1.0], larger = smoother.
    Ema { strength: f64 },
    /// Centered moving average over `window` samples.
    MovingAverage { window: usize },
}

/// HUD element that signals a combat event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum HudIndicator {
    /// Muzzle flash or ammo counter tick: a shot was fired.
    MuzzleFlash,
    /// Hit marker around the crosshair.
    HitMarker,
    /// Kill banner / kill icon.
    KillBanner,
}

/// Colour rule that detects one HUD indicator inside the ROI.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct HudRule {
    pub indicator: HudIndicator,
    /// Sub-rectangle of the ROI to inspect, normalized to the ROI.
    pub region: RegionOfInterest,
    /// Inclusive lower RGB bound.
    pub lower: [u8; 3],
    /// Inclusive upper RGB bound.
    pub upper: [u8; 3],
    /// Fraction of region pixels in range that counts as "indicator visible".
    pub min_fraction: f64,
    /// Minimum time between two detections of this rule.
    pub cooldown_secs: f64,
}

/// HUD indicator detection. Disabled when `rules` is empty.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HudConfig {
    pub rules: Vec<HudRule>,
}

/// Thresholds of the sensitivity recommendation policy.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RecommendationPolicy {
    /// Median reversal count above which overshooting is diagnosed.
    pub overshoot_reversal_threshold: f64,
    /// Median path efficiency below which movement counts as inefficient.
    pub efficiency_floor: f64,
    /// Median settle time (seconds) above which tracking counts as sluggish.
    pub sluggish_settle_secs: f64,
    /// Median reversal count at or below which sluggishness is diagnosed.
    pub low_reversal_ceiling: f64,
    /// Factor reduction per unit of relative reversal excess.
    pub decrease_gain: f64,
    /// Factor increase per unit of relative settle-time excess.
    pub increase_gain: f64,
    /// Largest adjustment in either direction.
    pub max_adjustment: f64,
    /// Confidence score at or above which confidence is "high".
    pub high_confidence_score: f64,
    /// Confidence score at or above which confidence is "medium".
    pub medium_confidence_score: f64,
    /// Fraction of low-confidence motion samples that forces a low-confidence qualifier.
    pub max_low_confidence_fraction: f64,
}

impl Default for RecommendationPolicy {
    fn default() -> Self {
        Self {
            overshoot_reversal_threshold: 2.0,
            efficiency_floor: 0.7,
            sluggish_settle_secs: 0.35,
            low_reversal_ceiling: 1.0,
            decrease_gain: 0.1,
            increase_gain: 0.1,
            max_adjustment: 0.3,
            high_confidence_score: 0.6,
            medium_confidence_score: 0.35,
            max_low_confidence_fraction: 0.5,
        }
    }
}

/// Flick band boundaries by direct angular displacement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct FlickBands {
    /// Engagements below this displacement (degrees) are small flicks.
    pub small_flick_deg: f64,
    /// Engagements at or above this displacement (degrees) are large flicks.
    pub large_flick_deg: f64,
}

impl Default for FlickBands {
    fn default() -> Self {
        Self {
            small_flick_deg: 5.0,
            large_flick_deg: 20.0,
        }
    }
}

/// What counts as a smooth-tracking run: slow but continuous movement.
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(default)]
pub struct TrackingSegments {
    /// Fastest sample (deg/s) that still counts as tracking.
    pub max_speed: f64,
    /// Per-sample movement (degrees) a sample must exceed to count as moving.
    pub min_step_deg: f64,
    /// Consecutive tracking samples needed to form a segment.
    pub min_samples: usize,
}

impl Default for TrackingSegments {
    fn default() -> Self {
        Self {
            max_speed: 60.0,
            min_step_deg: 0.5,
            min_samples: 3,
        }
    }
}

/// Configuration threaded through every analysis stage.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Frame sampling density (Hz).
    pub sampling_rate_hz: f64,

    /// Crop of the HUD/crosshair area.
    pub region_of_interest: RegionOfInterest,

    /// Horizontal field of view used for angular conversion.
    pub field_of_view_degrees: f64,

    /// Angular speed (deg/s) that starts an engagement.
    pub onset_threshold: f64,

    /// Angular speed (deg/s) below which aim counts as settled.
    pub settle_threshold: f64,

    /// Engagements shorter than this (seconds) are discarded as noise.
    pub min_engagement_duration: f64,

    /// Motion-tracking acceptance floor in [0, 1].
    pub min_confidence: f64,

    /// Engagement count below which recommendations are low-confidence.
    pub min_sample_count: usize,

    /// Consecutive above-onset samples needed to start an engagement.
    pub onset_min_samples: usize,

    /// How long speed must stay below `settle_threshold` to count as settled.
    pub settle_dwell_secs: f64,

    /// Resolving window / disengage timeout (seconds).
    pub resolve_window_secs: f64,

    /// Acquisition longer than this is forced into resolution.
    pub max_engagement_secs: f64,

    /// Consecutive low-confidence samples reported as a tracking gap.
    pub tracking_lost_run: usize,

    pub tracking: TrackingConfig,

    pub smoothing: SmoothingConfig,

    pub hud: HudConfig,

    pub policy: RecommendationPolicy,

    pub flick_bands: FlickBands,

    pub tracking_segments: TrackingSegments,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            sampling_rate_hz: 30.0,
            region_of_interest: RegionOfInterest::default(),
            field_of_view_degrees: 103.0,
            onset_threshold: 60.0,
            settle_threshold: 15.0,
            min_engagement_duration: 0.15,
            min_confidence: 0.35,
            min_sample_count: 10,
            onset_min_samples: 2,
            settle_dwell_secs: 0.1,
            resolve_window_secs: 0.35,
            max_engagement_secs: 4.0,
            tracking_lost_run: 15,
            tracking: TrackingConfig::default(),
            smoothing: SmoothingConfig::default(),
            hud: HudConfig::default(),
            policy: RecommendationPolicy::default(),
            flick_bands: FlickBands::default(),
            tracking_segments: TrackingSegments::default(),
        }
    }
}

impl AnalysisConfig {
    /// Check thresholds for consistency before a session starts.
    pub fn validate(&self) -> AimtuneResult<()> {
        fn positive(name: &str, value: f64) -> AimtuneResult<()> {
            if value.is_finite() && value > 0.0 {
                Ok(())
            } else {
                Err(AimtuneError::config(format!(
                    "{name} must be positive, got {value}"
                )))
            }
        }

        positive("sampling_rate_hz", self.sampling_rate_hz)?;
        positive("onset_threshold", self.onset_threshold)?;
        positive("settle_threshold", self.settle_threshold)?;
        positive("resolve_window_secs", self.resolve_window_secs)?;
        positive("max_engagement_secs", self.max_engagement_secs)?;
        positive("tracking.max_shift_fraction", self.tracking.max_shift_fraction)?;
        positive("policy.efficiency_floor", self.policy.efficiency_floor)?;
        positive(
            "policy.overshoot_reversal_threshold",
            self.policy.overshoot_reversal_threshold,
        )?;
        positive("policy.sluggish_settle_secs", self.policy.sluggish_settle_secs)?;

        if !(self.field_of_view_degrees > 0.0 && self.field_of_view_degrees < 180.0) {
            return Err(AimtuneError::config(format!(
                "field_of_view_degrees must be in (0, 180), got {}",
                self.field_of_view_degrees
            )));
        }
        if self.settle_threshold >= self.onset_threshold {
            return Err(AimtuneError::config(
                "settle_threshold must be below onset_threshold",
            ));
        }
        if !(0.0..=1.0).contains(&self.min_confidence) {
            return Err(AimtuneError::config("min_confidence must be in [0, 1]"));
        }
        if self.min_engagement_duration < 0.0 || self.settle_dwell_secs < 0.0 {
            return Err(AimtuneError::config("durations must not be negative"));
        }
        if self.min_sample_count == 0 {
            return Err(AimtuneError::config("min_sample_count must be at least 1"));
        }
        if self.onset_min_samples == 0 {
            return Err(AimtuneError::config("onset_min_samples must be at least 1"));
        }
        if self.tracking_lost_run == 0 {
            return Err(AimtuneError::config("tracking_lost_run must be at least 1"));
        }
        if self.tracking.pyramid_factor == 0 || self.tracking.sample_stride == 0 {
            return Err(AimtuneError::config(
                "tracking.pyramid_factor and tracking.sample_stride must be at least 1",
            ));
        }
        if self.policy.low_reversal_ceiling >= self.policy.overshoot_reversal_threshold {
            return Err(AimtuneError::config(
                "policy.low_reversal_ceiling must be below policy.overshoot_reversal_threshold",
            ));
        }
        if !(0.0..1.0).contains(&self.policy.max_adjustment) {
            return Err(AimtuneError::config(format!(
                "policy.max_adjustment must be in [0, 1), got {}",
                self.policy.max_adjustment
            )));
        }
        for (name, gain) in [
            ("policy.decrease_gain", self.policy.decrease_gain),
            ("policy.increase_gain", self.policy.increase_gain),
        ] {
            if !(gain.is_finite() && gain >= 0.0) {
                return Err(AimtuneError::config(format!(
                    "{name} must not be negative, got {gain}"
                )));
            }
        }
        if self.policy.medium_confidence_score > self.policy.high_confidence_score {
            return Err(AimtuneError::config(
                "policy.medium_confidence_score must not exceed policy.high_confidence_score",
            ));
        }
        if self.flick_bands.small_flick_deg > self.flick_bands.large_flick_deg {
            return Err(AimtuneError::config(
                "flick_bands.small_flick_deg must not exceed flick_bands.large_flick_deg",
            ));
        }
        positive("tracking_segments.max_speed", self.tracking_segments.max_speed)?;
        if self.tracking_segments.min_step_deg < 0.0 || self.tracking_segments.min_samples == 0 {
            return Err(AimtuneError::config(
                "tracking_segments.min_step_deg must not be negative and min_samples must be at least 1",
            ));
        }
        if let SmoothingConfig::MovingAverage { window: 0 } = self.smoothing {
            return Err(AimtuneError::config("moving average window must be at least 1"));
        }

        self.region_of_interest.validate()?;
        for rule in &self.hud.rules {
            rule.region.validate()?;
            if !(0.0..=1.0).contains(&rule.min_fraction) {
                return Err(AimtuneError::config(format!(
                    "hud rule {:?}: min_fraction must be in [0, 1]",
                    rule.indicator
                )));
            }
        }

        Ok(())
    }
}

impl AppConfig {
    /// Load config from the standard location, falling back to defaults.
    pub fn load() -> Self {
        let config_path = config_file_path();
        if config_path.exists() {
            match Self::load_from(&config_path) {
                Ok(config) => return config,
                Err(e) => {
                    tracing::warn!("Failed to load config at {:?}: {}", config_path, e);
                }
            }
        }
        Self::default()
    }

    /// Load config from an explicit path.
    pub fn load_from(path: &Path) -> AimtuneResult<Self> {
        if !path.exists() {
            return Err(AimtuneError::FileNotFound {
                path: path.to_path_buf(),
            });
        }
        let content = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&content)?)
    }

    /// Save config to the standard location.
    pub fn save(&self) -> AimtuneResult<PathBuf> {
        let config_path = config_file_path();
        self.save_to(&config_path)?;
        Ok(config_path)
    }

    /// Save config to an explicit path.
    pub fn save_to(&self, path: &Path) -> AimtuneResult<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string_pretty(self)?;
        std::fs::write(path, json)?;
        Ok(())
    }
}

/// Standard config file location.
pub fn config_file_path() -> PathBuf {
    let base = std::env::var("XDG_CONFIG_HOME")
        .map(PathBuf::from)
        .unwrap_or_else(|_| {
            let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
            PathBuf::from(home).join(".config")
        });
    base.join("aimtune").join("config.json")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_is_valid() {
        AnalysisConfig::default().validate().unwrap();
    }

    #[test]
    fn settle_must_be_below_onset() {
        let config = AnalysisConfig {
            settle_threshold: 80.0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(AimtuneError::Config { .. })
        ));
    }

    #[test]
    fn low_reversal_ceiling_must_be_below_overshoot_threshold() {
        let mut config = AnalysisConfig::default();
        config.policy.low_reversal_ceiling = 3.0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn max_adjustment_must_stay_below_one() {
        for value in [1.0, 1.5, -0.1, f64::NAN] {
            let mut config = AnalysisConfig::default();
            config.policy.max_adjustment = value;
            assert!(
                matches!(config.validate(), Err(AimtuneError::Config { .. })),
                "max_adjustment {value} accepted"
            );
        }
        let mut config = AnalysisConfig::default();
        config.policy.max_adjustment = 0.0;
        config.validate().unwrap();
    }

    #[test]
    fn negative_gains_are_rejected() {
        let mut config = AnalysisConfig::default();
        config.policy.decrease_gain = -0.5;
        assert!(matches!(
            config.validate(),
            Err(AimtuneError::Config { .. })
        ));

        let mut config = AnalysisConfig::default();
        config.policy.increase_gain = -0.5;
        assert!(matches!(
            config.validate(),
            Err(AimtuneError::Config { .. })
        ));

        let mut config = AnalysisConfig::default();
        config.policy.increase_gain = f64::INFINITY;
        assert!(config.validate().is_err());
    }

    #[test]
    fn roi_outside_frame_is_rejected() {
        let config = AnalysisConfig {
            region_of_interest: RegionOfInterest {
                x: 0.8,
                y: 0.0,
                w: 0.5,
                h: 0.5,
            },
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn roi_resolves_to_pixels() {
        let roi = RegionOfInterest::centered(0.5, 0.5);
        assert_eq!(roi.to_pixels(1920, 1080), (480, 270, 960, 540));
        assert_eq!(RegionOfInterest::FULL.to_pixels(64, 48), (0, 0, 64, 48));
    }

    #[test]
    fn partial_json_falls_back_to_defaults() {
        let raw = r#"{"analysis":{"sampling_rate_hz":60.0,"policy":{"efficiency_floor":0.5}}}"#;
        let config: AppConfig = serde_json::from_str(raw).unwrap();
        assert_eq!(config.analysis.sampling_rate_hz, 60.0);
        assert_eq!(config.analysis.policy.efficiency_floor, 0.5);
        assert_eq!(config.analysis.policy.overshoot_reversal_threshold, 2.0);
        assert_eq!(config.logging.level, "info");
    }

    #[test]
    fn smoothing_config_is_tagged() {
        let json = serde_json::to_string(&SmoothingConfig::MovingAverage { window: 5 }).unwrap();
        assert_eq!(json, r#"{"algorithm":"moving_average","window":5}"#);
    }
}
