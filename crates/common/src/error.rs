//! Error types shared across AimTune crates.

use std::fmt;
use std::path::PathBuf;

/// Pipeline stage an error originated from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineStage {
    FrameSource,
    MotionExtractor,
    EventSegmenter,
    EngagementScorer,
    Aggregator,
}

impl PipelineStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::FrameSource => "frame_source",
            Self::MotionExtractor => "motion_extractor",
            Self::EventSegmenter => "event_segmenter",
            Self::EngagementScorer => "engagement_scorer",
            Self::Aggregator => "aggregator",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Top-level error type for AimTune operations.
#[derive(Debug, thiserror::Error)]
pub enum AimtuneError {
    #[error("Decode error in {stage}{}: {message}", fmt_timestamp(*.timestamp_secs))]
    Decode {
        stage: PipelineStage,
        timestamp_secs: Option<f64>,
        message: String,
    },

    #[error("Empty input: {message}")]
    EmptyInput { message: String },

    #[error("Tracking lost from {start_secs:.3}s to {end_secs:.3}s ({samples} samples)")]
    TrackingLost {
        start_secs: f64,
        end_secs: f64,
        samples: usize,
    },

    #[error("Insufficient data: {engagements} engagement(s) detected")]
    InsufficientData { engagements: usize },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("File not found: {path}")]
    FileNotFound { path: PathBuf },

    #[error("Unsupported operation: {message}")]
    Unsupported { message: String },

    #[error("Session cancelled")]
    Cancelled,

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),

    #[error(transparent)]
    Other(#[from] anyhow::Error),
}

/// Result type alias using AimtuneError.
pub type AimtuneResult<T> = Result<T, AimtuneError>;

fn fmt_timestamp(timestamp_secs: Option<f64>) -> String {
    timestamp_secs
        .map(|t| format!(" at {t:.3}s"))
        .unwrap_or_default()
}

impl AimtuneError {
    pub fn decode(stage: PipelineStage, msg: impl Into<String>) -> Self {
        Self::Decode {
            stage,
            timestamp_secs: None,
            message: msg.into(),
        }
    }

    pub fn decode_at(stage: PipelineStage, timestamp_secs: f64, msg: impl Into<String>) -> Self {
        Self::Decode {
            stage,
            timestamp_secs: Some(timestamp_secs),
            message: msg.into(),
        }
    }

    pub fn empty_input(msg: impl Into<String>) -> Self {
        Self::EmptyInput {
            message: msg.into(),
        }
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config {
            message: msg.into(),
        }
    }

    pub fn unsupported(msg: impl Into<String>) -> Self {
        Self::Unsupported {
            message: msg.into(),
        }
    }

    /// Whether the error ends the session. Tracking loss is the only kind
    /// that is reported alongside a result rather than instead of one.
    pub fn is_terminal(&self) -> bool {
        !matches!(self, Self::TrackingLost { .. })
    }

    /// Stage the error originated from, when known.
    pub fn stage(&self) -> Option<PipelineStage> {
        match self {
            Self::Decode { stage, .. } => Some(*stage),
            Self::EmptyInput { .. } => Some(PipelineStage::FrameSource),
            Self::TrackingLost { .. } => Some(PipelineStage::MotionExtractor),
            Self::InsufficientData { .. } => Some(PipelineStage::Aggregator),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decode_error_message_carries_stage_and_time() {
        let err = AimtuneError::decode_at(PipelineStage::FrameSource, 1.25, "truncated frame");
        let msg = err.to_string();
        assert!(msg.contains("frame_source"));
        assert!(msg.contains("1.250s"));
        assert!(msg.contains("truncated frame"));
    }

    #[test]
    fn decode_error_without_timestamp() {
        let err = AimtuneError::decode(PipelineStage::FrameSource, "bad header");
        assert_eq!(err.to_string(), "Decode error in frame_source: bad header");
    }

    #[test]
    fn tracking_lost_is_not_terminal() {
        let lost = AimtuneError::TrackingLost {
            start_secs: 0.0,
            end_secs: 1.0,
            samples: 30,
        };
        assert!(!lost.is_terminal());
        assert!(AimtuneError::InsufficientData { engagements: 0 }.is_terminal());
        assert_eq!(lost.stage(), Some(PipelineStage::MotionExtractor));
    }
}
