//! AimTune Analysis Core
//!
//! Turns a stream of region-of-interest frames into a sensitivity
//! recommendation:
//! - **Motion:** estimate viewpoint displacement between consecutive frames
//! - **HUD:** optionally detect combat indicators drawn on screen
//! - **Segmentation:** cut the motion stream into aim engagements
//! - **Scoring:** kinematic features per engagement
//! - **Aggregation:** session statistics and the recommendation policy
//!
//! Every stage is a pull-based iterator adapter over the previous one; the
//! only I/O happens in the frame source handed to [`pipeline::analyze_frames`].

pub mod aggregate;
pub mod hud;
pub mod luma;
pub mod merge;
pub mod motion;
pub mod pipeline;
pub mod scorer;
pub mod segmenter;
pub mod smoothing;
pub mod stats;

pub use aggregate::{recommend, SessionAggregator};
pub use motion::{angular_degrees, MotionExtractor};
pub use pipeline::{analyze_frames, analyze_image_sequence, analyze_video, CancelToken};
pub use scorer::score_engagement;
pub use segmenter::{step, SegmentEvent, Segmenter, SegmenterInput, SegmenterState, Transition};
pub use smoothing::MotionSmoother;
