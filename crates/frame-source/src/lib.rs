//! AimTune Frame Source
//!
//! Turns a recording into a lazy, forward-only sequence of timestamped
//! region-of-interest frames at a controlled sampling rate.
//!
//! ```text
//! match.mp4 ──ffprobe──▶ VideoInfo
//!     │
//!     └──ffmpeg fps=R,crop=ROI──▶ rgb24 pipe ──▶ Frame, Frame, ...
//!
//! frames/0001.png ... ──FrameSampler──▶ crop ROI ──▶ Frame, Frame, ...
//! ```
//!
//! Every source implements `Iterator<Item = AimtuneResult<Frame>>`, so the
//! analysis pipeline pulls frames one at a time and memory stays bounded by
//! a couple of ROI crops.

pub mod ffmpeg;
pub mod frame;
pub mod memory;
pub mod sequence;
pub mod synthetic;

pub use ffmpeg::{command_exists, ffmpeg_available, probe_video, FfmpegFrameSource, VideoInfo};
pub use frame::{crop_roi, Frame};
pub use memory::MemoryFrameSource;
pub use sequence::ImageSequenceSource;
