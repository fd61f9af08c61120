//! Frame source over a directory of still images.
//!
//! Frames are taken in file-name order and assumed to be recorded at a
//! known native rate. The shared [`FrameSampler`] thins them to the
//! sampling rate; skipped files are never decoded.

use std::path::{Path, PathBuf};

use aimtune_common::clock::{ns_to_secs, sample_timestamp_ns, FrameSampler};
use aimtune_common::config::RegionOfInterest;
use aimtune_common::error::{AimtuneError, AimtuneResult, PipelineStage};

use crate::frame::Frame;

const IMAGE_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp"];

pub struct ImageSequenceSource {
    paths: std::vec::IntoIter<PathBuf>,
    native_fps: f64,
    native_index: u64,
    sampler: FrameSampler,
    roi: RegionOfInterest,
    next_index: u64,
    failed: bool,
}

impl ImageSequenceSource {
    /// Open `dir`, whose images were captured at `native_fps`.
    pub fn open(
        dir: &Path,
        native_fps: f64,
        roi: &RegionOfInterest,
        sampling_rate_hz: f64,
    ) -> AimtuneResult<Self> {
        if !dir.exists() {
            return Err(AimtuneError::FileNotFound {
                path: dir.to_path_buf(),
            });
        }
        if !(native_fps.is_finite() && native_fps > 0.0) {
            return Err(AimtuneError::config(format!(
                "native frame rate must be positive, got {native_fps}"
            )));
        }

        let mut paths = Vec::new();
        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            if path.is_file() && is_image(&path) {
                paths.push(path);
            }
        }
        paths.sort();

        if paths.is_empty() {
            return Err(AimtuneError::empty_input(format!(
                "no png/jpg/bmp frames in {}",
                dir.display()
            )));
        }

        tracing::info!(
            dir = %dir.display(),
            files = paths.len(),
            native_fps,
            sampling_rate_hz,
            "Opened image sequence"
        );

        Ok(Self {
            paths: paths.into_iter(),
            native_fps,
            native_index: 0,
            sampler: FrameSampler::new(sampling_rate_hz),
            roi: *roi,
            next_index: 0,
            failed: false,
        })
    }
}

fn is_image(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .map(|ext| {
            let ext = ext.to_ascii_lowercase();
            IMAGE_EXTENSIONS.contains(&ext.as_str())
        })
        .unwrap_or(false)
}

impl Iterator for ImageSequenceSource {
    type Item = AimtuneResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.failed {
            return None;
        }

        for path in self.paths.by_ref() {
            let timestamp_ns = sample_timestamp_ns(self.native_index, self.native_fps);
            self.native_index += 1;
            if !self.sampler.should_sample(timestamp_ns) {
                continue;
            }

            let full = match image::open(&path) {
                Ok(img) => img.to_rgb8(),
                Err(e) => {
                    self.failed = true;
                    return Some(Err(AimtuneError::decode_at(
                        PipelineStage::FrameSource,
                        ns_to_secs(timestamp_ns),
                        format!("{}: {e}", path.display()),
                    )));
                }
            };

            let index = self.next_index;
            self.next_index += 1;
            return Some(Ok(Frame::from_full(index, timestamp_ns, &full, &self.roi)));
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    fn scratch_dir(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join(name);
        let _ = std::fs::remove_dir_all(&dir);
        std::fs::create_dir_all(&dir).unwrap();
        dir
    }

    #[test]
    fn test_downsamples_native_rate() {
        let dir = scratch_dir("aimtune_test_sequence_rate");
        for i in 0..6u8 {
            RgbImage::from_pixel(16, 8, Rgb([i * 10, 0, 0]))
                .save(dir.join(format!("frame_{i:04}.png")))
                .unwrap();
        }
        std::fs::write(dir.join("notes.txt"), "not a frame").unwrap();

        let frames: Vec<Frame> =
            ImageSequenceSource::open(&dir, 60.0, &RegionOfInterest::FULL, 30.0)
                .unwrap()
                .collect::<AimtuneResult<_>>()
                .unwrap();

        assert_eq!(frames.len(), 3);
        assert_eq!(frames[1].index, 1);
        // Kept frames are 0, 2 and 4 of the native stream.
        assert_eq!(frames[1].image.get_pixel(0, 0), &Rgb([20, 0, 0]));
        assert_eq!(frames[2].timestamp_ns, sample_timestamp_ns(4, 60.0));

        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_empty_directory() {
        let dir = scratch_dir("aimtune_test_sequence_empty");
        let result = ImageSequenceSource::open(&dir, 30.0, &RegionOfInterest::FULL, 30.0);
        assert!(matches!(result, Err(AimtuneError::EmptyInput { .. })));
        std::fs::remove_dir_all(&dir).ok();
    }

    #[test]
    fn test_corrupt_frame_is_decode_error() {
        let dir = scratch_dir("aimtune_test_sequence_corrupt");
        std::fs::write(dir.join("0001.png"), b"definitely not a png").unwrap();

        let mut source =
            ImageSequenceSource::open(&dir, 30.0, &RegionOfInterest::FULL, 30.0).unwrap();
        let first = source.next().unwrap();
        assert!(matches!(first, Err(AimtuneError::Decode { .. })));
        assert!(source.next().is_none());

        std::fs::remove_dir_all(&dir).ok();
    }
}
