//! Frame source over already-decoded images.

use aimtune_common::clock::sample_timestamp_ns;
use aimtune_common::config::RegionOfInterest;
use aimtune_common::error::AimtuneResult;
use image::RgbImage;

use crate::frame::Frame;

/// Yields full-size images as ROI frames spaced at the sampling rate.
pub struct MemoryFrameSource {
    images: std::vec::IntoIter<RgbImage>,
    roi: RegionOfInterest,
    sampling_rate_hz: f64,
    next_index: u64,
}

impl MemoryFrameSource {
    pub fn new(images: Vec<RgbImage>, roi: RegionOfInterest, sampling_rate_hz: f64) -> Self {
        Self {
            images: images.into_iter(),
            roi,
            sampling_rate_hz,
            next_index: 0,
        }
    }
}

impl Iterator for MemoryFrameSource {
    type Item = AimtuneResult<Frame>;

    fn next(&mut self) -> Option<Self::Item> {
        let full = self.images.next()?;
        let index = self.next_index;
        self.next_index += 1;
        Some(Ok(Frame::from_full(
            index,
            sample_timestamp_ns(index, self.sampling_rate_hz),
            &full,
            &self.roi,
        )))
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.images.size_hint()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_timestamps_follow_sampling_rate() {
        let images = vec![RgbImage::from_pixel(40, 20, Rgb([9, 9, 9])); 4];
        let frames: Vec<Frame> = MemoryFrameSource::new(images, RegionOfInterest::FULL, 20.0)
            .collect::<AimtuneResult<_>>()
            .unwrap();
        let ts: Vec<u64> = frames.iter().map(|f| f.timestamp_ns).collect();
        assert_eq!(ts, vec![0, 50_000_000, 100_000_000, 150_000_000]);
        assert_eq!(frames[3].index, 3);
        assert_eq!(frames[0].roi_dimensions(), (40, 20));
    }
}
