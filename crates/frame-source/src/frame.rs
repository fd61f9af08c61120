//! The sampled frame type.

use aimtune_common::clock::{ns_to_secs, TimestampNs};
use aimtune_common::config::RegionOfInterest;
use image::RgbImage;

/// One sampled frame, already cropped to the region of interest.
#[derive(Debug, Clone)]
pub struct Frame {
    /// Position in the sampled sequence.
    pub index: u64,
    /// Nanoseconds since the start of the recording.
    pub timestamp_ns: TimestampNs,
    /// Region-of-interest crop (RGB8).
    pub image: RgbImage,
    /// Width of the full source frame in pixels.
    pub source_width: u32,
    /// Height of the full source frame in pixels.
    pub source_height: u32,
}

impl Frame {
    /// Build a frame by cropping `full` to `roi`.
    pub fn from_full(
        index: u64,
        timestamp_ns: TimestampNs,
        full: &RgbImage,
        roi: &RegionOfInterest,
    ) -> Self {
        Self {
            index,
            timestamp_ns,
            image: crop_roi(full, roi),
            source_width: full.width(),
            source_height: full.height(),
        }
    }

    pub fn timestamp_secs(&self) -> f64 {
        ns_to_secs(self.timestamp_ns)
    }

    /// Dimensions of the ROI crop.
    pub fn roi_dimensions(&self) -> (u32, u32) {
        self.image.dimensions()
    }
}

/// Crop `full` to the normalized region of interest.
pub fn crop_roi(full: &RgbImage, roi: &RegionOfInterest) -> RgbImage {
    let (x, y, w, h) = roi.to_pixels(full.width(), full.height());
    image::imageops::crop_imm(full, x, y, w, h).to_image()
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Rgb;

    #[test]
    fn test_crop_keeps_source_dimensions() {
        let mut full = RgbImage::from_pixel(200, 100, Rgb([0, 0, 0]));
        full.put_pixel(100, 50, Rgb([255, 0, 0]));

        let frame = Frame::from_full(3, 100, &full, &RegionOfInterest::centered(0.5, 0.5));
        assert_eq!(frame.roi_dimensions(), (100, 50));
        assert_eq!((frame.source_width, frame.source_height), (200, 100));
        // Source pixel (100, 50) lands at (50, 25) inside the crop.
        assert_eq!(frame.image.get_pixel(50, 25), &Rgb([255, 0, 0]));
    }
}
