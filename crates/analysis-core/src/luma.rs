//! Luma planes and global block matching.
//!
//! Scene-shift tracking compares the luma of two consecutive ROI crops at
//! every candidate offset and keeps the one with the lowest mean absolute
//! difference. A coarse exhaustive search on a box-downsampled plane is
//! refined at full resolution and finished with parabolic sub-pixel
//! interpolation.

use aimtune_common::config::TrackingConfig;
use image::RgbImage;

/// Candidate offsets with fewer overlapping samples than this are skipped.
const MIN_OVERLAP_SAMPLES: usize = 16;

/// Coarse planes narrower or shorter than this fall back to full resolution.
const MIN_COARSE_DIM: usize = 8;

/// Single-channel f32 image.
#[derive(Debug, Clone)]
pub struct LumaPlane {
    width: usize,
    height: usize,
    data: Vec<f32>,
}

impl LumaPlane {
    /// Rec. 601 luma of an RGB image.
    pub fn from_rgb(image: &RgbImage) -> Self {
        let data = image
            .pixels()
            .map(|p| 0.299 * p[0] as f32 + 0.587 * p[1] as f32 + 0.114 * p[2] as f32)
            .collect();
        Self {
            width: image.width() as usize,
            height: image.height() as usize,
            data,
        }
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    #[inline]
    fn at(&self, x: usize, y: usize) -> f32 {
        self.data[y * self.width + x]
    }

    /// Box-filter downsample by an integer factor.
    pub fn downsample(&self, factor: usize) -> Self {
        if factor <= 1 {
            return self.clone();
        }
        let width = self.width / factor;
        let height = self.height / factor;
        let norm = (factor * factor) as f32;
        let mut data = Vec::with_capacity(width * height);
        for cy in 0..height {
            for cx in 0..width {
                let mut sum = 0.0;
                for y in cy * factor..(cy + 1) * factor {
                    for x in cx * factor..(cx + 1) * factor {
                        sum += self.at(x, y);
                    }
                }
                data.push(sum / norm);
            }
        }
        Self {
            width,
            height,
            data,
        }
    }

    /// Standard deviation of the plane's values.
    pub fn std_dev(&self) -> f64 {
        if self.data.is_empty() {
            return 0.0;
        }
        let n = self.data.len() as f64;
        let mean = self.data.iter().map(|&v| v as f64).sum::<f64>() / n;
        let var = self
            .data
            .iter()
            .map(|&v| (v as f64 - mean).powi(2))
            .sum::<f64>()
            / n;
        var.sqrt()
    }
}

/// Excluded rectangle `[x0, x1) x [y0, y1)` in plane coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct MaskRect {
    x0: usize,
    y0: usize,
    x1: usize,
    y1: usize,
}

impl MaskRect {
    /// Box of the given fractional half-size centred in a `width x height` plane.
    fn centered(width: usize, height: usize, half_fraction: f64) -> Option<Self> {
        if half_fraction <= 0.0 {
            return None;
        }
        let hw = (half_fraction * width as f64).round() as usize;
        let hh = (half_fraction * height as f64).round() as usize;
        let (cx, cy) = (width / 2, height / 2);
        Some(Self {
            x0: cx.saturating_sub(hw),
            y0: cy.saturating_sub(hh),
            x1: (cx + hw + 1).min(width),
            y1: (cy + hh + 1).min(height),
        })
    }

    #[inline]
    fn contains(&self, x: usize, y: usize) -> bool {
        x >= self.x0 && x < self.x1 && y >= self.y0 && y < self.y1
    }
}

/// Luma planes of one frame at both pyramid levels.
#[derive(Debug, Clone)]
pub struct Pyramid {
    full: LumaPlane,
    coarse: LumaPlane,
    factor: usize,
    texture: f64,
}

impl Pyramid {
    pub fn new(image: &RgbImage, pyramid_factor: u32) -> Self {
        let full = LumaPlane::from_rgb(image);
        let requested = pyramid_factor.max(1) as usize;
        let factor = if full.width / requested >= MIN_COARSE_DIM
            && full.height / requested >= MIN_COARSE_DIM
        {
            requested
        } else {
            1
        };
        let coarse = full.downsample(factor);
        let texture = full.std_dev();
        Self {
            full,
            coarse,
            factor,
            texture,
        }
    }

    /// Luma standard deviation of the full-resolution plane.
    pub fn texture(&self) -> f64 {
        self.texture
    }

    pub fn dimensions(&self) -> (usize, usize) {
        (self.full.width, self.full.height)
    }
}

/// Result of matching two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ShiftEstimate {
    /// Content shift in pixels: `current(x, y) ≈ previous(x - dx, y - dy)`.
    pub dx: f64,
    pub dy: f64,
    /// Match quality in [0, 1].
    pub confidence: f64,
}

impl ShiftEstimate {
    const NONE: ShiftEstimate = ShiftEstimate {
        dx: 0.0,
        dy: 0.0,
        confidence: 0.0,
    };
}

/// Two-level global block matcher.
#[derive(Debug, Clone)]
pub struct BlockMatcher {
    max_shift_fraction: f64,
    mask_fraction: f64,
    stride: usize,
    texture_floor: f64,
}

impl BlockMatcher {
    pub fn from_config(config: &TrackingConfig) -> Self {
        Self {
            max_shift_fraction: config.max_shift_fraction,
            mask_fraction: config.crosshair_mask_fraction,
            stride: config.sample_stride.max(1) as usize,
            texture_floor: config.texture_floor,
        }
    }

    /// Estimate how far the scene content moved from `previous` to `current`.
    pub fn estimate(&self, previous: &Pyramid, current: &Pyramid) -> ShiftEstimate {
        if previous.dimensions() != current.dimensions() || previous.factor != current.factor {
            return ShiftEstimate::NONE;
        }

        let factor = current.factor;
        let (cw, ch) = (current.coarse.width, current.coarse.height);
        let rx = ((self.max_shift_fraction * cw as f64).ceil() as usize).min(cw.saturating_sub(2));
        let ry = ((self.max_shift_fraction * ch as f64).ceil() as usize).min(ch.saturating_sub(2));
        let coarse_mask = MaskRect::centered(cw, ch, self.mask_fraction);

        let mut coarse_costs = Vec::with_capacity((2 * rx + 1) * (2 * ry + 1));
        let mut coarse_best: Option<(i64, i64, f64)> = None;
        for sy in -(ry as i64)..=ry as i64 {
            for sx in -(rx as i64)..=rx as i64 {
                let Some(c) = mad(
                    &previous.coarse,
                    &current.coarse,
                    sx,
                    sy,
                    coarse_mask,
                    self.stride,
                ) else {
                    continue;
                };
                coarse_costs.push(c);
                if coarse_best.map_or(true, |(_, _, best)| c < best) {
                    coarse_best = Some((sx, sy, c));
                }
            }
        }

        let Some((bx, by, best_coarse)) = coarse_best else {
            return ShiftEstimate::NONE;
        };

        let (fw, fh) = (current.full.width, current.full.height);
        let full_mask = MaskRect::centered(fw, fh, self.mask_fraction);
        let full_cost = |sx: i64, sy: i64| {
            mad(&previous.full, &current.full, sx, sy, full_mask, self.stride)
        };

        let radius = (factor as i64 / 2).max(2);
        let (cx, cy) = (bx * factor as i64, by * factor as i64);
        let mut best = (cx, cy, f64::INFINITY);
        for sy in cy - radius..=cy + radius {
            for sx in cx - radius..=cx + radius {
                if let Some(c) = full_cost(sx, sy) {
                    if c < best.2 {
                        best = (sx, sy, c);
                    }
                }
            }
        }
        if !best.2.is_finite() {
            return ShiftEstimate::NONE;
        }

        let (sx, sy, c0) = best;
        let dx = sx as f64 + subpixel(full_cost(sx - 1, sy), c0, full_cost(sx + 1, sy));
        let dy = sy as f64 + subpixel(full_cost(sx, sy - 1), c0, full_cost(sx, sy + 1));

        let median_cost = median(&mut coarse_costs);
        let distinctiveness = if median_cost > 1e-9 {
            (1.0 - best_coarse / median_cost).clamp(0.0, 1.0)
        } else {
            0.0
        };
        let texture = if self.texture_floor > 0.0 {
            (previous.texture.min(current.texture) / self.texture_floor).min(1.0)
        } else {
            1.0
        };

        ShiftEstimate {
            dx,
            dy,
            confidence: (distinctiveness * texture).clamp(0.0, 1.0),
        }
    }
}

/// Mean absolute difference between `current(x, y)` and
/// `previous(x - sx, y - sy)` over the overlap, skipping masked pixels.
fn mad(
    previous: &LumaPlane,
    current: &LumaPlane,
    sx: i64,
    sy: i64,
    mask: Option<MaskRect>,
    stride: usize,
) -> Option<f64> {
    let (w, h) = (current.width as i64, current.height as i64);
    let x_start = sx.max(0);
    let x_end = (w + sx).min(w);
    let y_start = sy.max(0);
    let y_end = (h + sy).min(h);
    if x_end <= x_start || y_end <= y_start {
        return None;
    }

    let mut sum = 0.0f64;
    let mut count = 0usize;
    for y in (y_start..y_end).step_by(stride) {
        let py = (y - sy) as usize;
        let y = y as usize;
        for x in (x_start..x_end).step_by(stride) {
            let px = (x - sx) as usize;
            let x = x as usize;
            if let Some(m) = mask {
                if m.contains(x, y) || m.contains(px, py) {
                    continue;
                }
            }
            sum += (current.at(x, y) - previous.at(px, py)).abs() as f64;
            count += 1;
        }
    }

    (count >= MIN_OVERLAP_SAMPLES).then(|| sum / count as f64)
}

/// Vertex offset of the parabola through three equally spaced costs.
fn subpixel(left: Option<f64>, center: f64, right: Option<f64>) -> f64 {
    let (Some(l), Some(r)) = (left, right) else {
        return 0.0;
    };
    let denom = l - 2.0 * center + r;
    if denom <= 1e-12 {
        return 0.0;
    }
    (0.5 * (l - r) / denom).clamp(-0.5, 0.5)
}

fn median(values: &mut [f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.sort_by(|a, b| a.total_cmp(b));
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        (values[mid - 1] + values[mid]) / 2.0
    } else {
        values[mid]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aimtune_frame_source::synthetic::SyntheticScene;

    fn matcher() -> BlockMatcher {
        BlockMatcher::from_config(&TrackingConfig::default())
    }

    fn estimate(scene: &SyntheticScene, from: (f64, f64), to: (f64, f64)) -> ShiftEstimate {
        let a = Pyramid::new(&scene.render(from), 4);
        let b = Pyramid::new(&scene.render(to), 4);
        matcher().estimate(&a, &b)
    }

    #[test]
    fn test_recovers_integer_pan() {
        let scene = SyntheticScene::new(160, 120, 11);
        let est = estimate(&scene, (0.0, 0.0), (9.0, -4.0));
        // Camera right/up makes content move left/down.
        assert!((est.dx + 9.0).abs() < 0.3, "dx = {}", est.dx);
        assert!((est.dy - 4.0).abs() < 0.3, "dy = {}", est.dy);
        assert!(est.confidence > 0.5, "confidence = {}", est.confidence);
    }

    #[test]
    fn test_subpixel_pan() {
        let scene = SyntheticScene::new(160, 120, 5);
        let est = estimate(&scene, (0.0, 0.0), (6.5, 0.0));
        assert!((est.dx + 6.5).abs() < 0.35, "dx = {}", est.dx);
        assert!(est.dy.abs() < 0.35, "dy = {}", est.dy);
    }

    #[test]
    fn test_static_scene_has_zero_shift() {
        let scene = SyntheticScene::new(160, 120, 2);
        let est = estimate(&scene, (3.0, 3.0), (3.0, 3.0));
        assert!(est.dx.abs() < 0.05 && est.dy.abs() < 0.05);
        assert!(est.confidence > 0.5);
    }

    #[test]
    fn test_flat_frames_have_zero_confidence() {
        let scene = SyntheticScene::new(160, 120, 2);
        let flat = scene.flat([90, 90, 90]);
        let a = Pyramid::new(&flat, 4);
        let b = Pyramid::new(&flat, 4);
        let est = matcher().estimate(&a, &b);
        assert_eq!(est.confidence, 0.0);
    }

    #[test]
    fn test_mismatched_dimensions_are_rejected() {
        let a = Pyramid::new(&SyntheticScene::new(160, 120, 1).render((0.0, 0.0)), 4);
        let b = Pyramid::new(&SyntheticScene::new(120, 120, 1).render((0.0, 0.0)), 4);
        assert_eq!(matcher().estimate(&a, &b), ShiftEstimate::NONE);
    }

    #[test]
    fn test_downsample_box_average() {
        let mut img = RgbImage::new(4, 4);
        for (x, _, p) in img.enumerate_pixels_mut() {
            let v = if x < 2 { 0 } else { 200 };
            *p = image::Rgb([v, v, v]);
        }
        let plane = LumaPlane::from_rgb(&img).downsample(2);
        assert_eq!((plane.width(), plane.height()), (2, 2));
        assert!(plane.at(0, 0).abs() < 1e-3);
        assert!((plane.at(1, 1) - 200.0).abs() < 0.1);
    }

    #[test]
    fn test_subpixel_vertex() {
        assert_eq!(subpixel(Some(4.0), 1.0, Some(4.0)), 0.0);
        assert!(subpixel(Some(2.0), 1.0, Some(4.0)) < 0.0);
        assert_eq!(subpixel(None, 1.0, Some(4.0)), 0.0);
    }
}
