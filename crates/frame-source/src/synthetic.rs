//! Deterministic synthetic gameplay scenes.
//!
//! A [`SyntheticScene`] is an endless, non-repeating textured world viewed
//! through a camera. A [`CameraPath`] lists the camera offset (pixels) for
//! every frame, so a scripted flick renders to frames whose true scene shift
//! is known exactly.

use image::{Rgb, RgbImage};

/// Textured world rendered through a moving camera.
#[derive(Debug, Clone, Copy)]
pub struct SyntheticScene {
    pub width: u32,
    pub height: u32,
    pub seed: u64,
}

impl SyntheticScene {
    pub fn new(width: u32, height: u32, seed: u64) -> Self {
        Self {
            width,
            height,
            seed,
        }
    }

    /// Render the view with the camera at `(cam_x, cam_y)`.
    ///
    /// Frame pixel `(px, py)` shows world point `(px + cam_x, py + cam_y)`,
    /// so a camera moving right makes the scene slide left.
    pub fn render(&self, camera: (f64, f64)) -> RgbImage {
        let (cam_x, cam_y) = camera;
        RgbImage::from_fn(self.width, self.height, |px, py| {
            let v = self.luma_at(px as f64 + cam_x, py as f64 + cam_y);
            // Green stays low so the texture never matches a green crosshair.
            Rgb([v, v / 2, 255 - v / 2])
        })
    }

    /// Render every camera position of `path`.
    pub fn render_path(&self, path: &CameraPath) -> Vec<RgbImage> {
        path.positions().iter().map(|&p| self.render(p)).collect()
    }

    /// Render a featureless frame of a single colour.
    pub fn flat(&self, color: [u8; 3]) -> RgbImage {
        RgbImage::from_pixel(self.width, self.height, Rgb(color))
    }

    fn luma_at(&self, x: f64, y: f64) -> u8 {
        let coarse = value_noise(x / 11.0, y / 11.0, self.seed);
        let fine = value_noise(x / 4.0, y / 4.0, self.seed ^ 0x9e37_79b9_7f4a_7c15);
        (30.0 + 150.0 * coarse + 70.0 * fine).clamp(0.0, 255.0) as u8
    }
}

/// Per-frame camera offsets in pixels.
#[derive(Debug, Clone, Default)]
pub struct CameraPath {
    positions: Vec<(f64, f64)>,
}

impl CameraPath {
    /// A path starting with a single frame at the origin.
    pub fn new() -> Self {
        Self {
            positions: vec![(0.0, 0.0)],
        }
    }

    /// Keep the camera still for `frames` more frames.
    pub fn hold(self, frames: usize) -> Self {
        self.pan(0.0, 0.0, frames)
    }

    /// Move the camera by `(dx, dy)` pixels in equal steps over `frames` frames.
    pub fn pan(mut self, dx: f64, dy: f64, frames: usize) -> Self {
        let (x0, y0) = self.last();
        for step in 1..=frames {
            let t = step as f64 / frames as f64;
            self.positions.push((x0 + dx * t, y0 + dy * t));
        }
        self
    }

    /// Append explicit per-frame steps.
    pub fn steps(mut self, steps: &[(f64, f64)]) -> Self {
        for &(dx, dy) in steps {
            let (x, y) = self.last();
            self.positions.push((x + dx, y + dy));
        }
        self
    }

    pub fn positions(&self) -> &[(f64, f64)] {
        &self.positions
    }

    pub fn len(&self) -> usize {
        self.positions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positions.is_empty()
    }

    fn last(&self) -> (f64, f64) {
        self.positions.last().copied().unwrap_or((0.0, 0.0))
    }
}

/// Paint an axis-aligned filled rectangle, clipped to the image.
pub fn fill_rect(image: &mut RgbImage, x: u32, y: u32, w: u32, h: u32, color: [u8; 3]) {
    let x_end = x.saturating_add(w).min(image.width());
    let y_end = y.saturating_add(h).min(image.height());
    for py in y..y_end {
        for px in x..x_end {
            image.put_pixel(px, py, Rgb(color));
        }
    }
}

/// Paint a plus-shaped crosshair centred at `(cx, cy)`.
pub fn draw_crosshair(image: &mut RgbImage, cx: u32, cy: u32, arm: u32, color: [u8; 3]) {
    fill_rect(image, cx.saturating_sub(arm), cy, arm * 2 + 1, 1, color);
    fill_rect(image, cx, cy.saturating_sub(arm), 1, arm * 2 + 1, color);
}

/// Smooth lattice noise in [0, 1], bilinear between hashed grid values.
fn value_noise(x: f64, y: f64, seed: u64) -> f64 {
    let x0 = x.floor();
    let y0 = y.floor();
    let fx = smoothstep(x - x0);
    let fy = smoothstep(y - y0);
    let (ix, iy) = (x0 as i64, y0 as i64);

    let v00 = lattice(ix, iy, seed);
    let v10 = lattice(ix + 1, iy, seed);
    let v01 = lattice(ix, iy + 1, seed);
    let v11 = lattice(ix + 1, iy + 1, seed);

    let top = v00 + (v10 - v00) * fx;
    let bottom = v01 + (v11 - v01) * fx;
    top + (bottom - top) * fy
}

fn smoothstep(t: f64) -> f64 {
    t * t * (3.0 - 2.0 * t)
}

fn lattice(ix: i64, iy: i64, seed: u64) -> f64 {
    let mut z = seed
        ^ (ix as u64).wrapping_mul(0x9e37_79b9_7f4a_7c15)
        ^ (iy as u64).wrapping_mul(0xc2b2_ae3d_27d4_eb4f);
    // splitmix64 finalizer
    z = (z ^ (z >> 30)).wrapping_mul(0xbf58_476d_1ce4_e5b9);
    z = (z ^ (z >> 27)).wrapping_mul(0x94d0_49bb_1331_11eb);
    z ^= z >> 31;
    (z >> 11) as f64 / (1u64 << 53) as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_render_is_deterministic() {
        let scene = SyntheticScene::new(32, 24, 7);
        assert_eq!(scene.render((3.5, -2.0)), scene.render((3.5, -2.0)));
        assert_ne!(scene.render((0.0, 0.0)), SyntheticScene::new(32, 24, 8).render((0.0, 0.0)));
    }

    #[test]
    fn test_camera_shift_slides_scene_left() {
        let scene = SyntheticScene::new(32, 24, 1);
        let a = scene.render((0.0, 0.0));
        let b = scene.render((5.0, 0.0));
        for y in 0..24 {
            for x in 0..27 {
                assert_eq!(a.get_pixel(x + 5, y), b.get_pixel(x, y));
            }
        }
    }

    #[test]
    fn test_camera_path_builder() {
        let path = CameraPath::new().hold(2).pan(10.0, 0.0, 2).steps(&[(-1.0, 1.0)]);
        assert_eq!(path.len(), 6);
        assert_eq!(path.positions()[4], (10.0, 0.0));
        assert_eq!(path.positions()[5], (9.0, 1.0));
    }

    #[test]
    fn test_texture_avoids_green_crosshair_range() {
        let img = SyntheticScene::new(64, 64, 3).render((0.0, 0.0));
        assert!(img.pixels().all(|p| p[1] < 150));
    }

    #[test]
    fn test_noise_in_unit_range() {
        for i in 0..200 {
            let v = value_noise(i as f64 * 0.37, i as f64 * -0.91, 42);
            assert!((0.0..=1.0).contains(&v));
        }
    }
}
