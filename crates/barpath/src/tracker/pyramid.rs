//! Gaussian image pyramid with normalized float intensities.

use image::{GrayImage, ImageBuffer, Luma};

/// Single pyramid level, intensities in [0, 1].
pub type LevelImage = ImageBuffer<Luma<f32>, Vec<f32>>;

/// Smoothing applied before each 2x decimation.
const DOWNSAMPLE_SIGMA: f32 = 1.0;

/// Coarse-to-fine image stack; level 0 is full resolution.
#[derive(Debug, Clone)]
pub struct Pyramid {
    levels: Vec<LevelImage>,
}

impl Pyramid {
    /// Build up to `max_level` extra levels. Building stops early once a
    /// level would be smaller than `min_size` in either dimension.
    pub fn build(gray: &GrayImage, max_level: usize, min_size: u32) -> Self {
        const INV_255: f32 = 1.0 / 255.0;
        let (w, h) = gray.dimensions();
        let base = LevelImage::from_raw(
            w,
            h,
            gray.as_raw().iter().map(|&v| v as f32 * INV_255).collect(),
        )
        .unwrap_or_else(|| LevelImage::new(w, h));

        let mut levels = vec![base];
        while levels.len() <= max_level {
            let Some(prev) = levels.last() else { break };
            let (pw, ph) = prev.dimensions();
            let (nw, nh) = (pw.div_ceil(2), ph.div_ceil(2));
            if nw < min_size.max(1) || nh < min_size.max(1) {
                break;
            }
            let next = downsample(prev);
            levels.push(next);
        }
        Self { levels }
    }

    pub fn levels(&self) -> &[LevelImage] {
        &self.levels
    }

    /// Index of the coarsest level.
    pub fn top(&self) -> usize {
        self.levels.len() - 1
    }

    pub fn base_dimensions(&self) -> (u32, u32) {
        self.levels[0].dimensions()
    }

    /// Whether the full-resolution level has no pixels.
    pub fn is_empty(&self) -> bool {
        let (w, h) = self.base_dimensions();
        w == 0 || h == 0
    }
}

fn downsample(img: &LevelImage) -> LevelImage {
    let smoothed = imageproc::filter::gaussian_blur_f32(img, DOWNSAMPLE_SIGMA);
    let (w, h) = img.dimensions();
    let (nw, nh) = (w.div_ceil(2), h.div_ceil(2));
    let mut out = LevelImage::new(nw, nh);
    for y in 0..nh {
        for x in 0..nw {
            let sx = (2 * x).min(w - 1);
            let sy = (2 * y).min(h - 1);
            out.put_pixel(x, y, *smoothed.get_pixel(sx, sy));
        }
    }
    out
}

/// Bilinear sample with clamp-to-edge addressing.
#[inline]
pub fn sample_clamped(img: &LevelImage, x: f32, y: f32) -> f32 {
    let (w, h) = img.dimensions();
    let max_x = (w - 1) as f32;
    let max_y = (h - 1) as f32;
    let x = x.clamp(0.0, max_x);
    let y = y.clamp(0.0, max_y);
    let x0 = x.floor() as u32;
    let y0 = y.floor() as u32;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let stride = w as usize;
    let raw = img.as_raw();
    let p00 = raw[y0 as usize * stride + x0 as usize];
    let p10 = raw[y0 as usize * stride + x1 as usize];
    let p01 = raw[y1 as usize * stride + x0 as usize];
    let p11 = raw[y1 as usize * stride + x1 as usize];

    (1.0 - fx) * (1.0 - fy) * p00 + fx * (1.0 - fy) * p10 + (1.0 - fx) * fy * p01 + fx * fy * p11
}
