//! Gradient Hough transform for circle candidates.
//!
//! Every Canny edge pixel votes along both directions of its intensity
//! gradient, one vote per accumulator cell at distances in
//! `[min_radius, max_radius]`. Circle centers collect votes from all around
//! their boundary and show up as accumulator peaks. Each accepted center then
//! gets the radius best supported by edge pixels.

use image::GrayImage;

/// Parameters of the gradient Hough circle search.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct HoughConfig {
    /// Inverse accumulator resolution: one cell spans `dp` pixels (>= 1).
    pub dp: f32,
    /// Minimum distance between accepted centers (pixels).
    pub min_dist: f32,
    /// Upper Canny threshold; the lower one is half of it.
    pub canny_high: f32,
    /// Minimum accumulator votes for a center.
    pub accumulator_threshold: u32,
    /// Smallest radius searched (pixels).
    pub min_radius: u32,
    /// Largest radius searched (pixels).
    pub max_radius: u32,
    /// Optional cap on the number of candidates returned.
    #[serde(default)]
    pub max_candidates: Option<usize>,
}

impl Default for HoughConfig {
    fn default() -> Self {
        Self {
            dp: 1.2,
            min_dist: 100.0,
            canny_high: 50.0,
            accumulator_threshold: 50,
            min_radius: 10,
            max_radius: 30,
            max_candidates: None,
        }
    }
}

impl HoughConfig {
    /// Looser settings used to suggest a point during manual annotation.
    pub fn annotation() -> Self {
        Self {
            min_dist: 30.0,
            accumulator_threshold: 30,
            ..Self::default()
        }
    }
}

/// A circle found in image-local coordinates.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct CircleCandidate {
    pub x: f32,
    pub y: f32,
    pub radius: f32,
    /// Accumulator votes at the center cell.
    pub votes: u32,
}

/// Find circles in a (blurred) grayscale image.
///
/// Returns candidates sorted by votes, strongest first. Centers always lie
/// inside the image.
pub fn find_circles(gray: &GrayImage, config: &HoughConfig) -> Vec<CircleCandidate> {
    let (w, h) = gray.dimensions();
    if w < 3 || h < 3 || config.max_radius < config.min_radius || config.max_radius == 0 {
        return Vec::new();
    }
    let dp = config.dp.max(1.0);

    let edges = imageproc::edges::canny(gray, config.canny_high * 0.5, config.canny_high);
    let gx = imageproc::gradients::horizontal_sobel(gray);
    let gy = imageproc::gradients::vertical_sobel(gray);
    let (edges_raw, gx_raw, gy_raw) = (edges.as_raw(), gx.as_raw(), gy.as_raw());

    let acc_w = (w as f32 / dp).ceil() as usize + 2;
    let acc_h = (h as f32 / dp).ceil() as usize + 2;
    let mut accum = vec![0u32; acc_w * acc_h];
    let mut edge_points = Vec::new();

    let r_min = config.min_radius as f32;
    let r_max = config.max_radius as f32;
    let stride = w as usize;

    for y in 0..h as usize {
        for x in 0..stride {
            let idx = y * stride + x;
            if edges_raw[idx] == 0 {
                continue;
            }
            let gxv = gx_raw[idx] as f32;
            let gyv = gy_raw[idx] as f32;
            let mag = (gxv * gxv + gyv * gyv).sqrt();
            if mag < 1e-6 {
                continue;
            }
            edge_points.push([x as f32, y as f32]);
            let dx = gxv / mag;
            let dy = gyv / mag;

            for sign in [1.0f32, -1.0] {
                let mut last_cell = usize::MAX;
                let mut r = r_min;
                while r <= r_max {
                    let cx = (x as f32 + sign * dx * r) / dp;
                    let cy = (y as f32 + sign * dy * r) / dp;
                    if cx < 0.0 || cy < 0.0 {
                        break;
                    }
                    let (ix, iy) = (cx.round() as usize, cy.round() as usize);
                    if ix >= acc_w || iy >= acc_h {
                        break;
                    }
                    let cell = iy * acc_w + ix;
                    if cell != last_cell {
                        accum[cell] += 1;
                        last_cell = cell;
                    }
                    r += dp;
                }
            }
        }
    }

    // Peak extraction: strict on left/up, non-strict on right/down so a flat
    // plateau yields a single peak.
    let mut peaks: Vec<(usize, usize, u32)> = Vec::new();
    for iy in 1..acc_h - 1 {
        for ix in 1..acc_w - 1 {
            let idx = iy * acc_w + ix;
            let v = accum[idx];
            if v < config.accumulator_threshold.max(1) {
                continue;
            }
            if v > accum[idx - 1]
                && v >= accum[idx + 1]
                && v > accum[idx - acc_w]
                && v >= accum[idx + acc_w]
            {
                peaks.push((ix, iy, v));
            }
        }
    }
    peaks.sort_by(|a, b| b.2.cmp(&a.2).then(a.1.cmp(&b.1)).then(a.0.cmp(&b.0)));

    let min_dist_sq = config.min_dist * config.min_dist;
    let x_limit = (w - 1) as f32;
    let y_limit = (h - 1) as f32;
    let mut circles: Vec<CircleCandidate> = Vec::new();
    for (ix, iy, votes) in peaks {
        let cx = ix as f32 * dp;
        let cy = iy as f32 * dp;
        if cx > x_limit || cy > y_limit {
            continue;
        }
        let too_close = circles.iter().any(|c| {
            let ddx = c.x - cx;
            let ddy = c.y - cy;
            ddx * ddx + ddy * ddy < min_dist_sq
        });
        if too_close {
            continue;
        }
        let Some(radius) = best_radius(&edge_points, cx, cy, config.min_radius, config.max_radius)
        else {
            continue;
        };
        circles.push(CircleCandidate {
            x: cx,
            y: cy,
            radius,
            votes,
        });
        if config.max_candidates.is_some_and(|m| circles.len() >= m) {
            break;
        }
    }

    tracing::trace!("hough: {} edge pixels, {} circles", edge_points.len(), circles.len());
    circles
}

/// Radius in `[r_min, r_max]` supported by the most edge pixels around
/// `(cx, cy)`, or `None` when no edge pixel falls in range.
fn best_radius(edge_points: &[[f32; 2]], cx: f32, cy: f32, r_min: u32, r_max: u32) -> Option<f32> {
    let mut hist = vec![0u32; (r_max - r_min + 1) as usize];
    for p in edge_points {
        let d = ((p[0] - cx).powi(2) + (p[1] - cy).powi(2)).sqrt().round();
        if d < r_min as f32 || d > r_max as f32 {
            continue;
        }
        hist[(d as u32 - r_min) as usize] += 1;
    }
    let (best, &count) = hist
        .iter()
        .enumerate()
        .max_by(|a, b| a.1.cmp(b.1).then(b.0.cmp(&a.0)))?;
    (count > 0).then_some((best as u32 + r_min) as f32)
}
