//! Pyramidal Lucas-Kanade for a single point.
//!
//! Coarse to fine: at each level the displacement is refined by Gauss-Newton
//! iterations on the windowed brightness-constancy residual, then doubled as
//! the initial guess for the next finer level.

use nalgebra::{Matrix2, Vector2};

use super::pyramid::{sample_clamped, LevelImage, Pyramid};

/// Motion-estimation parameters.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct FlowConfig {
    /// Side of the square integration window (pixels, odd).
    pub window_size: u32,
    /// Number of pyramid levels above full resolution.
    pub max_level: u32,
    /// Iteration cap per level.
    pub max_iterations: u32,
    /// Stop iterating once an update is shorter than this (pixels).
    pub epsilon: f32,
    /// Minimum eigenvalue of the window's gradient matrix, per window pixel,
    /// in normalized-intensity units. Below it the window is untrackable.
    pub min_eig_threshold: f32,
}

impl Default for FlowConfig {
    fn default() -> Self {
        Self {
            window_size: 21,
            max_level: 3,
            max_iterations: 20,
            epsilon: 0.01,
            min_eig_threshold: 1.5e-6,
        }
    }
}

impl FlowConfig {
    pub(crate) fn half_window(&self) -> i32 {
        (self.window_size.max(3) / 2) as i32
    }
}

/// Why a point could not be followed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LostReason {
    /// The window has too little gradient structure at the given level.
    Untextured { level: usize },
    /// The estimate left the frame or became non-finite.
    OutOfFrame,
    /// One of the frames has no pixels.
    EmptyFrame,
}

/// Result of following one point between two frames.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum FlowOutcome {
    Tracked([f32; 2]),
    Lost(LostReason),
}

struct WindowSample {
    value: f32,
    ix: f32,
    iy: f32,
}

/// Follow `point` (full-resolution pixels) from `prev` to `next`.
pub fn track_point(prev: &Pyramid, next: &Pyramid, point: [f32; 2], config: &FlowConfig) -> FlowOutcome {
    if prev.is_empty() || next.is_empty() {
        return FlowOutcome::Lost(LostReason::EmptyFrame);
    }
    let half = config.half_window();
    let top = prev.top().min(next.top());
    let mut guess = Vector2::<f32>::zeros();

    for level in (0..=top).rev() {
        let scale = (1u32 << level) as f32;
        let p = Vector2::new(point[0] / scale, point[1] / scale);
        match refine_level(
            &prev.levels()[level],
            &next.levels()[level],
            p,
            guess,
            half,
            config,
        ) {
            Some(v) => {
                guess = if level > 0 { (guess + v) * 2.0 } else { guess + v };
            }
            None => return FlowOutcome::Lost(LostReason::Untextured { level }),
        }
    }

    let out = [point[0] + guess.x, point[1] + guess.y];
    let (w, h) = next.base_dimensions();
    let inside = out[0].is_finite()
        && out[1].is_finite()
        && out[0] >= 0.0
        && out[1] >= 0.0
        && out[0] <= (w - 1) as f32
        && out[1] <= (h - 1) as f32;
    if inside {
        FlowOutcome::Tracked(out)
    } else {
        FlowOutcome::Lost(LostReason::OutOfFrame)
    }
}

/// Residual displacement at one level, or `None` if the window is untrackable.
fn refine_level(
    prev: &LevelImage,
    next: &LevelImage,
    p: Vector2<f32>,
    guess: Vector2<f32>,
    half: i32,
    config: &FlowConfig,
) -> Option<Vector2<f32>> {
    let side = (2 * half + 1) as usize;
    let mut window = Vec::with_capacity(side * side);
    let mut g = Matrix2::<f32>::zeros();

    for wy in -half..=half {
        for wx in -half..=half {
            let x = p.x + wx as f32;
            let y = p.y + wy as f32;
            let ix = 0.5 * (sample_clamped(prev, x + 1.0, y) - sample_clamped(prev, x - 1.0, y));
            let iy = 0.5 * (sample_clamped(prev, x, y + 1.0) - sample_clamped(prev, x, y - 1.0));
            g[(0, 0)] += ix * ix;
            g[(0, 1)] += ix * iy;
            g[(1, 1)] += iy * iy;
            window.push(WindowSample {
                value: sample_clamped(prev, x, y),
                ix,
                iy,
            });
        }
    }
    g[(1, 0)] = g[(0, 1)];

    let n = window.len() as f32;
    let (a, b, c) = (g[(0, 0)], g[(0, 1)], g[(1, 1)]);
    let min_eig = 0.5 * (a + c - ((a - c) * (a - c) + 4.0 * b * b).sqrt());
    if !(min_eig / n >= config.min_eig_threshold) {
        return None;
    }
    let g_inv = g.try_inverse()?;

    let mut v = Vector2::<f32>::zeros();
    let eps_sq = config.epsilon * config.epsilon;
    for _ in 0..config.max_iterations.max(1) {
        let q = p + guess + v;
        let mut mismatch = Vector2::<f32>::zeros();
        let mut k = 0;
        for wy in -half..=half {
            for wx in -half..=half {
                let s = &window[k];
                k += 1;
                let diff = s.value - sample_clamped(next, q.x + wx as f32, q.y + wy as f32);
                mismatch.x += diff * s.ix;
                mismatch.y += diff * s.iy;
            }
        }
        let delta = g_inv * mismatch;
        if !delta.x.is_finite() || !delta.y.is_finite() {
            return None;
        }
        v += delta;
        if delta.norm_squared() <= eps_sq {
            break;
        }
    }
    Some(v)
}
