//! Synthetic frames and scripted sources for unit tests.

use std::collections::VecDeque;

use image::{GrayImage, Luma};

use crate::source::{FrameReadError, FrameSource};

/// Render a synthetic annular ring image.
///
/// Pixels at distance `d` from `center` satisfy:
/// - `ring_pix`  if `inner_radius <= d <= outer_radius`
/// - `bg_pix`    otherwise
pub(crate) fn draw_ring_image(
    w: u32,
    h: u32,
    center: [f32; 2],
    outer_radius: f32,
    inner_radius: f32,
    ring_pix: u8,
    bg_pix: u8,
) -> GrayImage {
    GrayImage::from_fn(w, h, |x, y| {
        let dx = x as f32 - center[0];
        let dy = y as f32 - center[1];
        let d = (dx * dx + dy * dy).sqrt();
        if d >= inner_radius && d <= outer_radius {
            Luma([ring_pix])
        } else {
            Luma([bg_pix])
        }
    })
}

/// Filled disk; equivalent to a ring with zero inner radius.
pub(crate) fn draw_disk_image(
    w: u32,
    h: u32,
    center: [f32; 2],
    radius: f32,
    disk_pix: u8,
    bg_pix: u8,
) -> GrayImage {
    draw_ring_image(w, h, center, radius, 0.0, disk_pix, bg_pix)
}

/// Gaussian-blur a `GrayImage` through a float buffer.
pub(crate) fn blur_gray(img: &GrayImage, sigma: f32) -> GrayImage {
    let (w, h) = img.dimensions();
    let f = image::ImageBuffer::<Luma<f32>, Vec<f32>>::from_fn(w, h, |x, y| {
        Luma([img.get_pixel(x, y)[0] as f32 / 255.0])
    });
    let blurred = imageproc::filter::gaussian_blur_f32(&f, sigma);
    GrayImage::from_fn(w, h, |x, y| {
        let v = blurred.get_pixel(x, y)[0].clamp(0.0, 1.0);
        Luma([(v * 255.0).round() as u8])
    })
}

/// A plate-like marker: dark ring with a bright hub, blurred.
///
/// The outer edge (radius 14) is what the circle search locks onto; the hub
/// edge gives the motion estimate texture inside its window.
pub(crate) fn marker_frame(w: u32, h: u32, center: [f32; 2]) -> GrayImage {
    blur_gray(&draw_ring_image(w, h, center, 14.0, 6.0, 30, 220), 1.5)
}

/// Frames of a marker moving by `step` pixels per frame.
pub(crate) fn moving_marker_frames(
    count: usize,
    start: [f32; 2],
    step: [f32; 2],
) -> Vec<GrayImage> {
    (0..count)
        .map(|i| {
            let t = i as f32;
            marker_frame(160, 160, [start[0] + step[0] * t, start[1] + step[1] * t])
        })
        .collect()
}

/// Frame source that replays a script of frames and read failures.
pub(crate) struct ScriptedFrames {
    script: VecDeque<Result<GrayImage, ()>>,
    read: usize,
}

impl ScriptedFrames {
    pub(crate) fn new(frames: Vec<GrayImage>) -> Self {
        Self {
            script: frames.into_iter().map(Ok).collect(),
            read: 0,
        }
    }

    /// Append a frame that fails to decode.
    pub(crate) fn then_fail(mut self) -> Self {
        self.script.push_back(Err(()));
        self
    }
}

impl FrameSource for ScriptedFrames {
    fn next_frame(&mut self) -> Result<Option<GrayImage>, FrameReadError> {
        let index = self.read;
        self.read += 1;
        match self.script.pop_front() {
            None => Ok(None),
            Some(Ok(frame)) => Ok(Some(frame)),
            Some(Err(())) => Err(FrameReadError::Corrupt {
                index,
                reason: "scripted failure".to_string(),
            }),
        }
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.script.len())
    }
}
