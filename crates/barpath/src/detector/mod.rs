//! Marker detection inside the user-selected search region.
//!
//! The region is cropped from the grayscale frame, blurred, and searched for
//! circles. The strongest candidate becomes the seed point, translated back
//! to frame-absolute coordinates. There is no retry or fallback: no candidate
//! means the run cannot start.

pub mod hough;

use image::GrayImage;

use crate::geometry::{Point, Region};

pub use hough::{find_circles, CircleCandidate, HoughConfig};

/// Gaussian pre-blur applied to the region before the circle search.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(default)]
pub struct BlurConfig {
    /// Standard deviation in pixels; `0` disables blurring.
    pub sigma: f32,
}

impl Default for BlurConfig {
    fn default() -> Self {
        Self { sigma: 1.5 }
    }
}

/// Why no marker could be located.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum DetectionError {
    /// The region does not overlap the frame.
    #[error("search region {region} is empty within a {frame_width}x{frame_height} frame")]
    EmptyRegion {
        region: Region,
        frame_width: u32,
        frame_height: u32,
    },
    /// No circle satisfied the radius/threshold constraints.
    #[error(
        "no circle with radius in [{min_radius}, {max_radius}] and at least {threshold} votes in region {region}"
    )]
    NoCandidate {
        region: Region,
        min_radius: u32,
        max_radius: u32,
        threshold: u32,
    },
}

/// A located marker.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct MarkerDetection {
    /// Rounded center in frame-absolute pixels.
    pub point: Point,
    /// Winning circle, center in frame-absolute pixels.
    pub circle: CircleCandidate,
    /// Region after clamping to the frame.
    pub region: Region,
}

/// Crop `region` out of `frame` and blur it.
pub fn preprocess_region(frame: &GrayImage, region: Region, blur: &BlurConfig) -> GrayImage {
    let crop =
        image::imageops::crop_imm(frame, region.x, region.y, region.width, region.height).to_image();
    if blur.sigma > 0.0 {
        imageproc::filter::gaussian_blur_f32(&crop, blur.sigma)
    } else {
        crop
    }
}

/// Locate the marker in `region` of `frame`.
pub fn detect_marker(
    frame: &GrayImage,
    region: Region,
    hough: &HoughConfig,
    blur: &BlurConfig,
) -> Result<MarkerDetection, DetectionError> {
    let (fw, fh) = frame.dimensions();
    let region = region
        .clamp_to(fw, fh)
        .ok_or(DetectionError::EmptyRegion {
            region,
            frame_width: fw,
            frame_height: fh,
        })?;

    let roi = preprocess_region(frame, region, blur);
    let candidates = find_circles(&roi, hough);
    tracing::debug!("{} circle candidates in region {}", candidates.len(), region);

    let best = candidates.first().ok_or(DetectionError::NoCandidate {
        region,
        min_radius: hough.min_radius,
        max_radius: hough.max_radius,
        threshold: hough.accumulator_threshold,
    })?;

    let point = Point::new(
        region.x as i32 + best.x.round() as i32,
        region.y as i32 + best.y.round() as i32,
    );
    let circle = CircleCandidate {
        x: region.x as f32 + best.x,
        y: region.y as f32 + best.y,
        ..*best
    };
    tracing::info!(
        "Marker at ({}) radius {:.1}px ({} votes)",
        point,
        circle.radius,
        circle.votes
    );
    Ok(MarkerDetection {
        point,
        circle,
        region,
    })
}
