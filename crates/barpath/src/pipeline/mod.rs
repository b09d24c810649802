//! Video tracking pipeline.
//!
//! Wires the stages of one run together:
//! first frame -> region selection -> marker detection (seed) -> per-frame
//! motion tracking -> point file.
//!
//! Processing is sequential and strictly in stream order. The two blocking
//! points are the one-time region selection and the per-frame read. A
//! [`Control`] channel is polled without blocking once per frame; a stop
//! request (or a mid-stream read failure) ends the run early and the partial
//! path is still returned and persisted.
//!
//! Entry points:
//! - [`run_tracking`]: run over any [`FrameSource`](crate::FrameSource)
//! - [`track_video`]: open a clip, run, and write `<stem>_auto_track.txt`

mod result;
mod run;

use image::GrayImage;

use crate::detector::DetectionError;
use crate::geometry::Region;
use crate::path::PathIoError;
use crate::source::FrameReadError;
use crate::tracker::TrackerError;

pub use result::TrackingRun;
pub use run::{run_tracking, track_video};

/// Out-of-band requests to a running pipeline.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Control {
    /// Stop after the current frame; the partial path is kept.
    Stop,
}

/// Region selection did not produce a region.
#[derive(Debug, thiserror::Error)]
pub enum RegionSelectError {
    #[error("region selection cancelled")]
    Cancelled,
    #[error("region selection input failed: {0}")]
    Input(#[from] std::io::Error),
}

/// One-time step that fixes the search region from the first frame.
pub trait RegionSelector {
    fn select_region(&mut self, first_frame: &GrayImage) -> Result<Region, RegionSelectError>;
}

/// Always returns the same region.
#[derive(Debug, Clone, Copy)]
pub struct FixedRegion(pub Region);

impl RegionSelector for FixedRegion {
    fn select_region(&mut self, _first_frame: &GrayImage) -> Result<Region, RegionSelectError> {
        Ok(self.0)
    }
}

/// A run that could not produce a path.
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("cannot open frame source: {0}")]
    Open(#[source] FrameReadError),
    #[error("frame source has no frames")]
    EmptyStream,
    #[error("cannot read first frame: {0}")]
    FirstFrame(#[source] FrameReadError),
    #[error(transparent)]
    RegionSelection(#[from] RegionSelectError),
    #[error("marker detection failed: {0}")]
    Detection(#[source] DetectionError),
    #[error(transparent)]
    Tracker(TrackerError),
    #[error(transparent)]
    Persist(#[from] PathIoError),
}

impl From<TrackerError> for PipelineError {
    fn from(err: TrackerError) -> Self {
        match err {
            TrackerError::Detection(e) => Self::Detection(e),
            other => Self::Tracker(other),
        }
    }
}
