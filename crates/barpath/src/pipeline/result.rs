use std::path::PathBuf;

use crate::detector::MarkerDetection;
use crate::geometry::Region;
use crate::path::PathSequence;
use crate::tracker::{FrameStatus, Termination};

/// Outcome of one tracking run over a clip.
#[derive(Debug, Clone, serde::Serialize)]
pub struct TrackingRun {
    /// One entry per processed frame, seed frame first.
    pub path: PathSequence,
    /// Per-frame status, parallel to `path`.
    pub statuses: Vec<FrameStatus>,
    /// Search region used for the seed detection (clamped to the frame).
    pub region: Region,
    /// Seed detection on the first frame.
    pub seed: MarkerDetection,
    /// Why the run stopped.
    pub termination: Termination,
    /// Frames whose point was carried over from the previous frame.
    pub lost_frames: usize,
    /// First frame dimensions [width, height].
    pub frame_size: [u32; 2],
    /// Point file the path was written to, if persisted.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

impl TrackingRun {
    /// Frames processed, including the seed frame.
    pub fn frames(&self) -> usize {
        self.path.len()
    }

    /// Whether the run consumed the whole stream.
    pub fn completed(&self) -> bool {
        self.termination == Termination::EndOfStream
    }
}
