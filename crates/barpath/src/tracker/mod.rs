//! Single-point tracker state machine.
//!
//! ```text
//!   Searching --seed ok--> Tracking --end/cancel/read error--> Terminated
//!       |                   ^    |
//!       |                   +----+ step (tracked or lost)
//!       +--seed fails--------------------------------------> Terminated
//! ```
//!
//! Every processed frame appends exactly one entry to the path. When the
//! motion estimate is lost, the previous point is carried over and the frame
//! is marked [`FrameStatus::Lost`]; tracking does not stop. This can hide
//! drift, so lost frames are counted and logged rather than silently absorbed.

pub mod flow;
pub mod pyramid;

use image::GrayImage;

use crate::config::TrackConfig;
use crate::detector::{detect_marker, DetectionError, MarkerDetection};
use crate::geometry::{Point, Region};
use crate::path::{PathRecorder, PathSequence};

pub use flow::{track_point, FlowConfig, FlowOutcome, LostReason};
pub use pyramid::Pyramid;

/// How the entry for one frame was produced.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameStatus {
    /// Seed frame: point came from marker detection.
    Detected,
    /// Point follows the motion estimate.
    Tracked,
    /// Motion estimate failed; the previous point was carried over.
    Lost,
}

/// Why a run stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Termination {
    EndOfStream,
    Cancelled,
    FrameReadFailed,
    DetectionFailed,
}

/// Observable tracker state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TrackerState {
    Searching,
    Tracking,
    Terminated(Termination),
}

/// Result of processing one frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize)]
pub struct TrackStep {
    pub frame: usize,
    pub point: Point,
    pub status: FrameStatus,
}

/// Calls made in a state that does not accept them.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum TrackerError {
    #[error("tracker cannot be seeded in state {0:?}")]
    AlreadySeeded(TrackerState),
    #[error("tracker cannot step in state {0:?}")]
    NotTracking(TrackerState),
    #[error(transparent)]
    Detection(#[from] DetectionError),
}

enum Phase {
    Searching,
    Tracking {
        prev: Pyramid,
        /// Sub-pixel position carried between frames.
        current: [f32; 2],
    },
    Terminated(Termination),
}

/// Seeds from a marker detection, then follows the point frame by frame.
pub struct Tracker {
    config: TrackConfig,
    phase: Phase,
    recorder: PathRecorder,
    statuses: Vec<FrameStatus>,
    seed: Option<MarkerDetection>,
}

impl Tracker {
    pub fn new(config: TrackConfig) -> Self {
        Self {
            config,
            phase: Phase::Searching,
            recorder: PathRecorder::new(),
            statuses: Vec::new(),
            seed: None,
        }
    }

    pub fn config(&self) -> &TrackConfig {
        &self.config
    }

    pub fn state(&self) -> TrackerState {
        match self.phase {
            Phase::Searching => TrackerState::Searching,
            Phase::Tracking { .. } => TrackerState::Tracking,
            Phase::Terminated(t) => TrackerState::Terminated(t),
        }
    }

    /// Detect the marker in `region` of the first frame and start tracking.
    ///
    /// The detection becomes frame 0 of the path. On detection failure the
    /// tracker terminates; there is no retry.
    pub fn seed(&mut self, frame: &GrayImage, region: Region) -> Result<MarkerDetection, TrackerError> {
        if !matches!(self.phase, Phase::Searching) {
            return Err(TrackerError::AlreadySeeded(self.state()));
        }
        let detection = match detect_marker(frame, region, &self.config.detector, &self.config.blur) {
            Ok(d) => d,
            Err(e) => {
                self.phase = Phase::Terminated(Termination::DetectionFailed);
                return Err(e.into());
            }
        };

        let prev = self.build_pyramid(frame);
        let point = detection.point;
        self.phase = Phase::Tracking {
            prev,
            current: [point.x as f32, point.y as f32],
        };
        self.seed = Some(detection);
        self.record(point, FrameStatus::Detected);
        Ok(detection)
    }

    /// Follow the point into `frame`.
    pub fn step(&mut self, frame: &GrayImage) -> Result<TrackStep, TrackerError> {
        let state = self.state();
        if state != TrackerState::Tracking {
            return Err(TrackerError::NotTracking(state));
        }
        let next = self.build_pyramid(frame);
        let frame_idx = self.recorder.len();
        let flow_cfg = &self.config.flow;
        let Phase::Tracking { prev, current } = &mut self.phase else {
            return Err(TrackerError::NotTracking(state));
        };
        if next.is_empty() {
            // Keep the last real frame as the reference.
            tracing::warn!("frame {}: empty frame; carrying previous point", frame_idx);
            let point = Point::truncated(*current);
            return Ok(self.record(point, FrameStatus::Lost));
        }

        let status = match track_point(prev, &next, *current, flow_cfg) {
            FlowOutcome::Tracked(p) => {
                *current = p;
                FrameStatus::Tracked
            }
            FlowOutcome::Lost(reason) => {
                tracing::warn!(
                    "frame {}: tracking lost ({:?}); carrying previous point",
                    frame_idx,
                    reason
                );
                FrameStatus::Lost
            }
        };
        // Only finite, in-frame estimates are ever stored in `current`.
        let point = Point::truncated(*current);
        *prev = next;
        Ok(self.record(point, status))
    }

    /// Stop tracking. Has no effect once terminated.
    pub fn terminate(&mut self, reason: Termination) {
        if matches!(self.phase, Phase::Terminated(_)) {
            return;
        }
        tracing::info!(
            "Tracking terminated ({:?}) after {} frames, {} lost",
            reason,
            self.recorder.len(),
            self.lost_frames()
        );
        self.phase = Phase::Terminated(reason);
    }

    pub fn path(&self) -> &PathSequence {
        self.recorder.sequence()
    }

    pub fn recorder(&self) -> &PathRecorder {
        &self.recorder
    }

    pub fn statuses(&self) -> &[FrameStatus] {
        &self.statuses
    }

    pub fn seed_detection(&self) -> Option<&MarkerDetection> {
        self.seed.as_ref()
    }

    /// Frames processed so far, including the seed frame.
    pub fn frames_processed(&self) -> usize {
        self.recorder.len()
    }

    pub fn lost_frames(&self) -> usize {
        self.statuses
            .iter()
            .filter(|s| **s == FrameStatus::Lost)
            .count()
    }

    /// Consume the tracker, returning the recorder and per-frame statuses.
    pub fn into_parts(self) -> (PathRecorder, Vec<FrameStatus>) {
        (self.recorder, self.statuses)
    }

    fn build_pyramid(&self, frame: &GrayImage) -> Pyramid {
        Pyramid::build(
            frame,
            self.config.flow.max_level as usize,
            self.config.flow.window_size,
        )
    }

    fn record(&mut self, point: Point, status: FrameStatus) -> TrackStep {
        let frame = self.recorder.record(Some(point));
        self.statuses.push(status);
        tracing::debug!("frame {}: ({}) {:?}", frame, point, status);
        TrackStep {
            frame,
            point,
            status,
        }
    }
}
