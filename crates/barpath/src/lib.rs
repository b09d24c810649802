//! barpath: barbell path tracking from lifting video.
//!
//! A circular marker on the barbell end is located once in a user-chosen
//! region of the first frame and then followed frame by frame. The result is
//! a point file with one `x, y` line per frame. A manually annotated
//! reference path can be compared against the automatic one.
//!
//! Stages:
//!
//! 1. **Detect** – gradient Hough circle search in the blurred region.
//! 2. **Track** – pyramidal Lucas-Kanade on a single point; a lost frame
//!    carries the previous point over.
//! 3. **Record** – append-only path, persisted as a plain-text point file.
//! 4. **Align** – pad two paths to equal length and interpolate gaps.
//! 5. **Evaluate** – deviation, failure rate and stability statistics.
//!
//! # Public API
//! - [`track_video`] / [`run_tracking`] for automatic tracking
//! - [`annotate_video`] / [`AnnotationSession`] for manual reference capture
//! - [`evaluate`] for comparing two paths
//! - [`TrackConfig`] and friends for tuning

pub mod align;
pub mod annotate;
pub mod config;
pub mod detector;
pub mod geometry;
pub mod metrics;
pub mod path;
pub mod pipeline;
pub mod source;
pub mod tracker;

#[cfg(test)]
pub(crate) mod test_utils;

pub use align::{align_sequences, interpolate_missing, AlignedPair};
pub use annotate::{
    annotate_video, run_annotation, AnnotationEvent, AnnotationOutcome, AnnotationSession,
    SessionControl,
};
pub use config::{AnnotationConfig, ConfigError, TrackConfig};
pub use detector::{detect_marker, BlurConfig, DetectionError, HoughConfig, MarkerDetection};
pub use geometry::{Point, Region};
pub use metrics::{evaluate, EvalConfig, EvalError, TrackingMetrics};
pub use path::{
    artifact_path, load_points, ArtifactKind, LoadedPath, ParseError, PathIoError, PathRecorder,
    PathSequence, PersistMode,
};
pub use pipeline::{
    run_tracking, track_video, Control, FixedRegion, PipelineError, RegionSelectError,
    RegionSelector, TrackingRun,
};
pub use source::{open_video, FrameReadError, FrameSource, MemoryFrames};
pub use tracker::{FlowConfig, FrameStatus, Termination, Tracker, TrackerError, TrackerState};
