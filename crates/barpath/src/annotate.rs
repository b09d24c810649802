//! Manual reference capture.
//!
//! An [`AnnotationSession`] holds all interactive state for one pass over a
//! clip. Input arrives as [`AnnotationEvent`]s over a channel; the frame loop
//! in [`run_annotation`] feeds them to the session one at a time.
//!
//! Per frame: the detector suggests a point inside the region, a click
//! replaces it, `Clear` drops it, and `Next` commits whatever is current
//! (possibly nothing) and moves on. `Save` ends the session and keeps the
//! committed points; `Quit` ends it and discards them.

use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::mpsc::Receiver;

use image::GrayImage;

use crate::config::AnnotationConfig;
use crate::detector::{detect_marker, MarkerDetection};
use crate::geometry::{Point, Region};
use crate::path::{artifact_path, persist_points, ArtifactKind, PathRecorder, PathSequence};
use crate::pipeline::{PipelineError, RegionSelector};
use crate::source::{open_video, FrameSource};

/// User input during annotation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationEvent {
    /// Use this frame-absolute point for the current frame.
    Click(Point),
    /// Commit the current point and advance.
    Next,
    /// Drop the current point.
    Clear,
    /// Stop and keep committed points.
    Save,
    /// Stop and discard committed points.
    Quit,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("unrecognized input {input:?} (expected `click X Y`, `n`, `c`, `s` or `q`)")]
pub struct AnnotationEventParseError {
    pub input: String,
}

impl FromStr for AnnotationEvent {
    type Err = AnnotationEventParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let err = || AnnotationEventParseError {
            input: s.to_string(),
        };
        let mut words = s.split_whitespace();
        let event = match words.next().ok_or_else(err)? {
            "n" | "next" => Self::Next,
            "c" | "clear" => Self::Clear,
            "s" | "save" => Self::Save,
            "q" | "quit" => Self::Quit,
            "click" => {
                let x = words.next().and_then(|w| w.parse().ok()).ok_or_else(err)?;
                let y = words.next().and_then(|w| w.parse().ok()).ok_or_else(err)?;
                Self::Click(Point::new(x, y))
            }
            _ => return Err(err()),
        };
        if words.next().is_some() {
            return Err(err());
        }
        Ok(event)
    }
}

/// What the frame loop should do after an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionControl {
    /// Stay on the current frame.
    Continue,
    /// Move to the next frame.
    Advance,
    /// End the session.
    Finish { save: bool },
}

/// Interactive capture state for one clip.
pub struct AnnotationSession {
    config: AnnotationConfig,
    region: Region,
    total_frames: Option<usize>,
    frames_seen: usize,
    current: Option<Point>,
    suggestion: Option<MarkerDetection>,
    recorder: PathRecorder,
}

impl AnnotationSession {
    pub fn new(config: AnnotationConfig, region: Region, total_frames: Option<usize>) -> Self {
        Self {
            config,
            region,
            total_frames,
            frames_seen: 0,
            current: None,
            suggestion: None,
            recorder: PathRecorder::new(),
        }
    }

    /// Show a new frame: reset the current point to the detector's
    /// suggestion, if any.
    pub fn begin_frame(&mut self, frame: &GrayImage) -> Option<Point> {
        self.frames_seen += 1;
        self.suggestion =
            match detect_marker(frame, self.region, &self.config.detector, &self.config.blur) {
                Ok(d) => Some(d),
                Err(e) => {
                    tracing::debug!("frame {}: no suggestion ({})", self.progress(), e);
                    None
                }
            };
        self.current = self.suggestion.map(|d| d.point);
        match self.current {
            Some(p) => tracing::info!("Frame {}: suggested ({})", self.progress(), p),
            None => tracing::info!("Frame {}: no suggestion, click to mark", self.progress()),
        }
        self.current
    }

    pub fn handle(&mut self, event: AnnotationEvent) -> SessionControl {
        match event {
            AnnotationEvent::Click(p) => {
                tracing::info!("Point clicked: ({})", p);
                self.current = Some(p);
                SessionControl::Continue
            }
            AnnotationEvent::Clear => {
                self.current = None;
                SessionControl::Continue
            }
            AnnotationEvent::Next => {
                self.recorder.record(self.current.take());
                SessionControl::Advance
            }
            AnnotationEvent::Save => SessionControl::Finish { save: true },
            AnnotationEvent::Quit => SessionControl::Finish { save: false },
        }
    }

    /// Point that `Next` would commit.
    pub fn current_point(&self) -> Option<Point> {
        self.current
    }

    pub fn suggestion(&self) -> Option<&MarkerDetection> {
        self.suggestion.as_ref()
    }

    pub fn region(&self) -> Region {
        self.region
    }

    /// 1-based number of the frame on display.
    pub fn frame_number(&self) -> usize {
        self.frames_seen
    }

    pub fn total_frames(&self) -> Option<usize> {
        self.total_frames
    }

    /// `"current/total"` counter; total is `?` when unknown.
    pub fn progress(&self) -> String {
        match self.total_frames {
            Some(t) => format!("{}/{}", self.frames_seen, t),
            None => format!("{}/?", self.frames_seen),
        }
    }

    /// Committed entries, one per advanced frame.
    pub fn points(&self) -> &PathSequence {
        self.recorder.sequence()
    }

    pub fn into_recorder(self) -> PathRecorder {
        self.recorder
    }
}

/// Result of an annotation pass.
#[derive(Debug, Clone, serde::Serialize)]
pub struct AnnotationOutcome {
    /// Committed entries; frames advanced without a point are missing.
    pub path: PathSequence,
    /// Whether the points are to be kept.
    pub saved: bool,
    pub frames_viewed: usize,
    /// Point file appended to, if saved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<PathBuf>,
}

/// Drive a session over `source` with events from `events`.
///
/// End of stream, a read failure, or a closed event channel end the session
/// as if `Save` had been sent.
pub fn run_annotation<S: FrameSource + ?Sized>(
    source: &mut S,
    selector: &mut dyn RegionSelector,
    events: &Receiver<AnnotationEvent>,
    config: &AnnotationConfig,
) -> Result<AnnotationOutcome, PipelineError> {
    let mut frame = source
        .next_frame()
        .map_err(PipelineError::FirstFrame)?
        .ok_or(PipelineError::EmptyStream)?;
    let total = source.len_hint().map(|n| n + 1);
    let region = selector.select_region(&frame)?;
    tracing::info!("Annotating with search region {}", region);

    let mut session = AnnotationSession::new(config.clone(), region, total);
    let saved = 'frames: loop {
        session.begin_frame(&frame);
        loop {
            let Ok(event) = events.recv() else {
                tracing::info!("Input closed at frame {}", session.progress());
                break 'frames true;
            };
            match session.handle(event) {
                SessionControl::Continue => {}
                SessionControl::Advance => break,
                SessionControl::Finish { save } => break 'frames save,
            }
        }
        frame = match source.next_frame() {
            Ok(Some(f)) => f,
            Ok(None) => break true,
            Err(e) => {
                tracing::warn!("Stopping early: {}", e);
                break true;
            }
        };
    };

    let frames_viewed = session.frame_number();
    Ok(AnnotationOutcome {
        path: session.into_recorder().into_sequence(),
        saved,
        frames_viewed,
        output: None,
    })
}

/// Annotate `video` and append the points to `<stem>_auto_anno.txt` in
/// `out_dir` unless the session was quit.
pub fn annotate_video(
    video: &Path,
    out_dir: &Path,
    selector: &mut dyn RegionSelector,
    events: &Receiver<AnnotationEvent>,
    config: &AnnotationConfig,
) -> Result<AnnotationOutcome, PipelineError> {
    let mut source = open_video(video).map_err(PipelineError::Open)?;
    let mut outcome = run_annotation(&mut source, selector, events, config)?;
    drop(source);

    if outcome.saved {
        let kind = ArtifactKind::ManualAnnotation;
        let out = artifact_path(video, out_dir, kind);
        persist_points(&outcome.path, &out, kind.persist_mode())?;
        outcome.output = Some(out);
    } else {
        tracing::info!("Quit without saving {} points", outcome.path.present_count());
    }
    Ok(outcome)
}
