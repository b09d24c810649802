//! Run orchestrator: region -> seed -> track -> persist.

use std::path::Path;
use std::sync::mpsc::{Receiver, TryRecvError};

use super::{Control, PipelineError, RegionSelector, TrackingRun};
use crate::config::TrackConfig;
use crate::path::{artifact_path, persist_points, ArtifactKind};
use crate::source::{open_video, FrameSource};
use crate::tracker::{Termination, Tracker};

/// Frames between progress log lines.
const PROGRESS_EVERY: usize = 100;

/// Track the marker through `source`.
///
/// Fails only before tracking starts (empty or unreadable first frame,
/// region selection, seed detection). Once seeded, end of stream, a stop
/// request on `control`, and read failures all end the run normally with the
/// partial path.
pub fn run_tracking<S: FrameSource + ?Sized>(
    source: &mut S,
    selector: &mut dyn RegionSelector,
    control: Option<&Receiver<Control>>,
    config: &TrackConfig,
) -> Result<TrackingRun, PipelineError> {
    let first = source
        .next_frame()
        .map_err(PipelineError::FirstFrame)?
        .ok_or(PipelineError::EmptyStream)?;
    let frame_size = [first.width(), first.height()];
    if let Some(n) = source.len_hint() {
        tracing::info!("{} frames of {}x{}", n + 1, frame_size[0], frame_size[1]);
    }

    let region = selector.select_region(&first)?;
    tracing::info!("Search region: {}", region);

    let mut tracker = Tracker::new(config.clone());
    let seed = tracker.seed(&first, region)?;
    drop(first);

    let termination = loop {
        if stop_requested(control) {
            break Termination::Cancelled;
        }
        match source.next_frame() {
            Ok(Some(frame)) => {
                let step = tracker.step(&frame)?;
                if step.frame % PROGRESS_EVERY == 0 {
                    tracing::debug!(
                        "frame {}: {} lost so far",
                        step.frame,
                        tracker.lost_frames()
                    );
                }
            }
            Ok(None) => break Termination::EndOfStream,
            Err(e) => {
                tracing::warn!("Stopping early: {}", e);
                break Termination::FrameReadFailed;
            }
        }
    };
    tracker.terminate(termination);

    let lost_frames = tracker.lost_frames();
    if lost_frames > 0 {
        tracing::warn!(
            "{} of {} frames carried over a previous point",
            lost_frames,
            tracker.frames_processed()
        );
    }
    let (recorder, statuses) = tracker.into_parts();
    Ok(TrackingRun {
        path: recorder.into_sequence(),
        statuses,
        region: seed.region,
        seed,
        termination,
        lost_frames,
        frame_size,
        output: None,
    })
}

/// Open `video`, track it and write `<stem>_auto_track.txt` into `out_dir`.
///
/// The point file is overwritten on every run, including cancelled and
/// read-failure runs.
pub fn track_video(
    video: &Path,
    out_dir: &Path,
    selector: &mut dyn RegionSelector,
    control: Option<&Receiver<Control>>,
    config: &TrackConfig,
) -> Result<TrackingRun, PipelineError> {
    tracing::info!("Opening {}", video.display());
    let mut source = open_video(video).map_err(PipelineError::Open)?;
    let mut run = run_tracking(&mut source, selector, control, config)?;
    drop(source);

    let kind = ArtifactKind::AutoTrack;
    let out = artifact_path(video, out_dir, kind);
    persist_points(&run.path, &out, kind.persist_mode())?;
    run.output = Some(out);
    Ok(run)
}

/// Non-blocking poll; a closed channel never stops the run.
fn stop_requested(control: Option<&Receiver<Control>>) -> bool {
    let Some(rx) = control else {
        return false;
    };
    match rx.try_recv() {
        Ok(Control::Stop) => {
            tracing::info!("Stop requested");
            true
        }
        Err(TryRecvError::Empty | TryRecvError::Disconnected) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Region;
    use crate::path::load_points;
    use crate::pipeline::FixedRegion;
    use crate::source::MemoryFrames;
    use crate::test_utils::{marker_frame, moving_marker_frames, ScriptedFrames};
    use crate::tracker::FrameStatus;
    use image::GrayImage;
    use std::sync::mpsc;

    fn test_config() -> TrackConfig {
        let mut cfg = TrackConfig::default();
        cfg.detector.accumulator_threshold = 15;
        cfg
    }

    fn region() -> FixedRegion {
        FixedRegion(Region::new(40, 40, 80, 80))
    }

    #[test]
    fn path_has_one_entry_per_frame() {
        let mut src = MemoryFrames::new(moving_marker_frames(6, [80.0, 80.0], [1.0, 2.0]));
        let run = run_tracking(&mut src, &mut region(), None, &test_config()).unwrap();
        assert_eq!(run.frames(), 6);
        assert_eq!(run.statuses.len(), 6);
        assert_eq!(run.statuses[0], FrameStatus::Detected);
        assert!(run.completed());
        assert_eq!(run.lost_frames, 0);
        assert_eq!(run.frame_size, [160, 160]);
        assert_eq!(run.path.present_count(), 6);
    }

    #[test]
    fn stop_request_keeps_partial_path() {
        let (tx, rx) = mpsc::channel();
        tx.send(Control::Stop).unwrap();
        let mut src = MemoryFrames::new(moving_marker_frames(5, [80.0, 80.0], [1.0, 0.0]));
        let run = run_tracking(&mut src, &mut region(), Some(&rx), &test_config()).unwrap();
        assert_eq!(run.termination, Termination::Cancelled);
        assert_eq!(run.frames(), 1);
    }

    #[test]
    fn disconnected_control_is_not_a_stop() {
        let (tx, rx) = mpsc::channel::<Control>();
        drop(tx);
        let mut src = MemoryFrames::new(moving_marker_frames(3, [80.0, 80.0], [1.0, 0.0]));
        let run = run_tracking(&mut src, &mut region(), Some(&rx), &test_config()).unwrap();
        assert_eq!(run.termination, Termination::EndOfStream);
        assert_eq!(run.frames(), 3);
    }

    #[test]
    fn read_failure_ends_run_gracefully() {
        let mut src = ScriptedFrames::new(moving_marker_frames(3, [80.0, 80.0], [0.0, 1.0])).then_fail();
        let run = run_tracking(&mut src, &mut region(), None, &test_config()).unwrap();
        assert_eq!(run.termination, Termination::FrameReadFailed);
        assert_eq!(run.frames(), 3);
    }

    #[test]
    fn unreadable_first_frame_aborts() {
        let mut src = ScriptedFrames::new(Vec::new()).then_fail();
        let err = run_tracking(&mut src, &mut region(), None, &test_config()).unwrap_err();
        assert!(matches!(err, PipelineError::FirstFrame(_)));

        let mut empty = MemoryFrames::default();
        let err = run_tracking(&mut empty, &mut region(), None, &test_config()).unwrap_err();
        assert!(matches!(err, PipelineError::EmptyStream));
    }

    #[test]
    fn missing_marker_is_fatal() {
        let flat = GrayImage::from_pixel(160, 160, image::Luma([90]));
        let mut src = MemoryFrames::new(vec![flat.clone(), flat]);
        let err = run_tracking(&mut src, &mut region(), None, &TrackConfig::default()).unwrap_err();
        assert!(matches!(err, PipelineError::Detection(_)));
    }

    #[test]
    fn track_video_overwrites_track_file() {
        let clip = tempfile::tempdir().unwrap();
        for (i, frame) in moving_marker_frames(4, [80.0, 80.0], [2.0, 0.0]).iter().enumerate() {
            frame.save(clip.path().join(format!("f{i:03}.png"))).unwrap();
        }
        let out = tempfile::tempdir().unwrap();
        let expected = out.path().join(format!(
            "{}_auto_track.txt",
            crate::path::video_stem(clip.path())
        ));
        std::fs::write(&expected, "1, 1\n1, 1\n1, 1\n1, 1\n1, 1\n1, 1\n").unwrap();

        let run = track_video(clip.path(), out.path(), &mut region(), None, &test_config()).unwrap();
        assert_eq!(run.output.as_deref(), Some(expected.as_path()));

        let loaded = load_points(&expected).unwrap();
        assert_eq!(loaded.sequence, run.path);
        assert!(loaded.diagnostics.is_empty());
    }

    fn write_clip(dir: &Path, frames: &[GrayImage]) {
        for (i, frame) in frames.iter().enumerate() {
            frame.save(dir.join(format!("f{i:03}.png"))).unwrap();
        }
    }

    #[test]
    fn track_video_persists_partial_path_on_stop() {
        let clip = tempfile::tempdir().unwrap();
        write_clip(clip.path(), &moving_marker_frames(5, [80.0, 80.0], [1.0, 0.0]));
        let out = tempfile::tempdir().unwrap();
        let (tx, rx) = mpsc::channel();
        tx.send(Control::Stop).unwrap();

        let run = track_video(clip.path(), out.path(), &mut region(), Some(&rx), &test_config()).unwrap();
        assert_eq!(run.termination, Termination::Cancelled);
        assert_eq!(run.frames(), 1);

        let written = run.output.as_deref().unwrap();
        let loaded = load_points(written).unwrap();
        assert_eq!(loaded.sequence, run.path);
        assert_eq!(loaded.sequence.len(), 1);
    }

    #[test]
    fn track_video_persists_partial_path_on_corrupt_frame() {
        let clip = tempfile::tempdir().unwrap();
        write_clip(clip.path(), &moving_marker_frames(3, [80.0, 80.0], [0.0, 2.0]));
        std::fs::write(clip.path().join("f003.png"), b"not a png").unwrap();
        marker_frame(160, 160, [80.0, 90.0])
            .save(clip.path().join("f004.png"))
            .unwrap();
        let out = tempfile::tempdir().unwrap();

        let run = track_video(clip.path(), out.path(), &mut region(), None, &test_config()).unwrap();
        assert_eq!(run.termination, Termination::FrameReadFailed);
        assert_eq!(run.frames(), 3);

        let written = run.output.as_deref().unwrap();
        let loaded = load_points(written).unwrap();
        assert_eq!(loaded.sequence, run.path);
        assert_eq!(loaded.sequence.len(), 3);
        assert!(loaded.diagnostics.is_empty());
    }

    #[test]
    fn report_serializes_statuses() {
        let mut src = MemoryFrames::new(moving_marker_frames(2, [80.0, 80.0], [1.0, 1.0]));
        let run = run_tracking(&mut src, &mut region(), None, &test_config()).unwrap();
        let json = serde_json::to_value(&run).unwrap();
        assert_eq!(json["termination"], "end_of_stream");
        assert_eq!(json["statuses"][0], "detected");
        assert_eq!(json["path"].as_array().unwrap().len(), 2);
        assert!(json.get("output").is_none());
    }
}
