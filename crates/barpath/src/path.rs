//! Frame-indexed point sequences and the point-file format.
//!
//! A point file is plain text with one `"<x>, <y>"` record per line, in
//! chronological order, with no header. The automatic tracker overwrites its
//! artifact on every run ([`PersistMode::Truncate`]); manual annotation
//! accumulates across sessions ([`PersistMode::Append`]).

use std::fs::{File, OpenOptions};
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::geometry::Point;

// ── Sequence ───────────────────────────────────────────────────────────────

/// Ordered sequence of point-or-missing entries; index = frame number.
///
/// Append-only: entries are never reordered or removed.
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(transparent)]
pub struct PathSequence {
    entries: Vec<Option<Point>>,
}

impl PathSequence {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one entry and return its frame index.
    pub fn push(&mut self, entry: Option<Point>) -> usize {
        self.entries.push(entry);
        self.entries.len() - 1
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn get(&self, frame: usize) -> Option<Option<Point>> {
        self.entries.get(frame).copied()
    }

    pub fn entries(&self) -> &[Option<Point>] {
        &self.entries
    }

    /// Number of entries that carry a point.
    pub fn present_count(&self) -> usize {
        self.entries.iter().filter(|e| e.is_some()).count()
    }

    pub fn iter(&self) -> impl Iterator<Item = Option<Point>> + '_ {
        self.entries.iter().copied()
    }
}

impl FromIterator<Option<Point>> for PathSequence {
    fn from_iter<I: IntoIterator<Item = Option<Point>>>(iter: I) -> Self {
        Self {
            entries: iter.into_iter().collect(),
        }
    }
}

impl FromIterator<Point> for PathSequence {
    fn from_iter<I: IntoIterator<Item = Point>>(iter: I) -> Self {
        iter.into_iter().map(Some).collect()
    }
}

impl From<Vec<Point>> for PathSequence {
    fn from(points: Vec<Point>) -> Self {
        points.into_iter().collect()
    }
}

// ── Errors ─────────────────────────────────────────────────────────────────

/// A point-file line that could not be read as two integers.
///
/// Recovered locally: the line is skipped and the error kept as a diagnostic.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("line {line}: {reason} ({content:?})")]
pub struct ParseError {
    /// 1-based line number.
    pub line: usize,
    /// Offending line, trimmed.
    pub content: String,
    pub reason: String,
}

/// I/O failure while reading or writing a point file.
#[derive(Debug, thiserror::Error)]
pub enum PathIoError {
    #[error("failed to read point file {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
    #[error("failed to write point file {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: io::Error,
    },
}

// ── Recorder ───────────────────────────────────────────────────────────────

/// How a recorder writes its artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistMode {
    /// Overwrite any existing file.
    Truncate,
    /// Add records after the existing content.
    Append,
}

/// Accumulates one entry per processed frame and persists the result.
#[derive(Debug, Clone, Default)]
pub struct PathRecorder {
    sequence: PathSequence,
}

impl PathRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the entry for the next frame; returns its frame index.
    pub fn record(&mut self, entry: Option<Point>) -> usize {
        self.sequence.push(entry)
    }

    pub fn len(&self) -> usize {
        self.sequence.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sequence.is_empty()
    }

    pub fn sequence(&self) -> &PathSequence {
        &self.sequence
    }

    pub fn into_sequence(self) -> PathSequence {
        self.sequence
    }

    /// Write the whole sequence to `path`; returns the number of records written.
    pub fn persist(&self, path: &Path, mode: PersistMode) -> Result<usize, PathIoError> {
        persist_points(&self.sequence, path, mode)
    }
}

impl From<PathSequence> for PathRecorder {
    fn from(sequence: PathSequence) -> Self {
        Self { sequence }
    }
}

/// Write `sequence` to the file at `path` in the given mode.
pub fn persist_points(
    sequence: &PathSequence,
    path: &Path,
    mode: PersistMode,
) -> Result<usize, PathIoError> {
    let write_err = |source| PathIoError::Write {
        path: path.to_path_buf(),
        source,
    };
    let file = match mode {
        PersistMode::Truncate => File::create(path),
        PersistMode::Append => OpenOptions::new().create(true).append(true).open(path),
    }
    .map_err(write_err)?;
    let mut writer = BufWriter::new(file);
    let n = write_points(&mut writer, sequence).map_err(write_err)?;
    writer.flush().map_err(write_err)?;
    tracing::info!("Wrote {} points to {} ({:?})", n, path.display(), mode);
    Ok(n)
}

// ── Text format ────────────────────────────────────────────────────────────

/// Serialize present entries, one `"x, y"` line each. Missing entries have no
/// textual form and are skipped.
pub fn write_points<W: Write>(writer: &mut W, sequence: &PathSequence) -> io::Result<usize> {
    let mut written = 0;
    for (frame, entry) in sequence.iter().enumerate() {
        match entry {
            Some(p) => {
                writeln!(writer, "{}", p)?;
                written += 1;
            }
            None => tracing::debug!("frame {} has no point; not written", frame),
        }
    }
    Ok(written)
}

/// Parse one record. Surrounding whitespace around each field is allowed.
pub fn parse_point_line(line: &str) -> Result<Point, String> {
    let mut fields = line.trim().split(',');
    let (Some(x), Some(y), None) = (fields.next(), fields.next(), fields.next()) else {
        return Err("expected exactly two comma-separated fields".to_string());
    };
    let x = x
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("bad x coordinate: {e}"))?;
    let y = y
        .trim()
        .parse::<i32>()
        .map_err(|e| format!("bad y coordinate: {e}"))?;
    Ok(Point::new(x, y))
}

/// A sequence read from a point file, plus the lines that were skipped.
#[derive(Debug, Clone, Default)]
pub struct LoadedPath {
    pub sequence: PathSequence,
    pub diagnostics: Vec<ParseError>,
}

/// Read point records from any buffered reader.
///
/// Lines that are not two integers, including lines that are not UTF-8, are
/// skipped with a diagnostic. Only I/O failures are errors. `source_name`
/// only labels the diagnostics in the log.
pub fn read_points<R: BufRead>(reader: R, source_name: &str) -> io::Result<LoadedPath> {
    let mut loaded = LoadedPath::default();
    for (idx, bytes) in reader.split(b'\n').enumerate() {
        let bytes = bytes?;
        let parsed = match std::str::from_utf8(&bytes) {
            Ok(line) => parse_point_line(line).map_err(|reason| (line.trim().to_string(), reason)),
            Err(e) => Err((
                String::from_utf8_lossy(&bytes).trim().to_string(),
                format!("not valid UTF-8: {e}"),
            )),
        };
        match parsed {
            Ok(p) => {
                loaded.sequence.push(Some(p));
            }
            Err((content, reason)) => {
                let diag = ParseError {
                    line: idx + 1,
                    content,
                    reason,
                };
                tracing::warn!("Skipping invalid line in {}: {}", source_name, diag);
                loaded.diagnostics.push(diag);
            }
        }
    }
    Ok(loaded)
}

/// Load a point file from disk.
pub fn load_points(path: &Path) -> Result<LoadedPath, PathIoError> {
    let read_err = |source| PathIoError::Read {
        path: path.to_path_buf(),
        source,
    };
    let file = File::open(path).map_err(read_err)?;
    let loaded = read_points(BufReader::new(file), &path.display().to_string()).map_err(read_err)?;
    tracing::debug!(
        "Loaded {} points from {} ({} skipped)",
        loaded.sequence.len(),
        path.display(),
        loaded.diagnostics.len()
    );
    Ok(loaded)
}

// ── Artifact naming ────────────────────────────────────────────────────────

/// Which producer wrote a point file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArtifactKind {
    /// Output of the automatic tracking pipeline.
    AutoTrack,
    /// Output of the manual annotation session.
    ManualAnnotation,
}

impl ArtifactKind {
    pub fn suffix(self) -> &'static str {
        match self {
            Self::AutoTrack => "_auto_track.txt",
            Self::ManualAnnotation => "_auto_anno.txt",
        }
    }

    pub fn persist_mode(self) -> PersistMode {
        match self {
            Self::AutoTrack => PersistMode::Truncate,
            Self::ManualAnnotation => PersistMode::Append,
        }
    }
}

/// Stem used for artifacts: the file name up to its first `.`.
pub fn video_stem(video: &Path) -> String {
    let name = video
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();
    name.split('.').next().unwrap_or_default().to_string()
}

/// `<stem><suffix>` for a video path.
pub fn artifact_file_name(video: &Path, kind: ArtifactKind) -> String {
    format!("{}{}", video_stem(video), kind.suffix())
}

/// Artifact path inside `out_dir`.
pub fn artifact_path(video: &Path, out_dir: &Path, kind: ArtifactKind) -> PathBuf {
    out_dir.join(artifact_file_name(video, kind))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn seq(points: &[(i32, i32)]) -> PathSequence {
        points.iter().map(|&p| Point::from(p)).collect()
    }

    #[test]
    fn parse_accepts_spaced_and_tight_records() {
        assert_eq!(parse_point_line("12, 34"), Ok(Point::new(12, 34)));
        assert_eq!(parse_point_line("  -5,7 "), Ok(Point::new(-5, 7)));
        assert!(parse_point_line("1.5, 2").is_err());
        assert!(parse_point_line("1, 2, 3").is_err());
        assert!(parse_point_line("").is_err());
    }

    #[test]
    fn malformed_line_is_skipped_with_diagnostic() {
        let text = "1, 2\nnot a point\n3, 4\n";
        let loaded = read_points(text.as_bytes(), "mem").unwrap();
        assert_eq!(loaded.sequence, seq(&[(1, 2), (3, 4)]));
        assert_eq!(loaded.diagnostics.len(), 1);
        assert_eq!(loaded.diagnostics[0].line, 2);
        assert_eq!(loaded.diagnostics[0].content, "not a point");
    }

    #[test]
    fn non_utf8_line_is_skipped_with_diagnostic() {
        let bytes: &[u8] = b"1, 2\n\xff\xfe garbage\n3, 4\r\n";
        let loaded = read_points(bytes, "mem").unwrap();
        assert_eq!(loaded.sequence, seq(&[(1, 2), (3, 4)]));
        assert_eq!(loaded.diagnostics.len(), 1);
        assert_eq!(loaded.diagnostics[0].line, 2);
        assert!(loaded.diagnostics[0].reason.contains("UTF-8"));
        assert!(loaded.diagnostics[0].content.ends_with("garbage"));
    }

    #[test]
    fn load_keeps_valid_lines_around_binary_noise() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("noisy.txt");
        std::fs::write(&file, b"5, 6\n\x80\x81\n7, 8\n").unwrap();
        let loaded = load_points(&file).unwrap();
        assert_eq!(loaded.sequence, seq(&[(5, 6), (7, 8)]));
        assert_eq!(loaded.diagnostics.len(), 1);
    }

    #[test]
    fn write_skips_missing_entries() {
        let s: PathSequence = vec![Some(Point::new(1, 2)), None, Some(Point::new(-3, 4))]
            .into_iter()
            .collect();
        let mut out = Vec::new();
        let n = write_points(&mut out, &s).unwrap();
        assert_eq!(n, 2);
        assert_eq!(String::from_utf8(out).unwrap(), "1, 2\n-3, 4\n");
    }

    #[test]
    fn truncate_replaces_and_append_accumulates() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("points.txt");

        let mut rec = PathRecorder::new();
        rec.record(Some(Point::new(1, 1)));
        rec.record(Some(Point::new(2, 2)));

        rec.persist(&file, PersistMode::Truncate).unwrap();
        rec.persist(&file, PersistMode::Truncate).unwrap();
        assert_eq!(load_points(&file).unwrap().sequence.len(), 2);

        rec.persist(&file, PersistMode::Append).unwrap();
        let loaded = load_points(&file).unwrap();
        assert_eq!(loaded.sequence, seq(&[(1, 1), (2, 2), (1, 1), (2, 2)]));
        assert!(loaded.diagnostics.is_empty());
    }

    #[test]
    fn append_creates_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let file = dir.path().join("new.txt");
        let mut rec = PathRecorder::new();
        rec.record(Some(Point::new(5, 6)));
        assert_eq!(rec.persist(&file, PersistMode::Append).unwrap(), 1);
        assert_eq!(std::fs::read_to_string(&file).unwrap(), "5, 6\n");
    }

    #[test]
    fn load_missing_file_is_read_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = load_points(&dir.path().join("absent.txt")).unwrap_err();
        assert!(matches!(err, PathIoError::Read { .. }));
    }

    #[test]
    fn recorder_indices_follow_frame_order() {
        let mut rec = PathRecorder::new();
        assert_eq!(rec.record(Some(Point::new(0, 0))), 0);
        assert_eq!(rec.record(None), 1);
        assert_eq!(rec.record(Some(Point::new(1, 1))), 2);
        assert_eq!(rec.sequence().present_count(), 2);
        assert_eq!(rec.sequence().get(1), Some(None));
    }

    #[test]
    fn artifact_names_use_stem_before_first_dot() {
        let video = Path::new("/videos/squat.set1.mp4");
        assert_eq!(video_stem(video), "squat");
        assert_eq!(
            artifact_file_name(video, ArtifactKind::AutoTrack),
            "squat_auto_track.txt"
        );
        assert_eq!(
            artifact_path(video, Path::new("out"), ArtifactKind::ManualAnnotation),
            Path::new("out").join("squat_auto_anno.txt")
        );
        assert_eq!(ArtifactKind::AutoTrack.persist_mode(), PersistMode::Truncate);
        assert_eq!(
            ArtifactKind::ManualAnnotation.persist_mode(),
            PersistMode::Append
        );
    }
}
