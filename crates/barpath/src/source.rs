//! Grayscale frame streams.
//!
//! A source yields frames strictly in stream order; `Ok(None)` marks the end.
//! Video containers are not decoded here: a clip is either a directory of
//! extracted still frames or an animated GIF.

use std::collections::VecDeque;
use std::fs::File;
use std::io::BufReader;
use std::path::{Path, PathBuf};

use image::codecs::gif::GifDecoder;
use image::{AnimationDecoder, DynamicImage, Frames, GrayImage};

/// Still-image extensions accepted in a frame directory.
const FRAME_EXTENSIONS: &[&str] = &["png", "jpg", "jpeg", "bmp", "tif", "tiff", "pgm", "ppm", "webp"];

/// Failure to obtain the next frame.
#[derive(Debug, thiserror::Error)]
pub enum FrameReadError {
    #[error("cannot open {path}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("frame {index}: {source}")]
    Decode {
        index: usize,
        #[source]
        source: image::ImageError,
    },
    #[error("frame {index}: {reason}")]
    Corrupt { index: usize, reason: String },
    #[error("unsupported frame source {path} (expected a frame directory, a GIF or a still image)")]
    Unsupported { path: PathBuf },
}

/// A stream of grayscale frames.
pub trait FrameSource {
    /// Next frame, `Ok(None)` at end of stream.
    fn next_frame(&mut self) -> Result<Option<GrayImage>, FrameReadError>;

    /// Remaining frames, when known up front.
    fn len_hint(&self) -> Option<usize> {
        None
    }
}

impl<S: FrameSource + ?Sized> FrameSource for Box<S> {
    fn next_frame(&mut self) -> Result<Option<GrayImage>, FrameReadError> {
        (**self).next_frame()
    }

    fn len_hint(&self) -> Option<usize> {
        (**self).len_hint()
    }
}

/// Still images decoded lazily, one per frame.
pub struct ImageSequence {
    files: VecDeque<PathBuf>,
    index: usize,
}

impl ImageSequence {
    /// Frames are the directory's image files in file-name order.
    pub fn from_dir(dir: &Path) -> Result<Self, FrameReadError> {
        let open_err = |source| FrameReadError::Open {
            path: dir.to_path_buf(),
            source,
        };
        let mut files = Vec::new();
        for entry in std::fs::read_dir(dir).map_err(open_err)? {
            let path = entry.map_err(open_err)?.path();
            if path.is_file() && has_frame_extension(&path) {
                files.push(path);
            }
        }
        files.sort();
        tracing::debug!("{} frame files in {}", files.len(), dir.display());
        Ok(Self::from_files(files))
    }

    pub fn from_files(files: Vec<PathBuf>) -> Self {
        Self {
            files: files.into(),
            index: 0,
        }
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<GrayImage>, FrameReadError> {
        let Some(path) = self.files.pop_front() else {
            return Ok(None);
        };
        let index = self.index;
        self.index += 1;
        let img = image::open(&path).map_err(|source| FrameReadError::Decode { index, source })?;
        Ok(Some(img.into_luma8()))
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.files.len())
    }
}

/// Frames of an animated GIF, decoded on demand.
pub struct GifFrames {
    frames: Frames<'static>,
    index: usize,
}

impl GifFrames {
    pub fn open(path: &Path) -> Result<Self, FrameReadError> {
        let file = File::open(path).map_err(|source| FrameReadError::Open {
            path: path.to_path_buf(),
            source,
        })?;
        let decoder = GifDecoder::new(BufReader::new(file))
            .map_err(|source| FrameReadError::Decode { index: 0, source })?;
        Ok(Self {
            frames: decoder.into_frames(),
            index: 0,
        })
    }
}

impl FrameSource for GifFrames {
    fn next_frame(&mut self) -> Result<Option<GrayImage>, FrameReadError> {
        let index = self.index;
        match self.frames.next() {
            None => Ok(None),
            Some(frame) => {
                self.index += 1;
                let frame = frame.map_err(|source| FrameReadError::Decode { index, source })?;
                Ok(Some(DynamicImage::ImageRgba8(frame.into_buffer()).into_luma8()))
            }
        }
    }
}

/// Frames already in memory.
#[derive(Debug, Clone, Default)]
pub struct MemoryFrames {
    frames: VecDeque<GrayImage>,
}

impl MemoryFrames {
    pub fn new(frames: Vec<GrayImage>) -> Self {
        Self {
            frames: frames.into(),
        }
    }
}

impl FrameSource for MemoryFrames {
    fn next_frame(&mut self) -> Result<Option<GrayImage>, FrameReadError> {
        Ok(self.frames.pop_front())
    }

    fn len_hint(&self) -> Option<usize> {
        Some(self.frames.len())
    }
}

/// Open `path` as a frame source.
///
/// Directories become an [`ImageSequence`], `.gif` files a [`GifFrames`],
/// and any other still image a single-frame sequence.
pub fn open_video(path: &Path) -> Result<Box<dyn FrameSource>, FrameReadError> {
    if path.is_dir() {
        return Ok(Box::new(ImageSequence::from_dir(path)?));
    }
    if !path.exists() {
        return Err(FrameReadError::Open {
            path: path.to_path_buf(),
            source: std::io::Error::from(std::io::ErrorKind::NotFound),
        });
    }
    match extension_lowercase(path).as_deref() {
        Some("gif") => Ok(Box::new(GifFrames::open(path)?)),
        _ if has_frame_extension(path) => {
            Ok(Box::new(ImageSequence::from_files(vec![path.to_path_buf()])))
        }
        _ => Err(FrameReadError::Unsupported {
            path: path.to_path_buf(),
        }),
    }
}

fn extension_lowercase(path: &Path) -> Option<String> {
    path.extension()
        .and_then(|e| e.to_str())
        .map(|e| e.to_ascii_lowercase())
}

fn has_frame_extension(path: &Path) -> bool {
    extension_lowercase(path).is_some_and(|e| FRAME_EXTENSIONS.contains(&e.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::Luma;

    fn frame(v: u8) -> GrayImage {
        GrayImage::from_pixel(8, 6, Luma([v]))
    }

    #[test]
    fn memory_frames_yield_in_order_then_end() {
        let mut src = MemoryFrames::new(vec![frame(1), frame(2)]);
        assert_eq!(src.len_hint(), Some(2));
        assert_eq!(src.next_frame().unwrap().unwrap().get_pixel(0, 0)[0], 1);
        assert_eq!(src.next_frame().unwrap().unwrap().get_pixel(0, 0)[0], 2);
        assert!(src.next_frame().unwrap().is_none());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn directory_frames_sorted_by_name() {
        let dir = tempfile::tempdir().unwrap();
        frame(30).save(dir.path().join("frame_002.png")).unwrap();
        frame(10).save(dir.path().join("frame_000.png")).unwrap();
        frame(20).save(dir.path().join("frame_001.png")).unwrap();
        std::fs::write(dir.path().join("notes.txt"), "not a frame").unwrap();

        let mut src = open_video(dir.path()).unwrap();
        assert_eq!(src.len_hint(), Some(3));
        let values: Vec<u8> = std::iter::from_fn(|| src.next_frame().unwrap())
            .map(|f| f.get_pixel(0, 0)[0])
            .collect();
        assert_eq!(values, vec![10, 20, 30]);
    }

    #[test]
    fn undecodable_frame_reports_its_index() {
        let dir = tempfile::tempdir().unwrap();
        frame(10).save(dir.path().join("a.png")).unwrap();
        std::fs::write(dir.path().join("b.png"), b"garbage").unwrap();

        let mut src = ImageSequence::from_dir(dir.path()).unwrap();
        assert!(src.next_frame().unwrap().is_some());
        match src.next_frame() {
            Err(FrameReadError::Decode { index, .. }) => assert_eq!(index, 1),
            other => panic!("expected decode error, got {other:?}"),
        }
    }

    #[test]
    fn still_image_is_a_single_frame() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("clip.png");
        frame(7).save(&path).unwrap();
        let mut src = open_video(&path).unwrap();
        assert!(src.next_frame().unwrap().is_some());
        assert!(src.next_frame().unwrap().is_none());
    }

    #[test]
    fn container_formats_are_unsupported() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("lift.mp4");
        std::fs::write(&path, b"\0\0\0\x18ftypmp42").unwrap();
        assert!(matches!(
            open_video(&path),
            Err(FrameReadError::Unsupported { .. })
        ));
    }

    #[test]
    fn missing_path_fails_to_open() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            open_video(&dir.path().join("absent.gif")),
            Err(FrameReadError::Open { .. })
        ));
    }
}
