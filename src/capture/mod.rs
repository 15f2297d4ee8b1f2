//! Frame Acquisition Layer
//!
//! The scanner core never talks to a camera directly. Frames arrive through
//! the [`FrameSource`] trait, so a live video device, a frozen photo, or a
//! directory of test images all look the same to the scan loop.

pub mod frame;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

pub use frame::Frame;

/// Supplies frames to the scan loop, one per cycle.
pub trait FrameSource {
    /// Fetch the next frame.
    ///
    /// `Ok(None)` means the source is exhausted and the loop should stop.
    /// `Err` means a transient acquisition failure; the caller skips the
    /// cycle and retries on the next tick.
    fn next_frame(&mut self) -> Result<Option<Frame>>;
}

/// A source that yields a single frozen photo, then reports exhaustion.
pub struct StillImage {
    frame: Option<Frame>,
}

impl StillImage {
    /// Load a still image from disk
    pub fn open(path: &Path) -> Result<Self> {
        let image = image::open(path)
            .with_context(|| format!("Failed to load image: {}", path.display()))?;
        Ok(Self {
            frame: Some(Frame::from_image(image)),
        })
    }

    /// Wrap an already-captured frame
    pub fn from_frame(frame: Frame) -> Self {
        Self { frame: Some(frame) }
    }
}

impl FrameSource for StillImage {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        Ok(self.frame.take())
    }
}

/// A source that replays the images of a directory in filename order,
/// simulating a continuous feed for the stability tracker.
pub struct ImageSequence {
    paths: Vec<PathBuf>,
    index: usize,
}

impl ImageSequence {
    /// Build a sequence from all readable images in a directory
    pub fn from_dir(dir: &Path) -> Result<Self> {
        let mut paths: Vec<PathBuf> = std::fs::read_dir(dir)
            .with_context(|| format!("Failed to read frame directory: {}", dir.display()))?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|p| {
                matches!(
                    p.extension().and_then(|e| e.to_str()),
                    Some("png" | "jpg" | "jpeg" | "bmp" | "tiff")
                )
            })
            .collect();
        paths.sort();

        anyhow::ensure!(
            !paths.is_empty(),
            "No image files found in {}",
            dir.display()
        );

        Ok(Self { paths, index: 0 })
    }

    /// Number of frames in the sequence
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Whether the sequence contains no frames
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn next_frame(&mut self) -> Result<Option<Frame>> {
        let Some(path) = self.paths.get(self.index) else {
            return Ok(None);
        };
        self.index += 1;

        // A single unreadable file is a transient failure, not the end of
        // the sequence.
        let image = image::open(path)
            .with_context(|| format!("Failed to load frame: {}", path.display()))?;
        Ok(Some(Frame::from_image(image)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_still_image_yields_once() {
        let mut source = StillImage::from_frame(Frame::new(vec![0; 16], 2, 2));
        assert!(source.next_frame().unwrap().is_some());
        assert!(source.next_frame().unwrap().is_none());
        assert!(source.next_frame().unwrap().is_none());
    }

    #[test]
    fn test_image_sequence_missing_dir() {
        let result = ImageSequence::from_dir(Path::new("/nonexistent/frames"));
        assert!(result.is_err());
    }

    #[test]
    fn test_image_sequence_orders_by_name() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["b.png", "a.png", "c.png"] {
            let img = image::RgbaImage::new(2, 2);
            img.save(dir.path().join(name)).unwrap();
        }

        let seq = ImageSequence::from_dir(dir.path()).unwrap();
        assert_eq!(seq.len(), 3);
        let names: Vec<_> = seq
            .paths
            .iter()
            .map(|p| p.file_name().unwrap().to_str().unwrap().to_string())
            .collect();
        assert_eq!(names, vec!["a.png", "b.png", "c.png"]);
    }
}
