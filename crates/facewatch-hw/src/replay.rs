//! Still-image replay source.
//!
//! Plays a directory of images back as a finite frame stream, in file-name
//! order. Useful for offline runs against recorded footage.

use crate::camera::CameraError;
use crate::source::FrameSource;
use facewatch_core::Frame;
use std::path::{Path, PathBuf};

const FRAME_EXTENSIONS: [&str; 4] = ["jpg", "jpeg", "png", "bmp"];

/// Directory-backed [`FrameSource`].
pub struct ImageSequence {
    dir: PathBuf,
    files: Vec<PathBuf>,
    next: usize,
    open: bool,
}

impl ImageSequence {
    pub fn open(dir: &Path) -> Result<Self, CameraError> {
        let entries = std::fs::read_dir(dir)
            .map_err(|e| CameraError::DeviceNotFound(format!("{}: {e}", dir.display())))?;

        let mut files: Vec<PathBuf> = entries
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter(|path| {
                let ext = path.extension().and_then(|e| e.to_str());
                path.is_file()
                    && ext.is_some_and(|ext| {
                        FRAME_EXTENSIONS.iter().any(|f| f.eq_ignore_ascii_case(ext))
                    })
            })
            .collect();
        files.sort();

        tracing::info!(dir = %dir.display(), frames = files.len(), "opened image sequence");

        Ok(Self {
            dir: dir.to_path_buf(),
            files,
            next: 0,
            open: true,
        })
    }

    pub fn len(&self) -> usize {
        self.files.len()
    }

    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }
}

impl FrameSource for ImageSequence {
    fn is_open(&self) -> bool {
        self.open
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        if !self.open {
            return Err(CameraError::Released);
        }
        let path = self.files.get(self.next).ok_or(CameraError::EndOfStream)?;
        let image = image::open(path)
            .map_err(|e| CameraError::CaptureFailed(format!("{}: {e}", path.display())))?
            .to_rgb8();

        let frame = Frame::new(image, self.next as u64);
        self.next += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        if self.open {
            self.open = false;
            tracing::info!(
                dir = %self.dir.display(),
                frames = self.next,
                "image sequence released"
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use image::{Rgb, RgbImage};

    #[test]
    fn test_replays_in_name_order_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::from_pixel(4, 4, Rgb([2, 2, 2])).save(dir.path().join("frame_002.png")).unwrap();
        RgbImage::from_pixel(6, 6, Rgb([1, 1, 1])).save(dir.path().join("frame_001.png")).unwrap();
        std::fs::write(dir.path().join("README"), "skip me").unwrap();

        let mut source = ImageSequence::open(dir.path()).unwrap();
        assert_eq!(source.len(), 2);
        assert!(source.is_open());

        let first = source.read_frame().unwrap();
        assert_eq!((first.width(), first.sequence), (6, 0));
        let second = source.read_frame().unwrap();
        assert_eq!((second.width(), second.sequence), (4, 1));
        assert!(matches!(source.read_frame(), Err(CameraError::EndOfStream)));
    }

    #[test]
    fn test_release_stops_reads() {
        let dir = tempfile::tempdir().unwrap();
        RgbImage::new(2, 2).save(dir.path().join("a.png")).unwrap();

        let mut source = ImageSequence::open(dir.path()).unwrap();
        source.release();
        assert!(!source.is_open());
        assert!(matches!(source.read_frame(), Err(CameraError::Released)));
    }

    #[test]
    fn test_missing_directory() {
        let dir = tempfile::tempdir().unwrap();
        assert!(matches!(
            ImageSequence::open(&dir.path().join("gone")),
            Err(CameraError::DeviceNotFound(_))
        ));
    }
}
