//! JPEG snapshots of unmatched faces.

use chrono::NaiveDateTime;
use image::{ImageFormat, RgbImage};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File-name pattern; one-second resolution, later writes overwrite.
const SNAPSHOT_NAME_FORMAT: &str = "face_%Y%m%d_%H%M%S.jpg";

#[derive(Error, Debug)]
pub enum SnapshotError {
    #[error("cannot create snapshot directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },
    #[error("cannot write snapshot {path}: {source}")]
    Write {
        path: PathBuf,
        source: image::ImageError,
    },
}

/// Writes face crops into one directory.
#[derive(Debug, Clone)]
pub struct SnapshotWriter {
    dir: PathBuf,
}

impl SnapshotWriter {
    pub fn new(dir: &Path) -> Result<Self, SnapshotError> {
        std::fs::create_dir_all(dir).map_err(|source| SnapshotError::CreateDir {
            path: dir.to_path_buf(),
            source,
        })?;
        Ok(Self { dir: dir.to_path_buf() })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a snapshot taken at `at` is written to.
    pub fn path_for(&self, at: NaiveDateTime) -> PathBuf {
        self.dir.join(at.format(SNAPSHOT_NAME_FORMAT).to_string())
    }

    pub fn write(&self, crop: &RgbImage, at: NaiveDateTime) -> Result<PathBuf, SnapshotError> {
        let path = self.path_for(at);
        crop.save_with_format(&path, ImageFormat::Jpeg)
            .map_err(|source| SnapshotError::Write { path: path.clone(), source })?;
        tracing::debug!(
            path = %path.display(),
            width = crop.width(),
            height = crop.height(),
            "saved unknown face"
        );
        Ok(path)
    }
}
