//! Known-identity registry.
//!
//! Built once at startup from a directory of face photos; the file stem of
//! each photo is the identity's display name. Read-only afterwards.

use crate::detector::{DetectorError, FaceDetect};
use crate::frame::Frame;
use crate::recognizer::{FaceEncode, RecognizerError};
use crate::types::{Embedding, KnownIdentity};
use std::path::{Path, PathBuf};
use thiserror::Error;

/// File extensions accepted as known-face photos (compared case-insensitively).
pub const ACCEPTED_EXTENSIONS: [&str; 3] = ["jpg", "jpeg", "png"];

#[derive(Error, Debug)]
pub enum RegistryError {
    #[error("cannot decode image: {0}")]
    Decode(#[from] image::ImageError),
    #[error("detector: {0}")]
    Detector(#[from] DetectorError),
    #[error("recognizer: {0}")]
    Recognizer(#[from] RecognizerError),
    #[error("embedding space mismatch: registry holds {expected} embeddings, got {actual}")]
    EmbeddingMismatch { expected: String, actual: String },
}

/// Ordered collection of known identities. Order decides match tie-breaks.
#[derive(Debug, Clone, Default)]
pub struct Registry {
    identities: Vec<KnownIdentity>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the registry from the photos in `dir`.
    ///
    /// Photos are visited in file-name order. A photo without a detectable
    /// face is skipped; when it holds several faces only the first detection
    /// is kept. A missing or unreadable directory yields an empty registry.
    pub fn build<D, E>(dir: &Path, detector: &mut D, encoder: &mut E) -> Self
    where
        D: FaceDetect,
        E: FaceEncode,
    {
        let mut registry = Self::new();

        for path in list_face_photos(dir) {
            let Some(name) = path.file_stem().map(|s| s.to_string_lossy().into_owned()) else {
                continue;
            };

            match extract_first_embedding(&path, detector, encoder) {
                Ok(Some(embedding)) => {
                    if let Err(e) = registry.push(KnownIdentity { name, embedding }) {
                        tracing::warn!(path = %path.display(), error = %e, "skipping known face");
                    }
                }
                Ok(None) => {
                    tracing::debug!(path = %path.display(), "no face found, skipping");
                }
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping known face");
                }
            }
        }

        let count = registry.len();
        tracing::info!(dir = %dir.display(), count, "loaded {} known faces", count);
        registry
    }

    /// Append an identity. Its embedding must share the registry's space.
    pub fn push(&mut self, identity: KnownIdentity) -> Result<(), RegistryError> {
        if let Some(reference) = self.reference() {
            if !reference.same_space(&identity.embedding) {
                return Err(RegistryError::EmbeddingMismatch {
                    expected: reference.space(),
                    actual: identity.embedding.space(),
                });
            }
        }
        self.identities.push(identity);
        Ok(())
    }

    pub fn identities(&self) -> &[KnownIdentity] {
        &self.identities
    }

    pub fn len(&self) -> usize {
        self.identities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.identities.is_empty()
    }

    /// Embedding dimension shared by all identities, if any are loaded.
    pub fn dimension(&self) -> Option<usize> {
        self.reference().map(Embedding::dim)
    }

    /// Embedding space of the registry, e.g. `512-dim w600k_r50`.
    pub fn space(&self) -> Option<String> {
        self.reference().map(Embedding::space)
    }

    /// True if `embedding` can be compared against this registry.
    pub fn accepts(&self, embedding: &Embedding) -> bool {
        self.reference().map_or(true, |r| r.same_space(embedding))
    }

    fn reference(&self) -> Option<&Embedding> {
        self.identities.first().map(|i| &i.embedding)
    }
}

impl FromIterator<KnownIdentity> for Registry {
    /// Collects identities, dropping any whose embedding space differs from the first.
    fn from_iter<T: IntoIterator<Item = KnownIdentity>>(iter: T) -> Self {
        let mut registry = Self::new();
        for identity in iter {
            let name = identity.name.clone();
            if let Err(e) = registry.push(identity) {
                tracing::warn!(name = %name, error = %e, "dropping known face");
            }
        }
        registry
    }
}

fn has_accepted_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|ext| ACCEPTED_EXTENSIONS.iter().any(|a| a.eq_ignore_ascii_case(ext)))
}

/// Accepted photo files in `dir`, sorted by file name.
fn list_face_photos(dir: &Path) -> Vec<PathBuf> {
    let entries = match std::fs::read_dir(dir) {
        Ok(entries) => entries,
        Err(e) => {
            tracing::warn!(dir = %dir.display(), error = %e, "known faces directory unreadable");
            return Vec::new();
        }
    };

    let mut photos: Vec<PathBuf> = entries
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| path.is_file() && has_accepted_extension(path))
        .collect();
    photos.sort_by(|a, b| a.file_name().cmp(&b.file_name()));
    photos
}

fn extract_first_embedding<D, E>(
    path: &Path,
    detector: &mut D,
    encoder: &mut E,
) -> Result<Option<Embedding>, RegistryError>
where
    D: FaceDetect,
    E: FaceEncode,
{
    let frame = Frame::new(image::open(path)?.to_rgb8(), 0);
    let faces = detector.locate(&frame)?;
    let Some(face) = faces.first() else {
        return Ok(None);
    };
    if faces.len() > 1 {
        tracing::debug!(
            path = %path.display(),
            faces = faces.len(),
            "several faces, keeping the first"
        );
    }
    Ok(Some(encoder.embed(&frame, face)?))
}
