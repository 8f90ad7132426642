//! facewatch-core: face detection, embedding and identity matching.
//!
//! Uses SCRFD for face localization and ArcFace for embeddings, both running
//! via ONNX Runtime on the CPU. Matching is a first-match-wins cosine-distance
//! comparison against an ordered registry of known identities.

pub mod alignment;
pub mod detector;
pub mod frame;
pub mod matcher;
pub mod recognizer;
pub mod registry;
pub mod types;

use std::path::PathBuf;

pub use detector::{DetectorError, DetectorSettings, FaceDetect, FaceDetector};
pub use frame::Frame;
pub use matcher::{FirstMatchMatcher, Matcher, DEFAULT_TOLERANCE};
pub use recognizer::{FaceEncode, FaceRecognizer, RecognizerError};
pub use registry::{Registry, RegistryError};
pub use types::{
    BoundingBox, Embedding, FaceObservation, KnownIdentity, MatchResult, PixelRect, UNKNOWN_LABEL,
};

/// SCRFD detection model file name inside the model directory.
pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
/// ArcFace recognition model file name inside the model directory.
pub const RECOGNIZER_MODEL_FILE: &str = "w600k_r50.onnx";

/// System-wide model directory used when none is configured.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/facewatch/models")
}
