//! ArcFace face encoder via ONNX Runtime.
//!
//! Extracts 512-dimensional, L2-normalized embeddings from landmark-aligned
//! face crops using the w600k_r50 model.

use crate::alignment::{self, ALIGNED_SIZE};
use crate::frame::Frame;
use crate::types::{BoundingBox, Embedding};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::path::Path;
use thiserror::Error;

const ARCFACE_MEAN: f32 = 127.5;
const ARCFACE_STD: f32 = 127.5; // ArcFace uses symmetric normalization, unlike SCRFD
pub const ARCFACE_EMBEDDING_DIM: usize = 512;
pub const ARCFACE_MODEL_VERSION: &str = "w600k_r50";

#[derive(Error, Debug)]
pub enum RecognizerError {
    #[error(
        "model file not found: {0}; download w600k_r50.onnx from insightface \
         and place it in the model directory"
    )]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("face has no landmarks; the detector must return landmarks for alignment")]
    NoLandmarks,
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Computes the embedding of one detected face.
///
/// Registry images and live frames must go through the same encoder so that
/// their embeddings share one feature space.
pub trait FaceEncode {
    fn embed(&mut self, frame: &Frame, face: &BoundingBox) -> Result<Embedding, RecognizerError>;
}

/// ArcFace-based face encoder.
pub struct FaceRecognizer {
    session: Session,
}

impl FaceRecognizer {
    /// Load the ArcFace ONNX model from the given path.
    pub fn load(model_path: &Path) -> Result<Self, RecognizerError> {
        if !model_path.exists() {
            return Err(RecognizerError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = %model_path.display(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded ArcFace model"
        );

        Ok(Self { session })
    }

    fn infer(&mut self, aligned: &RgbImage) -> Result<Vec<f32>, RecognizerError> {
        let input = preprocess(aligned);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, raw) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| RecognizerError::InferenceFailed(format!("embedding extraction: {e}")))?;

        if raw.len() != ARCFACE_EMBEDDING_DIM {
            return Err(RecognizerError::InferenceFailed(format!(
                "expected {ARCFACE_EMBEDDING_DIM}-dim embedding, got {}",
                raw.len()
            )));
        }
        Ok(l2_normalize(raw.to_vec()))
    }
}

impl FaceEncode for FaceRecognizer {
    fn embed(&mut self, frame: &Frame, face: &BoundingBox) -> Result<Embedding, RecognizerError> {
        let landmarks = face.landmarks.as_ref().ok_or(RecognizerError::NoLandmarks)?;
        let aligned = alignment::align_face(&frame.image, landmarks);
        let values = self.infer(&aligned)?;

        Ok(Embedding {
            values,
            model_version: Some(ARCFACE_MODEL_VERSION.to_string()),
        })
    }
}

/// Normalize an aligned 112×112 RGB crop into a NCHW float tensor.
fn preprocess(aligned: &RgbImage) -> Array4<f32> {
    let size = ALIGNED_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in aligned.enumerate_pixels() {
        if x >= ALIGNED_SIZE || y >= ALIGNED_SIZE {
            continue;
        }
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - ARCFACE_MEAN) / ARCFACE_STD;
        }
    }
    tensor
}

fn l2_normalize(values: Vec<f32>) -> Vec<f32> {
    let norm = values.iter().map(|v| v * v).sum::<f32>().sqrt();
    if norm > 0.0 {
        values.into_iter().map(|v| v / norm).collect()
    } else {
        values
    }
}
