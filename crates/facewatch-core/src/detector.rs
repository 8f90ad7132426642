//! SCRFD face detector via ONNX Runtime.
//!
//! Letterboxes the RGB frame into the 640×640 model input, decodes the three
//! anchor-free stride heads (boxes + five landmarks), then applies NMS.

use crate::frame::Frame;
use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::RgbImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use std::cmp::Ordering;
use std::path::Path;
use thiserror::Error;

const SCRFD_INPUT_SIZE: u32 = 640;
const SCRFD_MEAN: f32 = 127.5;
const SCRFD_STD: f32 = 128.0;
const SCRFD_STRIDES: [u32; 3] = [8, 16, 32];
const SCRFD_ANCHORS_PER_CELL: usize = 2;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error(
        "model file not found: {0}; download det_10g.onnx from insightface \
         and place it in the model directory"
    )]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Locates faces in a frame.
pub trait FaceDetect {
    /// Return face regions in frame-pixel coordinates, possibly empty.
    fn locate(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectorError>;
}

/// Tunables for [`FaceDetector`].
#[derive(Debug, Clone, Copy)]
pub struct DetectorSettings {
    /// Minimum anchor score to keep a candidate box.
    pub confidence_threshold: f32,
    /// IoU above which the lower-scoring of two boxes is dropped.
    pub nms_threshold: f32,
    pub intra_threads: usize,
}

impl Default for DetectorSettings {
    fn default() -> Self {
        Self {
            confidence_threshold: 0.5,
            nms_threshold: 0.4,
            intra_threads: 2,
        }
    }
}

/// Placement of the scaled frame inside the square model input.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Letterbox {
    scale: f32,
    scaled_width: u32,
    scaled_height: u32,
    offset_x: u32,
    offset_y: u32,
}

impl Letterbox {
    fn fit(width: u32, height: u32, target: u32) -> Self {
        let scale = (target as f32 / width.max(1) as f32).min(target as f32 / height.max(1) as f32);
        let scaled_width = ((width as f32 * scale).round() as u32).clamp(1, target);
        let scaled_height = ((height as f32 * scale).round() as u32).clamp(1, target);
        Self {
            scale,
            scaled_width,
            scaled_height,
            offset_x: (target - scaled_width) / 2,
            offset_y: (target - scaled_height) / 2,
        }
    }

    /// Map a point in model-input space back to frame space.
    fn to_frame(&self, x: f32, y: f32) -> (f32, f32) {
        (
            (x - self.offset_x as f32) / self.scale,
            (y - self.offset_y as f32) / self.scale,
        )
    }
}

/// Score, box and landmark tensor positions for one stride.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct StrideHeads {
    score: usize,
    bbox: usize,
    kps: usize,
}

/// Raw tensors for one stride.
struct StrideOutput<'a> {
    stride: u32,
    scores: &'a [f32],
    bboxes: &'a [f32],
    kps: &'a [f32],
}

/// SCRFD-based face detector.
pub struct FaceDetector {
    session: Session,
    settings: DetectorSettings,
    heads: [StrideHeads; 3],
}

impl FaceDetector {
    /// Load the SCRFD ONNX model from the given path.
    pub fn load(model_path: &Path, settings: DetectorSettings) -> Result<Self, DetectorError> {
        if !model_path.exists() {
            return Err(DetectorError::ModelNotFound(model_path.display().to_string()));
        }

        let session = Session::builder()?
            .with_intra_threads(settings.intra_threads)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 9 {
            return Err(DetectorError::InferenceFailed(format!(
                "SCRFD model requires 9 outputs (3 strides × score/bbox/kps), got {}",
                output_names.len()
            )));
        }

        let heads = map_stride_heads(&output_names);
        tracing::info!(
            path = %model_path.display(),
            outputs = ?output_names,
            ?heads,
            confidence = settings.confidence_threshold,
            "loaded SCRFD model"
        );

        Ok(Self { session, settings, heads })
    }

    fn detect(&mut self, image: &RgbImage) -> Result<Vec<BoundingBox>, DetectorError> {
        let (input, letterbox) = preprocess(image);
        let outputs = self.session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let mut candidates = Vec::new();
        for (heads, &stride) in self.heads.iter().zip(SCRFD_STRIDES.iter()) {
            let extract = |idx: usize, what: &str| {
                outputs[idx]
                    .try_extract_tensor::<f32>()
                    .map(|(_, data)| data)
                    .map_err(|e| {
                        DetectorError::InferenceFailed(format!("{what} stride {stride}: {e}"))
                    })
            };
            let output = StrideOutput {
                stride,
                scores: extract(heads.score, "scores")?,
                bboxes: extract(heads.bbox, "bboxes")?,
                kps: extract(heads.kps, "kps")?,
            };
            let threshold = self.settings.confidence_threshold;
            candidates.extend(decode_stride(&output, &letterbox, threshold));
        }

        Ok(nms(candidates, self.settings.nms_threshold))
    }
}

impl FaceDetect for FaceDetector {
    fn locate(&mut self, frame: &Frame) -> Result<Vec<BoundingBox>, DetectorError> {
        let faces = self.detect(&frame.image)?;
        tracing::trace!(sequence = frame.sequence, faces = faces.len(), "SCRFD detection");
        Ok(faces)
    }
}

/// Letterbox an RGB image into a normalized NCHW tensor.
///
/// Padding is left at zero, which is the normalized value of `SCRFD_MEAN`.
fn preprocess(image: &RgbImage) -> (Array4<f32>, Letterbox) {
    let size = SCRFD_INPUT_SIZE as usize;
    let letterbox = Letterbox::fit(image.width(), image.height(), SCRFD_INPUT_SIZE);
    let resized = imageops::resize(
        image,
        letterbox.scaled_width,
        letterbox.scaled_height,
        FilterType::Triangle,
    );

    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        let tx = (x + letterbox.offset_x) as usize;
        let ty = (y + letterbox.offset_y) as usize;
        for c in 0..3 {
            tensor[[0, c, ty, tx]] = (pixel[c] as f32 - SCRFD_MEAN) / SCRFD_STD;
        }
    }

    (tensor, letterbox)
}

/// Find the score/bbox/kps tensors for each stride.
///
/// Exports that name tensors `score_8`, `bbox_16`, `kps_32` ... are mapped by
/// name; anything else gets the standard positional layout
/// [scores 8/16/32, bboxes 8/16/32, kps 8/16/32].
fn map_stride_heads(names: &[String]) -> [StrideHeads; 3] {
    let position = |prefix: &str, stride: u32| {
        let target = format!("{prefix}_{stride}");
        names.iter().position(|n| *n == target)
    };

    let named: Option<Vec<StrideHeads>> = SCRFD_STRIDES
        .iter()
        .map(|&stride| {
            Some(StrideHeads {
                score: position("score", stride)?,
                bbox: position("bbox", stride)?,
                kps: position("kps", stride)?,
            })
        })
        .collect();

    match named {
        Some(heads) if heads.len() == 3 => [heads[0], heads[1], heads[2]],
        _ => {
            tracing::debug!(?names, "SCRFD output names not recognized, using positional mapping");
            std::array::from_fn(|i| StrideHeads { score: i, bbox: i + 3, kps: i + 6 })
        }
    }
}

/// Decode the candidate boxes of one stride into frame coordinates.
fn decode_stride(
    output: &StrideOutput<'_>,
    letterbox: &Letterbox,
    threshold: f32,
) -> Vec<BoundingBox> {
    let stride = output.stride as f32;
    let grid_w = (SCRFD_INPUT_SIZE / output.stride) as usize;
    let grid_h = grid_w;
    let anchors = grid_w * grid_h * SCRFD_ANCHORS_PER_CELL;

    let mut faces = Vec::new();
    for idx in 0..anchors.min(output.scores.len()) {
        let score = output.scores[idx];
        if score <= threshold {
            continue;
        }
        let Some(distances) = output.bboxes.get(idx * 4..idx * 4 + 4) else {
            continue;
        };

        let cell = idx / SCRFD_ANCHORS_PER_CELL;
        let anchor_x = (cell % grid_w) as f32 * stride;
        let anchor_y = (cell / grid_w) as f32 * stride;

        let offset = |dx: f32, dy: f32| {
            letterbox.to_frame(anchor_x + dx * stride, anchor_y + dy * stride)
        };
        let (x1, y1) = offset(-distances[0], -distances[1]);
        let (x2, y2) = offset(distances[2], distances[3]);

        let landmarks = output
            .kps
            .get(idx * 10..idx * 10 + 10)
            .map(|kps| std::array::from_fn(|i| offset(kps[i * 2], kps[i * 2 + 1])));

        faces.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }

    faces
}

fn by_confidence_desc(a: &BoundingBox, b: &BoundingBox) -> Ordering {
    b.confidence.partial_cmp(&a.confidence).unwrap_or(Ordering::Equal)
}

/// Greedy non-maximum suppression; the result is sorted by confidence.
fn nms(mut candidates: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    candidates.sort_by(by_confidence_desc);

    let mut keep: Vec<BoundingBox> = Vec::new();
    for candidate in candidates {
        if keep.iter().all(|kept| iou(kept, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection-over-Union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let inter_w = (a.right().min(b.right()) - a.x.max(b.x)).max(0.0);
    let inter_h = (a.bottom().min(b.bottom()) - a.y.max(b.y)).max(0.0);
    let inter = inter_w * inter_h;
    let union = a.width * a.height + b.width * b.height - inter;
    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bbox(x: f32, y: f32, w: f32, h: f32, conf: f32) -> BoundingBox {
        BoundingBox { x, y, width: w, height: h, confidence: conf, landmarks: None }
    }

    #[test]
    fn test_iou() {
        let a = make_bbox(0.0, 0.0, 10.0, 10.0, 1.0);
        assert!((iou(&a, &a) - 1.0).abs() < 1e-6);

        let apart = make_bbox(20.0, 20.0, 10.0, 10.0, 1.0);
        assert_eq!(iou(&a, &apart), 0.0);

        // Overlap 5x10 = 50, union 150.
        let half = make_bbox(5.0, 0.0, 10.0, 10.0, 1.0);
        assert!((iou(&a, &half) - 50.0 / 150.0).abs() < 1e-6);
    }

    #[test]
    fn test_nms_keeps_best_of_overlapping() {
        let result = nms(
            vec![
                make_bbox(5.0, 5.0, 100.0, 100.0, 0.8),
                make_bbox(200.0, 200.0, 50.0, 50.0, 0.7),
                make_bbox(0.0, 0.0, 100.0, 100.0, 0.9),
            ],
            0.4,
        );
        let confidences: Vec<f32> = result.iter().map(|b| b.confidence).collect();
        assert_eq!(confidences, vec![0.9, 0.7]);
    }

    #[test]
    fn test_nms_empty() {
        assert!(nms(Vec::new(), 0.4).is_empty());
    }

    #[test]
    fn test_letterbox_landscape() {
        let lb = Letterbox::fit(640, 480, 640);
        assert_eq!((lb.scaled_width, lb.scaled_height), (640, 480));
        assert_eq!((lb.offset_x, lb.offset_y), (0, 80));

        let (x, y) = lb.to_frame(100.0, 80.0 + 50.0);
        assert!((x - 100.0).abs() < 1e-4 && (y - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_letterbox_upscales_small_frames() {
        let lb = Letterbox::fit(320, 240, 640);
        assert!((lb.scale - 2.0).abs() < 1e-6);
        let (x, y) = lb.to_frame(200.0, 80.0 + 100.0);
        assert!((x - 100.0).abs() < 1e-4 && (y - 50.0).abs() < 1e-4);
    }

    #[test]
    fn test_preprocess_pads_with_zero() {
        let image = RgbImage::from_pixel(640, 320, image::Rgb([255, 255, 255]));
        let (tensor, lb) = preprocess(&image);
        assert_eq!(tensor.shape(), &[1, 3, 640, 640]);
        assert_eq!(lb.offset_y, 160);
        assert_eq!(tensor[[0, 0, 0, 0]], 0.0);
        let expected = (255.0 - SCRFD_MEAN) / SCRFD_STD;
        assert!((tensor[[0, 2, 320, 320]] - expected).abs() < 1e-6);
    }

    #[test]
    fn test_map_stride_heads_named_and_shuffled() {
        let names: Vec<String> = [
            "bbox_8", "kps_8", "score_8",
            "bbox_16", "kps_16", "score_16",
            "bbox_32", "kps_32", "score_32",
        ]
        .iter()
        .map(|s| s.to_string())
        .collect();

        let heads = map_stride_heads(&names);
        assert_eq!(heads[0], StrideHeads { score: 2, bbox: 0, kps: 1 });
        assert_eq!(heads[2], StrideHeads { score: 8, bbox: 6, kps: 7 });
    }

    #[test]
    fn test_map_stride_heads_positional_fallback() {
        let names: Vec<String> = (0..9).map(|i: usize| (440 + i).to_string()).collect();
        let heads = map_stride_heads(&names);
        assert_eq!(heads[1], StrideHeads { score: 1, bbox: 4, kps: 7 });
    }

    #[test]
    fn test_decode_stride_single_anchor() {
        // Stride 32 grid is 20x20 cells with two anchors each.
        let anchors = 20 * 20 * SCRFD_ANCHORS_PER_CELL;
        let mut scores = vec![0.0f32; anchors];
        let mut bboxes = vec![0.0f32; anchors * 4];
        let kps = vec![0.0f32; anchors * 10];

        // Anchor in cell (x=2, y=1) => centre (64, 32), box ±1 stride.
        let idx = (20 + 2) * SCRFD_ANCHORS_PER_CELL;
        scores[idx] = 0.9;
        bboxes[idx * 4..idx * 4 + 4].copy_from_slice(&[1.0, 1.0, 1.0, 1.0]);

        let output = StrideOutput { stride: 32, scores: &scores, bboxes: &bboxes, kps: &kps };
        let lb = Letterbox::fit(640, 640, 640);
        let faces = decode_stride(&output, &lb, 0.5);

        assert_eq!(faces.len(), 1);
        let face = &faces[0];
        assert!((face.x - 32.0).abs() < 1e-4 && (face.y - 0.0).abs() < 1e-4);
        assert!((face.width - 64.0).abs() < 1e-4 && (face.height - 64.0).abs() < 1e-4);
        let landmarks = face.landmarks.unwrap();
        assert_eq!(landmarks[0], (64.0, 32.0));
    }
}
