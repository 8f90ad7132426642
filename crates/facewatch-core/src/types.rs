use serde::{Deserialize, Serialize};

/// Label assigned to a face that matches no registry identity.
pub const UNKNOWN_LABEL: &str = "Unknown";

/// Bounding box for a detected face, with optional facial landmarks.
///
/// Coordinates are in frame pixels and may extend past the frame edges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Integer pixel rectangle, always inside the frame it was clamped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PixelRect {
    pub x: u32,
    pub y: u32,
    pub width: u32,
    pub height: u32,
}

impl BoundingBox {
    pub fn right(&self) -> f32 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f32 {
        self.y + self.height
    }

    /// Clamp the box to a `frame_width` × `frame_height` frame.
    ///
    /// Returns `None` when nothing of the box remains inside the frame.
    pub fn pixel_rect(&self, frame_width: u32, frame_height: u32) -> Option<PixelRect> {
        let finite = [self.x, self.y, self.width, self.height].iter().all(|v| v.is_finite());
        if !finite {
            return None;
        }

        let left = self.x.floor().max(0.0).min(frame_width as f32) as u32;
        let top = self.y.floor().max(0.0).min(frame_height as f32) as u32;
        let right = self.right().ceil().max(0.0).min(frame_width as f32) as u32;
        let bottom = self.bottom().ceil().max(0.0).min(frame_height as f32) as u32;

        if right <= left || bottom <= top {
            return None;
        }

        Some(PixelRect {
            x: left,
            y: top,
            width: right - left,
            height: bottom - top,
        })
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self { values, model_version: None }
    }

    pub fn dim(&self) -> usize {
        self.values.len()
    }

    /// Cosine similarity in [-1, 1]. Zero when either vector has no length.
    pub fn similarity(&self, other: &Embedding) -> f32 {
        let mut dot = 0.0f32;
        let mut norm_a = 0.0f32;
        let mut norm_b = 0.0f32;

        for (a, b) in self.values.iter().zip(other.values.iter()) {
            dot += a * b;
            norm_a += a * a;
            norm_b += b * b;
        }

        let denom = norm_a.sqrt() * norm_b.sqrt();
        if denom > 0.0 {
            (dot / denom).clamp(-1.0, 1.0)
        } else {
            0.0
        }
    }

    /// Cosine distance `1 - similarity`, in [0, 2]. Scale-invariant, so raw
    /// and L2-normalized embeddings compare the same way.
    pub fn cosine_distance(&self, other: &Embedding) -> f32 {
        1.0 - self.similarity(other)
    }

    /// Human-readable space, e.g. `512-dim w600k_r50`.
    pub fn space(&self) -> String {
        match &self.model_version {
            Some(version) => format!("{}-dim {version}", self.dim()),
            None => format!("{}-dim", self.dim()),
        }
    }

    /// True if both embeddings can be compared: same dimension, and the same
    /// model version when both carry one.
    pub fn same_space(&self, other: &Embedding) -> bool {
        if self.dim() != other.dim() {
            return false;
        }
        match (&self.model_version, &other.model_version) {
            (Some(a), Some(b)) => a == b,
            _ => true,
        }
    }
}

/// A named face loaded from the known-faces directory.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KnownIdentity {
    pub name: String,
    pub embedding: Embedding,
}

/// Result of matching a probe embedding against the registry.
#[derive(Debug, Clone, PartialEq)]
pub struct MatchResult {
    /// Identity name, or [`UNKNOWN_LABEL`].
    pub label: String,
    /// Registry index of the matched identity.
    pub index: Option<usize>,
    /// Distance to the matched identity.
    pub distance: Option<f32>,
}

impl MatchResult {
    pub fn unknown() -> Self {
        Self {
            label: UNKNOWN_LABEL.to_string(),
            index: None,
            distance: None,
        }
    }

    pub fn matched(&self) -> bool {
        self.index.is_some()
    }
}

/// One detected face in one frame, carried from detection to logging.
#[derive(Debug, Clone)]
pub struct FaceObservation {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
    pub result: MatchResult,
}

impl FaceObservation {
    pub fn label(&self) -> &str {
        &self.result.label
    }

    pub fn is_unknown(&self) -> bool {
        !self.result.matched()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_bbox(x: f32, y: f32, w: f32, h: f32) -> BoundingBox {
        BoundingBox { x, y, width: w, height: h, confidence: 0.9, landmarks: None }
    }

    #[test]
    fn test_cosine_distance() {
        let a = Embedding::new(vec![1.0, 0.0]);
        assert!(a.cosine_distance(&a).abs() < 1e-6);
        let longer = Embedding::new(vec![7.0, 0.0]);
        assert!(a.cosine_distance(&longer).abs() < 1e-6, "length is ignored");
        assert!((a.cosine_distance(&Embedding::new(vec![0.0, 2.0])) - 1.0).abs() < 1e-6);
        assert!((a.cosine_distance(&Embedding::new(vec![-1.0, 0.0])) - 2.0).abs() < 1e-6);
        assert!((a.cosine_distance(&Embedding::new(vec![0.8, 0.6])) - 0.2).abs() < 1e-6);
    }

    #[test]
    fn test_zero_vector_is_orthogonal() {
        let zero = Embedding::new(vec![0.0, 0.0]);
        assert_eq!(zero.similarity(&Embedding::new(vec![1.0, 0.0])), 0.0);
        assert_eq!(zero.cosine_distance(&zero), 1.0);
    }

    #[test]
    fn test_space_names_version() {
        let mut e = Embedding::new(vec![0.0; 4]);
        assert_eq!(e.space(), "4-dim");
        e.model_version = Some("w600k_r50".into());
        assert_eq!(e.space(), "4-dim w600k_r50");
    }

    #[test]
    fn test_same_space() {
        let mut a = Embedding::new(vec![1.0, 0.0]);
        let mut b = Embedding::new(vec![0.0, 1.0]);
        assert!(a.same_space(&b));

        a.model_version = Some("w600k_r50".into());
        assert!(a.same_space(&b), "missing version on one side is comparable");

        b.model_version = Some("other".into());
        assert!(!a.same_space(&b));

        let c = Embedding::new(vec![1.0, 0.0, 0.0]);
        assert!(!Embedding::new(vec![1.0, 0.0]).same_space(&c));
    }

    #[test]
    fn test_pixel_rect_inside() {
        let rect = make_bbox(10.2, 20.7, 30.0, 40.0).pixel_rect(640, 480).unwrap();
        assert_eq!(rect, PixelRect { x: 10, y: 20, width: 31, height: 41 });
    }

    #[test]
    fn test_pixel_rect_clamped_to_frame() {
        let rect = make_bbox(-10.0, -5.0, 30.0, 20.0).pixel_rect(100, 100).unwrap();
        assert_eq!(rect, PixelRect { x: 0, y: 0, width: 20, height: 15 });

        let rect = make_bbox(90.0, 90.0, 30.0, 30.0).pixel_rect(100, 100).unwrap();
        assert_eq!(rect, PixelRect { x: 90, y: 90, width: 10, height: 10 });
    }

    #[test]
    fn test_pixel_rect_outside_frame_is_none() {
        assert!(make_bbox(200.0, 10.0, 30.0, 30.0).pixel_rect(100, 100).is_none());
        assert!(make_bbox(-50.0, -50.0, 20.0, 20.0).pixel_rect(100, 100).is_none());
        assert!(make_bbox(10.0, 10.0, 0.0, 30.0).pixel_rect(100, 100).is_none());
        assert!(make_bbox(f32::NAN, 10.0, 10.0, 10.0).pixel_rect(100, 100).is_none());
    }

    #[test]
    fn test_unknown_result() {
        let r = MatchResult::unknown();
        assert_eq!(r.label, UNKNOWN_LABEL);
        assert!(!r.matched());
    }
}
