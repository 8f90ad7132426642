//! Face alignment via 4-DOF similarity transform.
//!
//! Maps the five detected landmarks onto the InsightFace reference positions
//! with a least-squares similarity transform and warps the face into the
//! 112×112 crop ArcFace expects.

use image::{Rgb, RgbImage};

pub const ALIGNED_SIZE: u32 = 112;

/// ArcFace reference landmarks for a 112×112 output.
pub const REFERENCE_LANDMARKS: [(f32, f32); 5] = [
    (38.2946, 51.6963), // left eye
    (73.5318, 51.5014), // right eye
    (56.0252, 71.7366), // nose
    (41.5493, 92.3655), // left mouth
    (70.7299, 92.2041), // right mouth
];

/// Similarity transform `dst = [a -b; b a] * src + [tx; ty]`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Similarity {
    pub a: f32,
    pub b: f32,
    pub tx: f32,
    pub ty: f32,
}

impl Similarity {
    pub const IDENTITY: Similarity = Similarity { a: 1.0, b: 0.0, tx: 0.0, ty: 0.0 };

    /// Least-squares fit from `src` points onto `dst` points.
    ///
    /// Each correspondence contributes two rows to the overdetermined system
    /// `A [a b tx ty]^T = B`, solved through the normal equations.
    pub fn estimate(src: &[(f32, f32); 5], dst: &[(f32, f32); 5]) -> Self {
        let mut ata = [[0.0f32; 4]; 4];
        let mut atb = [0.0f32; 4];

        for (&(sx, sy), &(dx, dy)) in src.iter().zip(dst.iter()) {
            for (row, rhs) in [([sx, -sy, 1.0, 0.0], dx), ([sy, sx, 0.0, 1.0], dy)] {
                for j in 0..4 {
                    for k in 0..4 {
                        ata[j][k] += row[j] * row[k];
                    }
                    atb[j] += row[j] * rhs;
                }
            }
        }

        match solve4(ata, atb) {
            Some([a, b, tx, ty]) => Self { a, b, tx, ty },
            None => Self::IDENTITY,
        }
    }

    /// Map an output-space point back into the source image.
    fn invert_point(&self, x: f32, y: f32) -> Option<(f32, f32)> {
        let det = self.a * self.a + self.b * self.b;
        if det < 1e-12 {
            return None;
        }
        let dx = x - self.tx;
        let dy = y - self.ty;
        Some(((self.a * dx + self.b * dy) / det, (self.a * dy - self.b * dx) / det))
    }
}

/// Gaussian elimination with partial pivoting. `None` for singular systems.
#[allow(clippy::needless_range_loop)]
fn solve4(mut m: [[f32; 4]; 4], mut rhs: [f32; 4]) -> Option<[f32; 4]> {
    for col in 0..4 {
        let pivot_row = (col..4).max_by(|&r1, &r2| {
            m[r1][col].abs().partial_cmp(&m[r2][col].abs()).unwrap_or(std::cmp::Ordering::Equal)
        })?;
        m.swap(col, pivot_row);
        rhs.swap(col, pivot_row);

        let pivot = m[col][col];
        if pivot.abs() < 1e-6 {
            return None;
        }

        for row in (col + 1)..4 {
            let factor = m[row][col] / pivot;
            for k in col..4 {
                m[row][k] -= factor * m[col][k];
            }
            rhs[row] -= factor * rhs[col];
        }
    }

    let mut x = [0.0f32; 4];
    for i in (0..4).rev() {
        let tail: f32 = ((i + 1)..4).map(|j| m[i][j] * x[j]).sum();
        x[i] = (rhs[i] - tail) / m[i][i];
    }
    Some(x)
}

/// Bilinear sample of `image` at a sub-pixel position; black outside the image.
fn sample_bilinear(image: &RgbImage, x: f32, y: f32) -> Rgb<u8> {
    let x0 = x.floor() as i64;
    let y0 = y.floor() as i64;
    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let at = |px: i64, py: i64| -> [f32; 3] {
        if px >= 0 && py >= 0 && (px as u32) < image.width() && (py as u32) < image.height() {
            let p = image.get_pixel(px as u32, py as u32);
            [p[0] as f32, p[1] as f32, p[2] as f32]
        } else {
            [0.0; 3]
        }
    };

    let (tl, tr, bl, br) = (at(x0, y0), at(x0 + 1, y0), at(x0, y0 + 1), at(x0 + 1, y0 + 1));
    let mut out = [0u8; 3];
    for c in 0..3 {
        let top = tl[c] * (1.0 - fx) + tr[c] * fx;
        let bottom = bl[c] * (1.0 - fx) + br[c] * fx;
        out[c] = (top * (1.0 - fy) + bottom * fy).round().clamp(0.0, 255.0) as u8;
    }
    Rgb(out)
}

/// Warp `image` through `transform` into a square `size`×`size` crop.
pub fn warp(image: &RgbImage, transform: &Similarity, size: u32) -> RgbImage {
    RgbImage::from_fn(size, size, |ox, oy| {
        match transform.invert_point(ox as f32, oy as f32) {
            Some((sx, sy)) => sample_bilinear(image, sx, sy),
            None => Rgb([0, 0, 0]),
        }
    })
}

/// Align a detected face to the canonical 112×112 ArcFace crop.
pub fn align_face(image: &RgbImage, landmarks: &[(f32, f32); 5]) -> RgbImage {
    let transform = Similarity::estimate(landmarks, &REFERENCE_LANDMARKS);
    warp(image, &transform, ALIGNED_SIZE)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_estimate_identity() {
        let t = Similarity::estimate(&REFERENCE_LANDMARKS, &REFERENCE_LANDMARKS);
        assert!((t.a - 1.0).abs() < 1e-3, "a = {}", t.a);
        assert!(t.b.abs() < 1e-3, "b = {}", t.b);
        assert!(t.tx.abs() < 1e-2 && t.ty.abs() < 1e-2, "t = ({}, {})", t.tx, t.ty);
    }

    #[test]
    fn test_estimate_half_scale() {
        let src = REFERENCE_LANDMARKS.map(|(x, y)| (x * 2.0 + 10.0, y * 2.0 + 4.0));
        let t = Similarity::estimate(&src, &REFERENCE_LANDMARKS);
        assert!((t.a - 0.5).abs() < 1e-3, "a = {}", t.a);
        assert!(t.b.abs() < 1e-3);
    }

    #[test]
    fn test_degenerate_landmarks_fall_back_to_identity() {
        let src = [(0.0, 0.0); 5];
        let t = Similarity::estimate(&src, &REFERENCE_LANDMARKS);
        assert_eq!(t, Similarity::IDENTITY);
    }

    #[test]
    fn test_align_face_output_size() {
        let image = RgbImage::from_pixel(320, 240, Rgb([90, 90, 90]));
        let aligned = align_face(&image, &REFERENCE_LANDMARKS);
        assert_eq!(aligned.dimensions(), (ALIGNED_SIZE, ALIGNED_SIZE));
        assert_eq!(*aligned.get_pixel(56, 56), Rgb([90, 90, 90]));
    }

    #[test]
    fn test_landmark_lands_on_reference() {
        let mut image = RgbImage::new(200, 200);
        let src: [(f32, f32); 5] =
            [(80.0, 60.0), (120.0, 60.0), (100.0, 85.0), (85.0, 110.0), (115.0, 110.0)];

        // 5x5 bright patch on the left eye survives interpolation.
        for dy in 0..5 {
            for dx in 0..5 {
                image.put_pixel(78 + dx, 58 + dy, Rgb([255, 255, 255]));
            }
        }

        let aligned = align_face(&image, &src);
        let (left_eye_x, left_eye_y) = REFERENCE_LANDMARKS[0];
        let (rx, ry) = (left_eye_x.round() as u32, left_eye_y.round() as u32);
        let brightest = (rx - 1..=rx + 1)
            .flat_map(|x| (ry - 1..=ry + 1).map(move |y| (x, y)))
            .map(|(x, y)| aligned.get_pixel(x, y)[0])
            .max()
            .unwrap_or(0);
        assert!(brightest > 100, "left eye patch missing near ({rx}, {ry}): {brightest}");
    }
}
