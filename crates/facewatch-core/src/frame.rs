//! Captured camera frame.

use crate::types::BoundingBox;
use image::{imageops, RgbImage};
use std::time::Instant;

/// A captured RGB camera frame.
#[derive(Clone)]
pub struct Frame {
    pub image: RgbImage,
    /// Position in the capture stream, starting at 0.
    pub sequence: u64,
    pub captured_at: Instant,
}

impl Frame {
    pub fn new(image: RgbImage, sequence: u64) -> Self {
        Self {
            image,
            sequence,
            captured_at: Instant::now(),
        }
    }

    pub fn width(&self) -> u32 {
        self.image.width()
    }

    pub fn height(&self) -> u32 {
        self.image.height()
    }

    /// Copy out the region under `face`, clamped to the frame.
    ///
    /// Returns `None` if the clamped region has zero area.
    pub fn crop(&self, face: &BoundingBox) -> Option<RgbImage> {
        let rect = face.pixel_rect(self.width(), self.height())?;
        Some(imageops::crop_imm(&self.image, rect.x, rect.y, rect.width, rect.height).to_image())
    }
}

impl std::fmt::Debug for Frame {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Frame")
            .field("width", &self.width())
            .field("height", &self.height())
            .field("sequence", &self.sequence)
            .finish()
    }
}
