//! Raw camera buffer → RGB conversion.

use image::{ImageFormat, Rgb, RgbImage};

#[derive(Debug, thiserror::Error)]
pub enum ConvertError {
    #[error("buffer too short: expected {expected} bytes, got {actual}")]
    InvalidLength { expected: usize, actual: usize },
    #[error("MJPG decode failed: {0}")]
    Mjpeg(#[from] image::ImageError),
}

fn check_len(buf: &[u8], expected: usize) -> Result<(), ConvertError> {
    if buf.len() < expected {
        return Err(ConvertError::InvalidLength {
            expected,
            actual: buf.len(),
        });
    }
    Ok(())
}

/// BT.601 limited-range YCbCr → RGB, integer arithmetic.
fn ycbcr_to_rgb(y: u8, u: u8, v: u8) -> Rgb<u8> {
    let c = y as i32 - 16;
    let d = u as i32 - 128;
    let e = v as i32 - 128;
    let clamp = |x: i32| ((x + 128) >> 8).clamp(0, 255) as u8;
    Rgb([
        clamp(298 * c + 409 * e),
        clamp(298 * c - 100 * d - 208 * e),
        clamp(298 * c + 516 * d),
    ])
}

/// Convert packed YUYV 4:2:2 to RGB.
///
/// Each 4-byte group [Y0, U, Y1, V] encodes two horizontally adjacent pixels
/// sharing one chroma pair.
pub fn yuyv_to_rgb(buf: &[u8], width: u32, height: u32) -> Result<RgbImage, ConvertError> {
    check_len(buf, (width * height * 2) as usize)?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let pair = ((y * width + x) / 2 * 4) as usize;
        let luma = if x % 2 == 0 { buf[pair] } else { buf[pair + 2] };
        ycbcr_to_rgb(luma, buf[pair + 1], buf[pair + 3])
    }))
}

/// Convert 8-bit grayscale to RGB by replicating the channel.
pub fn grey_to_rgb(buf: &[u8], width: u32, height: u32) -> Result<RgbImage, ConvertError> {
    check_len(buf, (width * height) as usize)?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let v = buf[(y * width + x) as usize];
        Rgb([v, v, v])
    }))
}

/// Convert 16-bit little-endian grayscale to RGB, keeping the high byte.
pub fn y16_to_rgb(buf: &[u8], width: u32, height: u32) -> Result<RgbImage, ConvertError> {
    check_len(buf, (width * height * 2) as usize)?;
    Ok(RgbImage::from_fn(width, height, |x, y| {
        let v = buf[(y * width + x) as usize * 2 + 1];
        Rgb([v, v, v])
    }))
}

/// Decode one Motion-JPEG frame.
pub fn mjpeg_to_rgb(buf: &[u8]) -> Result<RgbImage, ConvertError> {
    Ok(image::load_from_memory_with_format(buf, ImageFormat::Jpeg)?.to_rgb8())
}
