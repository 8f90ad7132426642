//! V4L2 camera capture via the `v4l` crate.

use crate::convert::{self, ConvertError};
use crate::source::FrameSource;
use facewatch_core::Frame;
use image::RgbImage;
use std::path::Path;
use thiserror::Error;
use v4l::buffer::Type as BufType;
use v4l::io::traits::CaptureStream;
use v4l::prelude::*;
use v4l::video::Capture;
use v4l::FourCC;

const STREAM_BUFFERS: u32 = 4;

#[derive(Error, Debug)]
pub enum CameraError {
    #[error("device not found: {0}")]
    DeviceNotFound(String),
    #[error("device busy")]
    DeviceBusy,
    #[error("capture failed: {0}")]
    CaptureFailed(String),
    #[error("format negotiation failed: {0}")]
    FormatNegotiationFailed(String),
    #[error("streaming not supported")]
    StreamingNotSupported,
    #[error("frame conversion failed: {0}")]
    Convert(#[from] ConvertError),
    #[error("end of stream")]
    EndOfStream,
    #[error("device released")]
    Released,
}

/// Info about a discovered V4L2 device.
#[derive(Debug, Clone)]
pub struct DeviceInfo {
    pub path: String,
    pub name: String,
    pub driver: String,
    pub bus: String,
}

/// Negotiated pixel format for the camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PixelFormat {
    /// YUYV 4:2:2 packed (2 bytes/pixel).
    Yuyv,
    /// Motion-JPEG, one JPEG per buffer.
    Mjpg,
    /// 8-bit grayscale.
    Grey,
    /// 16-bit little-endian grayscale.
    Y16,
}

impl PixelFormat {
    fn from_fourcc(fourcc: FourCC) -> Option<Self> {
        match &fourcc.repr {
            b"YUYV" => Some(Self::Yuyv),
            b"MJPG" => Some(Self::Mjpg),
            b"GREY" => Some(Self::Grey),
            b"Y16 " | b"Y16\0" => Some(Self::Y16),
            _ => None,
        }
    }

    /// Convert one raw buffer in this format to RGB.
    pub fn decode(self, buf: &[u8], width: u32, height: u32) -> Result<RgbImage, ConvertError> {
        match self {
            Self::Yuyv => convert::yuyv_to_rgb(buf, width, height),
            Self::Mjpg => convert::mjpeg_to_rgb(buf),
            Self::Grey => convert::grey_to_rgb(buf, width, height),
            Self::Y16 => convert::y16_to_rgb(buf, width, height),
        }
    }
}

/// V4L2 camera device handle.
///
/// The mmap stream is started on the first read and kept for the lifetime
/// of the capture session.
pub struct Camera {
    device: Option<Device>,
    stream: Option<MmapStream<'static>>,
    pub width: u32,
    pub height: u32,
    pub device_path: String,
    pub fourcc: FourCC,
    pixel_format: PixelFormat,
    frames_read: u64,
}

impl Camera {
    /// Open a V4L2 camera device by path (e.g., "/dev/video0") and request
    /// `width`×`height`. The driver may settle on a different size.
    pub fn open(device_path: &str, width: u32, height: u32) -> Result<Self, CameraError> {
        if !Path::new(device_path).exists() {
            return Err(CameraError::DeviceNotFound(device_path.to_string()));
        }

        let device = Device::with_path(device_path).map_err(|e| {
            if e.to_string().contains("busy") || e.to_string().contains("EBUSY") {
                CameraError::DeviceBusy
            } else {
                CameraError::DeviceNotFound(format!("{device_path}: {e}"))
            }
        })?;

        let caps = device
            .query_caps()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to query capabilities: {e}")))?;
        if !caps.capabilities.contains(v4l::capability::Flags::VIDEO_CAPTURE) {
            return Err(CameraError::StreamingNotSupported);
        }

        tracing::info!(
            device = device_path,
            driver = %caps.driver,
            card = %caps.card,
            "opened camera"
        );

        let mut fmt = device.format().map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to get format: {e}"))
        })?;
        fmt.fourcc = FourCC::new(b"YUYV");
        fmt.width = width;
        fmt.height = height;

        let negotiated = device.set_format(&fmt).map_err(|e| {
            CameraError::FormatNegotiationFailed(format!("failed to set format: {e}"))
        })?;

        let fourcc = negotiated.fourcc;
        let pixel_format = PixelFormat::from_fourcc(fourcc).ok_or_else(|| {
            CameraError::FormatNegotiationFailed(format!(
                "unsupported pixel format: {fourcc:?} (need YUYV, MJPG, GREY, or Y16)"
            ))
        })?;

        tracing::info!(
            width = negotiated.width,
            height = negotiated.height,
            fourcc = ?fourcc,
            "negotiated format"
        );

        Ok(Self {
            device: Some(device),
            stream: None,
            width: negotiated.width,
            height: negotiated.height,
            device_path: device_path.to_string(),
            fourcc,
            pixel_format,
            frames_read: 0,
        })
    }

    pub fn pixel_format(&self) -> PixelFormat {
        self.pixel_format
    }

    fn stream(&mut self) -> Result<&mut MmapStream<'static>, CameraError> {
        if self.stream.is_none() {
            let device = self.device.as_ref().ok_or(CameraError::Released)?;
            let stream = MmapStream::with_buffers(device, BufType::VideoCapture, STREAM_BUFFERS)
                .map_err(|e| {
                    CameraError::CaptureFailed(format!("failed to create mmap stream: {e}"))
                })?;
            self.stream = Some(stream);
        }
        self.stream.as_mut().ok_or(CameraError::Released)
    }

    /// List available V4L2 video capture devices.
    pub fn list_devices() -> Vec<DeviceInfo> {
        (0..16)
            .map(|i| format!("/dev/video{i}"))
            .filter(|path| Path::new(path).exists())
            .filter_map(|path| {
                let caps = Device::with_path(&path).ok()?.query_caps().ok()?;
                caps.capabilities
                    .contains(v4l::capability::Flags::VIDEO_CAPTURE)
                    .then(|| DeviceInfo {
                        path,
                        name: caps.card.clone(),
                        driver: caps.driver.clone(),
                        bus: caps.bus.clone(),
                    })
            })
            .collect()
    }
}

impl FrameSource for Camera {
    fn is_open(&self) -> bool {
        self.device.is_some()
    }

    fn read_frame(&mut self) -> Result<Frame, CameraError> {
        let (format, width, height) = (self.pixel_format, self.width, self.height);
        let stream = self.stream()?;
        let (buf, meta) = stream
            .next()
            .map_err(|e| CameraError::CaptureFailed(format!("failed to dequeue buffer: {e}")))?;
        tracing::trace!(seq = meta.sequence, bytes = buf.len(), "dequeued buffer");

        let image = format.decode(buf, width, height)?;
        let frame = Frame::new(image, self.frames_read);
        self.frames_read += 1;
        Ok(frame)
    }

    fn release(&mut self) {
        self.stream = None;
        if self.device.take().is_some() {
            tracing::info!(
                device = %self.device_path,
                frames = self.frames_read,
                "camera released"
            );
        }
    }
}
