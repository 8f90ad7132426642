//! facewatch-hw: frame acquisition.
//!
//! Provides V4L2 camera capture with RGB conversion, and a still-image
//! replay source for offline runs.

pub mod camera;
pub mod convert;
pub mod replay;
pub mod source;

pub use camera::{Camera, CameraError, DeviceInfo, PixelFormat};
pub use replay::ImageSequence;
pub use source::FrameSource;
