use crate::camera::CameraError;
use facewatch_core::Frame;

/// An ordered, blocking supply of frames.
pub trait FrameSource {
    /// True while the device is open and frames may be read.
    fn is_open(&self) -> bool;

    /// Block until the next frame is available.
    ///
    /// Any error means the stream is over; callers do not retry.
    fn read_frame(&mut self) -> Result<Frame, CameraError>;

    /// Release the underlying device. Reads afterwards fail.
    fn release(&mut self);
}
