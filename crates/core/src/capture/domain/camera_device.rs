use thiserror::Error;

use crate::shared::frame::Frame;
use crate::shared::stream_info::{CaptureSettings, StreamInfo};

#[derive(Error, Debug)]
pub enum CaptureError {
    #[error("failed to open capture device {device}: {reason}")]
    Open { device: String, reason: String },
    /// One read failed; the next attempt may succeed.
    #[error("transient capture failure: {0}")]
    Transient(String),
    /// The source has no more frames (file input or unplugged device).
    #[error("capture stream ended")]
    EndOfStream,
}

/// A source of raw frames: a V4L2 device, a network stream, or a script.
///
/// `read` blocks on device I/O. Frames it returns carry their capture
/// instant; sequence numbers are assigned by the caller.
pub trait CameraDevice: Send {
    fn open(&mut self, settings: &CaptureSettings) -> Result<StreamInfo, CaptureError>;

    fn read(&mut self) -> Result<Frame, CaptureError>;

    /// Releases the device. Safe to call more than once.
    fn close(&mut self);
}
