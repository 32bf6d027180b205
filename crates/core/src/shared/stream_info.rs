use serde::{Deserialize, Serialize};

use super::constants::{DEFAULT_DEVICE, DEFAULT_FPS, DEFAULT_RESOLUTION};

/// What the caller asks a capture device for.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct CaptureSettings {
    /// Device path (`/dev/video0`) or any stream URL the backend accepts.
    pub device: String,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
}

impl Default for CaptureSettings {
    fn default() -> Self {
        Self {
            device: DEFAULT_DEVICE.to_string(),
            width: DEFAULT_RESOLUTION.0,
            height: DEFAULT_RESOLUTION.1,
            fps: DEFAULT_FPS,
        }
    }
}

/// What the device actually negotiated once opened.
#[derive(Clone, Debug, PartialEq)]
pub struct StreamInfo {
    pub width: u32,
    pub height: u32,
    pub fps: f64,
    pub codec: String,
    pub device: String,
}
