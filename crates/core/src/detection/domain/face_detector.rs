use thiserror::Error;

use crate::shared::frame::Frame;

use super::detection::Detection;

#[derive(Error, Debug)]
pub enum DetectionError {
    /// The model or its accelerator could not be loaded. Fatal at startup
    /// unless a fallback detector is configured.
    #[error("detector model unavailable ({model}): {reason}")]
    ModelUnavailable { model: String, reason: String },
    /// A single frame failed. The frame is skipped.
    #[error("inference failed on frame {sequence}: {reason}")]
    Inference { sequence: u64, reason: String },
}

/// Domain interface for face detection.
///
/// `infer` must be deterministic for a given model and frame and must only
/// return detections at or above the detector's configured minimum
/// confidence. Implementations may hold mutable inference state, hence
/// `&mut self`.
pub trait FaceDetector: Send {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError>;

    /// Human-readable backend name for logs.
    fn name(&self) -> &str;
}
