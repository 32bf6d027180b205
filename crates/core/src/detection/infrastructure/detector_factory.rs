use std::fmt::Display;
use std::path::{Path, PathBuf};

use crate::detection::domain::face_detector::{DetectionError, FaceDetector};

use super::onnx_yolo_detector::OnnxYoloDetector;

type DetectorLoader<'a> = Box<dyn FnOnce() -> Result<Box<dyn FaceDetector>, DetectionError> + 'a>;

/// Loads the primary detector, falling back to a secondary one when the
/// primary model is unavailable. Logs which backend was selected.
///
/// Per-frame inference errors are not this function's concern; only a
/// load-time `ModelUnavailable` triggers the fallback.
pub fn load_detector(
    primary: DetectorLoader<'_>,
    fallback: Option<DetectorLoader<'_>>,
) -> Result<Box<dyn FaceDetector>, DetectionError> {
    match primary() {
        Ok(detector) => {
            log::info!("Using detector: {}", detector.name());
            Ok(detector)
        }
        Err(err @ DetectionError::ModelUnavailable { .. }) => match fallback {
            Some(load_fallback) => {
                log::warn!("Primary detector unavailable ({err}), trying fallback");
                let detector = load_fallback()?;
                log::info!("Using fallback detector: {}", detector.name());
                Ok(detector)
            }
            None => Err(err),
        },
        Err(err) => Err(err),
    }
}

/// Loader for a YOLO model file.
pub fn yolo_loader(model_path: &Path, min_confidence: f64) -> DetectorLoader<'_> {
    Box::new(move || {
        OnnxYoloDetector::new(model_path, min_confidence)
            .map(|d| Box::new(d) as Box<dyn FaceDetector>)
    })
}

/// Loader for a YOLO model that must first be located or downloaded. A
/// failed `resolve` counts as `ModelUnavailable`, so the fallback still
/// applies.
pub fn resolving_yolo_loader<'a, E: Display>(
    model: &'a str,
    resolve: impl FnOnce() -> Result<PathBuf, E> + 'a,
    min_confidence: f64,
) -> DetectorLoader<'a> {
    Box::new(move || {
        let path = resolve().map_err(|e| DetectionError::ModelUnavailable {
            model: model.to_string(),
            reason: e.to_string(),
        })?;
        OnnxYoloDetector::new(&path, min_confidence)
            .map(|d| Box::new(d) as Box<dyn FaceDetector>)
    })
}
