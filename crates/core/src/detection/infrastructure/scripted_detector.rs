use std::collections::HashMap;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

#[derive(Clone, Debug)]
enum Scripted {
    Faces(Vec<(BoundingBox, f64)>),
    Fail(String),
}

/// Replays pre-scripted detections keyed by frame sequence number.
///
/// Stands in for a model in simulations and tests. Frames without a script
/// entry get the default faces (none, unless set with `always`).
#[derive(Clone, Debug, Default)]
pub struct ScriptedDetector {
    script: HashMap<u64, Scripted>,
    default: Vec<(BoundingBox, f64)>,
    min_confidence: f64,
}

impl ScriptedDetector {
    pub fn new() -> Self {
        Self::default()
    }

    /// Faces returned for every frame without its own entry.
    pub fn always(faces: Vec<(BoundingBox, f64)>) -> Self {
        Self {
            default: faces,
            ..Self::default()
        }
    }

    pub fn on_frame(mut self, sequence: u64, faces: Vec<(BoundingBox, f64)>) -> Self {
        self.script.insert(sequence, Scripted::Faces(faces));
        self
    }

    pub fn fail_on(mut self, sequence: u64, reason: impl Into<String>) -> Self {
        self.script.insert(sequence, Scripted::Fail(reason.into()));
        self
    }

    pub fn with_min_confidence(mut self, min_confidence: f64) -> Self {
        self.min_confidence = min_confidence;
        self
    }
}

impl FaceDetector for ScriptedDetector {
    fn infer(&mut self, frame: &Frame) -> Result<Vec<Detection>, DetectionError> {
        let faces = match self.script.get(&frame.sequence()) {
            Some(Scripted::Fail(reason)) => {
                return Err(DetectionError::Inference {
                    sequence: frame.sequence(),
                    reason: reason.clone(),
                })
            }
            Some(Scripted::Faces(faces)) => faces,
            None => &self.default,
        };
        Ok(faces
            .iter()
            .filter(|(_, conf)| *conf >= self.min_confidence)
            .map(|(bbox, conf)| Detection::new(*bbox, *conf, frame.sequence()))
            .collect())
    }

    fn name(&self) -> &str {
        "scripted"
    }
}
