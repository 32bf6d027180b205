use serde::Serialize;

use crate::shared::bounding_box::BoundingBox;

/// Five facial keypoints: left eye, right eye, nose, left and right mouth
/// corner. Points with `x <= 0` were not visible to the detector.
#[derive(Clone, Copy, Debug, PartialEq, Serialize)]
pub struct Landmarks(pub [(f64, f64); 5]);

/// Landmark weights favour the nose, the steadiest anchor under head turns.
const LANDMARK_WEIGHTS: [f64; 5] = [2.0, 2.0, 3.0, 1.0, 1.0];

impl Landmarks {
    /// Weighted centroid of the visible points, if any.
    pub fn center(&self) -> Option<(f64, f64)> {
        let (mut wx, mut wy, mut total) = (0.0, 0.0, 0.0);
        for ((x, y), w) in self.0.iter().zip(LANDMARK_WEIGHTS) {
            if *x > 0.0 {
                wx += x * w;
                wy += y * w;
                total += w;
            }
        }
        (total > 0.0).then(|| (wx / total, wy / total))
    }
}

/// One candidate face in one frame. Lives only while that frame is processed.
#[derive(Clone, Debug, PartialEq, Serialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Detector confidence in `[0, 1]`.
    pub confidence: f64,
    pub landmarks: Option<Landmarks>,
    pub frame_sequence: u64,
}

impl Detection {
    pub fn new(bbox: BoundingBox, confidence: f64, frame_sequence: u64) -> Self {
        Self {
            bbox,
            confidence: confidence.clamp(0.0, 1.0),
            landmarks: None,
            frame_sequence,
        }
    }

    pub fn with_landmarks(mut self, landmarks: Landmarks) -> Self {
        self.landmarks = Some(landmarks);
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_confidence_is_clamped() {
        let det = Detection::new(BoundingBox::new(0, 0, 10, 10), 1.7, 3);
        assert_eq!(det.confidence, 1.0);
        assert_eq!(det.frame_sequence, 3);
    }

    #[test]
    fn test_landmark_center_weights_nose() {
        // cx = (100*2 + 100*2 + 200*3 + 100 + 100) / 9
        let lm = Landmarks([
            (100.0, 100.0),
            (100.0, 100.0),
            (200.0, 100.0),
            (100.0, 100.0),
            (100.0, 100.0),
        ]);
        let (cx, cy) = lm.center().unwrap();
        assert_relative_eq!(cx, 1200.0 / 9.0, epsilon = 1e-9);
        assert_relative_eq!(cy, 100.0);
    }

    #[test]
    fn test_landmark_center_ignores_invisible_points() {
        let mut pts = [(0.0, 0.0); 5];
        pts[2] = (300.0, 400.0);
        assert_eq!(Landmarks(pts).center(), Some((300.0, 400.0)));
    }

    #[test]
    fn test_landmark_center_none_when_nothing_visible() {
        assert_eq!(Landmarks([(0.0, 0.0); 5]).center(), None);
    }
}
