use crate::shared::constants::DEFAULT_NMS_IOU_THRESHOLD;

use super::detection::Detection;

/// Greedy non-max suppression over one frame's detections.
///
/// Detections are visited by descending confidence (ties keep input order)
/// and a detection survives only if its IoU with every survivor so far is
/// strictly below the threshold.
#[derive(Clone, Debug)]
pub struct Deduplicator {
    iou_threshold: f64,
}

impl Deduplicator {
    pub fn new(iou_threshold: f64) -> Self {
        Self { iou_threshold }
    }

    pub fn iou_threshold(&self) -> f64 {
        self.iou_threshold
    }

    pub fn apply(&self, mut detections: Vec<Detection>) -> Vec<Detection> {
        if detections.len() <= 1 {
            return detections;
        }
        // `sort_by` is stable, so equal confidences keep their input order.
        detections.sort_by(|a, b| {
            b.confidence
                .partial_cmp(&a.confidence)
                .unwrap_or(std::cmp::Ordering::Equal)
        });

        let mut kept: Vec<Detection> = Vec::with_capacity(detections.len());
        for det in detections {
            let overlaps = kept
                .iter()
                .any(|k| k.bbox.iou(&det.bbox) >= self.iou_threshold);
            if !overlaps {
                kept.push(det);
            }
        }
        kept
    }
}

impl Default for Deduplicator {
    fn default() -> Self {
        Self::new(DEFAULT_NMS_IOU_THRESHOLD)
    }
}
