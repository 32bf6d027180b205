use std::sync::Arc;

use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::detection::domain::non_max_suppression::Deduplicator;
use crate::pipeline::pipeline_stats::PipelineStats;
use crate::recognition::domain::face_embedder::{EmbeddingError, FaceEmbedder};
use crate::recognition::domain::gallery::Gallery;
use crate::recognition::domain::matcher::Matcher;
use crate::shared::frame::Frame;
use crate::tracking::domain::tracker::{FrameObservations, Observation};

/// Per-frame recognition: detect → deduplicate → embed → match.
///
/// Each detection is embedded and matched on its own; one bad detection
/// is dropped and counted without affecting the rest of the frame.
pub struct RecognizeFrameUseCase {
    detector: Box<dyn FaceDetector>,
    deduplicator: Deduplicator,
    embedder: Arc<dyn FaceEmbedder>,
    matcher: Matcher,
    gallery: Arc<Gallery>,
}

impl RecognizeFrameUseCase {
    pub fn new(
        detector: Box<dyn FaceDetector>,
        deduplicator: Deduplicator,
        embedder: Arc<dyn FaceEmbedder>,
        matcher: Matcher,
        gallery: Arc<Gallery>,
    ) -> Self {
        Self {
            detector,
            deduplicator,
            embedder,
            matcher,
            gallery,
        }
    }

    /// Recognizes every face in `frame`. A detector failure fails the whole
    /// frame; the caller logs it and moves on to the next frame.
    pub fn execute(
        &mut self,
        frame: &Frame,
        stats: &PipelineStats,
    ) -> Result<FrameObservations, DetectionError> {
        let detections = self.deduplicator.apply(self.detector.infer(frame)?);
        // One snapshot per frame so all faces match against the same gallery.
        let gallery = self.gallery.snapshot();

        let observations = detections
            .iter()
            .filter_map(|detection| match self.embedder.embed(frame, detection) {
                Ok(embedding) => Some(Observation {
                    bbox: detection.bbox,
                    confidence: detection.confidence,
                    outcome: self.matcher.identify(&embedding, &gallery),
                }),
                Err(e @ EmbeddingError::InvalidRegion { .. }) => {
                    stats.invalid_region();
                    log::debug!("Dropping detection: {e}");
                    None
                }
                Err(e) => {
                    stats.embedding_failed();
                    log::warn!("Embedding failed on frame {}: {e}", frame.sequence());
                    None
                }
            })
            .collect();

        Ok(FrameObservations {
            sequence: frame.sequence(),
            captured_at: frame.captured_at(),
            observations,
        })
    }

    pub fn detector_name(&self) -> &str {
        self.detector.name()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::infrastructure::synthetic_camera::painted_frame;
    use crate::detection::infrastructure::scripted_detector::ScriptedDetector;
    use crate::recognition::domain::matcher::MatchOutcome;
    use crate::recognition::infrastructure::histogram_embedder::HistogramEmbedder;
    use crate::shared::bounding_box::BoundingBox;

    const RED: [u8; 3] = [220, 30, 30];
    const BLUE: [u8; 3] = [30, 30, 220];

    fn use_case(detector: ScriptedDetector, gallery: Arc<Gallery>) -> RecognizeFrameUseCase {
        RecognizeFrameUseCase::new(
            Box::new(detector),
            Deduplicator::default(),
            Arc::new(HistogramEmbedder::new()),
            Matcher::default(),
            gallery,
        )
    }

    fn enroll_colour(gallery: &Gallery, name: &str, colour: [u8; 3]) {
        let face = painted_frame(20, 20, &[(BoundingBox::new(0, 0, 20, 20), colour)]);
        let embedding = HistogramEmbedder::new()
            .embed_pixels(face.data(), 20, 20)
            .unwrap();
        gallery.append(name, embedding);
    }

    #[test]
    fn test_overlapping_detections_are_deduplicated() {
        let a = BoundingBox::new(10, 10, 40, 40);
        let b = BoundingBox::new(12, 12, 40, 40);
        let detector = ScriptedDetector::always(vec![(a, 0.8), (b, 0.9)]);
        let frame = painted_frame(100, 100, &[(a, RED)]).with_sequence(1);

        let result = use_case(detector, Arc::new(Gallery::default()))
            .execute(&frame, &PipelineStats::new())
            .unwrap();

        assert_eq!(result.observations.len(), 1);
        assert_eq!(result.observations[0].bbox, b);
        assert_eq!(result.observations[0].outcome, MatchOutcome::Unknown);
        assert_eq!(result.sequence, 1);
    }

    #[test]
    fn test_matches_enrolled_colour() {
        let gallery = Arc::new(Gallery::default());
        enroll_colour(&gallery, "Red", RED);
        enroll_colour(&gallery, "Blue", BLUE);

        let red_box = BoundingBox::new(5, 5, 30, 30);
        let blue_box = BoundingBox::new(60, 60, 30, 30);
        let frame = painted_frame(100, 100, &[(red_box, RED), (blue_box, BLUE)]);
        let detector = ScriptedDetector::always(vec![(red_box, 0.9), (blue_box, 0.8)]);

        let result = use_case(detector, Arc::clone(&gallery))
            .execute(&frame, &PipelineStats::new())
            .unwrap();

        let snapshot = gallery.snapshot();
        let names: Vec<&str> = result
            .observations
            .iter()
            .map(|o| match o.outcome {
                MatchOutcome::Known { person_id, .. } => {
                    snapshot.get(person_id).unwrap().name.as_str()
                }
                MatchOutcome::Unknown => "?",
            })
            .collect();
        assert_eq!(names, vec!["Red", "Blue"]);
    }

    #[test]
    fn test_degenerate_detection_is_dropped_and_counted() {
        let good = BoundingBox::new(5, 5, 20, 20);
        let outside = BoundingBox::new(500, 500, 20, 20);
        let detector = ScriptedDetector::always(vec![(good, 0.9), (outside, 0.95)]);
        let frame = painted_frame(64, 64, &[(good, RED)]);
        let stats = PipelineStats::new();

        let result = use_case(detector, Arc::new(Gallery::default()))
            .execute(&frame, &stats)
            .unwrap();

        assert_eq!(result.observations.len(), 1);
        assert_eq!(result.observations[0].bbox, good);
        assert_eq!(stats.snapshot().invalid_regions, 1);
    }

    #[test]
    fn test_detector_failure_propagates() {
        let detector = ScriptedDetector::new().fail_on(3, "accelerator reset");
        let frame = painted_frame(16, 16, &[]).with_sequence(3);
        let result = use_case(detector, Arc::new(Gallery::default()))
            .execute(&frame, &PipelineStats::new());
        assert!(matches!(result, Err(DetectionError::Inference { .. })));
    }

    #[test]
    fn test_no_faces_yields_empty_observations() {
        let frame = painted_frame(16, 16, &[]).with_sequence(2);
        let result = use_case(ScriptedDetector::new(), Arc::new(Gallery::default()))
            .execute(&frame, &PipelineStats::new())
            .unwrap();
        assert!(result.observations.is_empty());
        assert_eq!(result.sequence, 2);
    }
}
