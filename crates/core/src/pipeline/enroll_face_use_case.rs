use std::sync::Arc;

use thiserror::Error;

use crate::detection::domain::detection::Detection;
use crate::detection::domain::face_detector::{DetectionError, FaceDetector};
use crate::pipeline::event_sink::EventSink;
use crate::pipeline::events::PipelineEvent;
use crate::recognition::domain::face_embedder::{check_compatible, EmbeddingError, FaceEmbedder};
use crate::recognition::domain::gallery::{Gallery, GalleryError, PersonId};
use crate::recognition::domain::gallery_store::{GalleryStore, GalleryStoreError};
use crate::shared::frame::Frame;

#[derive(Error, Debug)]
pub enum EnrollError {
    #[error("no face found in enrollment image")]
    NoFace,
    #[error(transparent)]
    Detection(#[from] DetectionError),
    #[error(transparent)]
    Embedding(#[from] EmbeddingError),
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    /// The change is live in memory under `person_id` but was not stored.
    #[error("{person_id} updated in memory but not persisted: {source}")]
    Persistence {
        person_id: PersonId,
        #[source]
        source: GalleryStoreError,
    },
}

/// Adds identities: embed → gallery swap → durable store.
///
/// The in-memory gallery is updated first and is never rolled back, so a
/// store outage only costs durability, never recognition.
pub struct EnrollFaceUseCase {
    embedder: Arc<dyn FaceEmbedder>,
    gallery: Arc<Gallery>,
    store: Arc<dyn GalleryStore>,
    detector: Option<Box<dyn FaceDetector>>,
    sink: Option<Arc<dyn EventSink>>,
}

impl EnrollFaceUseCase {
    pub fn new(
        embedder: Arc<dyn FaceEmbedder>,
        gallery: Arc<Gallery>,
        store: Arc<dyn GalleryStore>,
    ) -> Self {
        Self {
            embedder,
            gallery,
            store,
            detector: None,
            sink: None,
        }
    }

    /// Locate the face with `detector` instead of embedding the whole image.
    pub fn with_detector(mut self, detector: Box<dyn FaceDetector>) -> Self {
        self.detector = Some(detector);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn EventSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Enrolls `name` from `image` and returns the new person id.
    pub fn enroll(&mut self, name: &str, image: &Frame) -> Result<PersonId, EnrollError> {
        let detection = self.locate_face(image)?;
        let embedding = self.embedder.embed(image, &detection)?;
        self.ensure_compatible()?;
        let entry = self.gallery.append(name, embedding);
        log::info!("Enrolled {name} as {}", entry.person_id);

        if let Some(sink) = &self.sink {
            if let Err(e) = sink.push(&PipelineEvent::enrolled(entry.person_id, name)) {
                log::debug!("Enrollment event dropped: {e}");
            }
        }

        self.store
            .append(&entry)
            .map_err(|source| persistence_error(entry.person_id, source))?;
        Ok(entry.person_id)
    }

    /// Adds another reference image to an existing person.
    pub fn add_sample(&mut self, person_id: PersonId, image: &Frame) -> Result<(), EnrollError> {
        let detection = self.locate_face(image)?;
        let embedding = self.embedder.embed(image, &detection)?;
        self.ensure_compatible()?;
        let entry = self.gallery.add_embedding(person_id, embedding)?;
        self.store
            .append(&entry)
            .map_err(|source| persistence_error(person_id, source))
    }

    /// Refuses to mix vectors from another embedding model into the gallery.
    fn ensure_compatible(&self) -> Result<(), EnrollError> {
        check_compatible(self.embedder.as_ref(), self.gallery.snapshot().entries())?;
        Ok(())
    }

    /// The most confident detection, or the whole image when no detector
    /// is configured.
    fn locate_face(&mut self, image: &Frame) -> Result<Detection, EnrollError> {
        let Some(detector) = self.detector.as_mut() else {
            return Ok(Detection::new(image.bounds(), 1.0, image.sequence()));
        };
        detector
            .infer(image)?
            .into_iter()
            .max_by(|a, b| a.confidence.total_cmp(&b.confidence))
            .ok_or(EnrollError::NoFace)
    }
}

fn persistence_error(person_id: PersonId, source: GalleryStoreError) -> EnrollError {
    log::warn!("Gallery store write failed for {person_id}: {source}");
    EnrollError::Persistence { person_id, source }
}
