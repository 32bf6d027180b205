use thiserror::Error;

use crate::detection::domain::detection::Detection;
use crate::shared::bounding_box::BoundingBox;
use crate::shared::frame::Frame;

use super::embedding::Embedding;
use super::gallery::GalleryEntry;

#[derive(Error, Debug)]
pub enum EmbeddingError {
    /// The detection's box has no area once clamped to the frame.
    #[error("degenerate face region {bbox:?} in frame {sequence}")]
    InvalidRegion { bbox: BoundingBox, sequence: u64 },
    #[error("embedding has zero length and cannot be normalized")]
    ZeroVector,
    #[error("embedding inference failed: {0}")]
    Inference(String),
    #[error("embedding model unavailable ({model}): {reason}")]
    ModelUnavailable { model: String, reason: String },
    /// Gallery vectors come from a different embedding model.
    #[error("{person} was enrolled with {found}-d embeddings but {embedder} produces {expected}-d")]
    DimensionMismatch {
        embedder: String,
        expected: usize,
        found: usize,
        person: String,
    },
}

/// Domain interface for face embedding.
///
/// Implementors only provide `embed_pixels`; cropping and bounds handling
/// are shared. Shared across recognition workers, so `&self` and `Sync`.
pub trait FaceEmbedder: Send + Sync {
    /// Embeds a tightly packed RGB crop.
    fn embed_pixels(&self, rgb: &[u8], width: u32, height: u32)
        -> Result<Embedding, EmbeddingError>;

    fn name(&self) -> &str;

    /// Length of every embedding this embedder produces.
    fn dimension(&self) -> usize;

    /// Embeds the face under `detection`, clamping its box to the frame.
    fn embed(&self, frame: &Frame, detection: &Detection) -> Result<Embedding, EmbeddingError> {
        let region = face_region(frame, detection)?;
        let pixels = frame.crop(&region);
        self.embed_pixels(&pixels, region.width as u32, region.height as u32)
    }
}

/// Fails when any gallery embedding has a different length than `embedder`
/// produces; such entries could never match.
pub fn check_compatible(
    embedder: &dyn FaceEmbedder,
    entries: &[GalleryEntry],
) -> Result<(), EmbeddingError> {
    let expected = embedder.dimension();
    let mismatch = entries.iter().find_map(|entry| {
        entry
            .embeddings
            .iter()
            .find(|e| e.dimension() != expected)
            .map(|e| (entry, e.dimension()))
    });
    match mismatch {
        Some((entry, found)) => Err(EmbeddingError::DimensionMismatch {
            embedder: embedder.name().to_string(),
            expected,
            found,
            person: format!("{} ({})", entry.person_id, entry.name),
        }),
        None => Ok(()),
    }
}

/// The detection's box clipped to the frame, or `InvalidRegion` when
/// nothing is left.
pub fn face_region(frame: &Frame, detection: &Detection) -> Result<BoundingBox, EmbeddingError> {
    let clamped = detection.bbox.clamp_to(frame.width(), frame.height());
    if clamped.is_degenerate() {
        return Err(EmbeddingError::InvalidRegion {
            bbox: detection.bbox,
            sequence: frame.sequence(),
        });
    }
    Ok(clamped)
}
