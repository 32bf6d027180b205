use std::time::SystemTime;

use thiserror::Error;

use super::gallery::GalleryEntry;

#[derive(Error, Debug)]
pub enum GalleryStoreError {
    #[error("gallery storage I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("gallery storage is corrupt: {0}")]
    Format(String),
    #[error("gallery storage unavailable: {0}")]
    Unavailable(String),
}

/// Durable source of truth for enrolled identities.
///
/// The in-memory [`Gallery`](super::gallery::Gallery) caches what this
/// returns; nothing in the pipeline reads the store per frame.
pub trait GalleryStore: Send + Sync {
    fn load_all(&self) -> Result<Vec<GalleryEntry>, GalleryStoreError>;

    fn append(&self, entry: &GalleryEntry) -> Result<(), GalleryStoreError>;

    /// Replaces the stored set wholesale, used after rename, removal or
    /// adding embeddings to an existing person.
    fn replace_all(&self, entries: &[GalleryEntry]) -> Result<(), GalleryStoreError>;

    /// When the stored set last changed, if the store can tell. `None` means
    /// unknown, so readers must reload to see changes.
    fn modified(&self) -> Option<SystemTime> {
        None
    }
}
