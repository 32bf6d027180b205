use std::sync::Arc;
use std::time::{Duration, Instant, SystemTime};

use thiserror::Error;

use crate::recognition::domain::face_embedder::{check_compatible, EmbeddingError, FaceEmbedder};
use crate::recognition::domain::gallery::Gallery;
use crate::recognition::domain::gallery_store::{GalleryStore, GalleryStoreError};

#[derive(Error, Debug)]
pub enum RefreshError {
    #[error(transparent)]
    Store(#[from] GalleryStoreError),
    #[error(transparent)]
    Incompatible(#[from] EmbeddingError),
}

/// Keeps a running watcher's gallery in step with the store, so people
/// enrolled, renamed or removed by another process take effect without a
/// restart.
///
/// Polled from the supervising loop. A failed or incompatible reload is
/// logged and the current snapshot stays in place.
pub struct RefreshGalleryUseCase {
    gallery: Arc<Gallery>,
    store: Arc<dyn GalleryStore>,
    embedder: Arc<dyn FaceEmbedder>,
    interval: Duration,
    last_check: Option<Instant>,
    seen: Option<SystemTime>,
}

impl RefreshGalleryUseCase {
    /// Assumes `gallery` was just loaded from `store`.
    pub fn new(
        gallery: Arc<Gallery>,
        store: Arc<dyn GalleryStore>,
        embedder: Arc<dyn FaceEmbedder>,
        interval: Duration,
    ) -> Self {
        let seen = store.modified();
        Self {
            gallery,
            store,
            embedder,
            interval,
            last_check: None,
            seen,
        }
    }

    /// Reloads when `interval` has passed since the last check and the store
    /// reports a change (or cannot tell). Returns the new entry count.
    pub fn poll(&mut self, now: Instant) -> Option<usize> {
        let due = match self.last_check {
            Some(last) => now.saturating_duration_since(last) >= self.interval,
            None => true,
        };
        if !due {
            return None;
        }
        self.last_check = Some(now);

        let modified = self.store.modified();
        if modified.is_some() && modified == self.seen {
            return None;
        }
        match self.refresh() {
            Ok(count) => {
                self.seen = modified;
                log::info!("Gallery reloaded: {count} enrolled identities");
                Some(count)
            }
            Err(e) => {
                log::warn!("Gallery reload skipped: {e}");
                None
            }
        }
    }

    /// Reloads unconditionally, leaving the gallery untouched on error.
    pub fn refresh(&self) -> Result<usize, RefreshError> {
        let entries = self.store.load_all()?;
        check_compatible(self.embedder.as_ref(), &entries)?;
        Ok(self.gallery.replace(entries))
    }
}
