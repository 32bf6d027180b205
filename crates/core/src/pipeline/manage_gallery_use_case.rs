use std::sync::Arc;

use thiserror::Error;

use crate::recognition::domain::gallery::{Gallery, GalleryEntry, GalleryError, PersonId};
use crate::recognition::domain::gallery_store::{GalleryStore, GalleryStoreError};

#[derive(Error, Debug)]
pub enum ManageGalleryError {
    #[error(transparent)]
    Gallery(#[from] GalleryError),
    /// The change is live in memory but the store still holds the old set.
    #[error("{person_id} changed in memory but not persisted: {source}")]
    Persistence {
        person_id: PersonId,
        #[source]
        source: GalleryStoreError,
    },
}

/// Renames and removes enrolled people, rewriting the store after each
/// change. Needs no embedder.
pub struct ManageGalleryUseCase {
    gallery: Arc<Gallery>,
    store: Arc<dyn GalleryStore>,
}

impl ManageGalleryUseCase {
    pub fn new(gallery: Arc<Gallery>, store: Arc<dyn GalleryStore>) -> Self {
        Self { gallery, store }
    }

    pub fn rename(
        &self,
        person_id: PersonId,
        name: &str,
    ) -> Result<GalleryEntry, ManageGalleryError> {
        let renamed = self.gallery.rename(person_id, name)?;
        self.persist_all(person_id)?;
        log::info!("Renamed {person_id} to {name}");
        Ok(renamed)
    }

    pub fn remove(&self, person_id: PersonId) -> Result<GalleryEntry, ManageGalleryError> {
        let removed = self.gallery.remove(person_id)?;
        self.persist_all(person_id)?;
        log::info!("Removed {person_id} ({})", removed.name);
        Ok(removed)
    }

    fn persist_all(&self, person_id: PersonId) -> Result<(), ManageGalleryError> {
        let snapshot = self.gallery.snapshot();
        self.store.replace_all(snapshot.entries()).map_err(|source| {
            log::warn!("Gallery store rewrite failed after changing {person_id}: {source}");
            ManageGalleryError::Persistence { person_id, source }
        })
    }
}
