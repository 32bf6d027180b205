use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use crate::recognition::domain::gallery::GalleryEntry;
use crate::recognition::domain::gallery_store::{GalleryStore, GalleryStoreError};

/// In-process gallery store. Can be switched offline to exercise the
/// persistence-failure path.
#[derive(Debug)]
pub struct MemoryGalleryStore {
    entries: Mutex<Vec<GalleryEntry>>,
    available: AtomicBool,
}

impl MemoryGalleryStore {
    pub fn new(entries: Vec<GalleryEntry>) -> Self {
        Self {
            entries: Mutex::new(entries),
            available: AtomicBool::new(true),
        }
    }

    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::Release);
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Vec<GalleryEntry>> {
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }

    fn check_available(&self) -> Result<(), GalleryStoreError> {
        if self.available.load(Ordering::Acquire) {
            Ok(())
        } else {
            Err(GalleryStoreError::Unavailable("store offline".to_string()))
        }
    }
}

impl Default for MemoryGalleryStore {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl GalleryStore for MemoryGalleryStore {
    fn load_all(&self) -> Result<Vec<GalleryEntry>, GalleryStoreError> {
        self.check_available()?;
        Ok(self.lock().clone())
    }

    fn append(&self, entry: &GalleryEntry) -> Result<(), GalleryStoreError> {
        self.check_available()?;
        let mut entries = self.lock();
        entries.retain(|e| e.person_id != entry.person_id);
        entries.push(entry.clone());
        Ok(())
    }

    fn replace_all(&self, entries: &[GalleryEntry]) -> Result<(), GalleryStoreError> {
        self.check_available()?;
        *self.lock() = entries.to_vec();
        Ok(())
    }
}
