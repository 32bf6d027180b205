use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::SystemTime;

use serde::{Deserialize, Serialize};

use crate::recognition::domain::gallery::GalleryEntry;
use crate::recognition::domain::gallery_store::{GalleryStore, GalleryStoreError};

const FORMAT_VERSION: u32 = 1;

#[derive(Serialize, Deserialize)]
struct GalleryFile {
    version: u32,
    entries: Vec<GalleryEntry>,
}

/// Gallery persisted as a single JSON document.
///
/// Every write rewrites the whole file through a temporary sibling and a
/// rename, so a crash mid-write leaves the previous version intact. A
/// missing file is an empty gallery.
pub struct JsonGalleryStore {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonGalleryStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn read(&self) -> Result<Vec<GalleryEntry>, GalleryStoreError> {
        let json = match fs::read_to_string(&self.path) {
            Ok(json) => json,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let file: GalleryFile = serde_json::from_str(&json)
            .map_err(|e| GalleryStoreError::Format(format!("{}: {e}", self.path.display())))?;
        if file.version != FORMAT_VERSION {
            return Err(GalleryStoreError::Format(format!(
                "{}: unsupported version {}",
                self.path.display(),
                file.version
            )));
        }
        Ok(file.entries)
    }

    fn write(&self, entries: Vec<GalleryEntry>) -> Result<(), GalleryStoreError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }
        let file = GalleryFile {
            version: FORMAT_VERSION,
            entries,
        };
        let json = serde_json::to_string_pretty(&file)
            .map_err(|e| GalleryStoreError::Format(e.to_string()))?;

        let temp_path = self.path.with_extension("tmp");
        let result = fs::write(&temp_path, json).and_then(|()| fs::rename(&temp_path, &self.path));
        if result.is_err() {
            let _ = fs::remove_file(&temp_path);
        }
        Ok(result?)
    }
}

impl GalleryStore for JsonGalleryStore {
    fn load_all(&self) -> Result<Vec<GalleryEntry>, GalleryStoreError> {
        self.read()
    }

    fn append(&self, entry: &GalleryEntry) -> Result<(), GalleryStoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        let mut entries = self.read()?;
        entries.retain(|e| e.person_id != entry.person_id);
        entries.push(entry.clone());
        self.write(entries)
    }

    fn replace_all(&self, entries: &[GalleryEntry]) -> Result<(), GalleryStoreError> {
        let _guard = self.write_lock.lock().unwrap_or_else(|e| e.into_inner());
        self.write(entries.to_vec())
    }

    fn modified(&self) -> Option<SystemTime> {
        fs::metadata(&self.path).and_then(|m| m.modified()).ok()
    }
}
