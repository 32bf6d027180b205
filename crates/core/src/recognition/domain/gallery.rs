use std::fmt;
use std::sync::{Arc, PoisonError, RwLock};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::embedding::Embedding;
use super::gallery_store::{GalleryStore, GalleryStoreError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct PersonId(pub u64);

impl fmt::Display for PersonId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "person-{}", self.0)
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GalleryEntry {
    pub person_id: PersonId,
    pub name: String,
    pub embeddings: Vec<Embedding>,
    pub created_at: SystemTime,
}

#[derive(Error, Debug, PartialEq)]
pub enum GalleryError {
    #[error("no enrolled person with id {0}")]
    UnknownPerson(PersonId),
}

/// An immutable view of the gallery at one point in time.
#[derive(Debug)]
pub struct GallerySnapshot {
    entries: Vec<GalleryEntry>,
    version: u64,
    next_id: u64,
}

impl GallerySnapshot {
    fn initial(entries: Vec<GalleryEntry>, version: u64, floor: u64) -> Self {
        let next_id = entries
            .iter()
            .map(|e| e.person_id.0 + 1)
            .max()
            .unwrap_or(1)
            .max(floor);
        Self {
            entries,
            version,
            next_id,
        }
    }

    pub fn entries(&self) -> &[GalleryEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Increases by one on every swap.
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, person_id: PersonId) -> Option<&GalleryEntry> {
        self.entries.iter().find(|e| e.person_id == person_id)
    }
}

impl Default for GallerySnapshot {
    fn default() -> Self {
        Self::initial(Vec::new(), 0, 1)
    }
}

type Guard<'a> = std::sync::RwLockWriteGuard<'a, Arc<GallerySnapshot>>;

/// Read-mostly cache of known identities.
///
/// Readers take an `Arc` to the current snapshot and keep using it for as
/// long as they like. Every mutation builds a fresh snapshot under the write
/// lock and swaps it in, so a reader never sees a half-applied change.
/// Person ids are never handed out twice, even after removal.
#[derive(Debug, Default)]
pub struct Gallery {
    current: RwLock<Arc<GallerySnapshot>>,
}

impl Gallery {
    pub fn new(entries: Vec<GalleryEntry>) -> Self {
        Self {
            current: RwLock::new(Arc::new(GallerySnapshot::initial(entries, 0, 1))),
        }
    }

    pub fn from_store(store: &dyn GalleryStore) -> Result<Self, GalleryStoreError> {
        let entries = store.load_all()?;
        log::info!("Loaded {} enrolled identities", entries.len());
        Ok(Self::new(entries))
    }

    pub fn snapshot(&self) -> Arc<GallerySnapshot> {
        // The guarded value is a single Arc, always whole even after a panic.
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    /// Creates a new person with the next free id.
    pub fn append(&self, name: &str, embedding: Embedding) -> GalleryEntry {
        let mut guard = self.write();
        let mut entries = guard.entries.clone();
        let entry = GalleryEntry {
            person_id: PersonId(guard.next_id),
            name: name.to_string(),
            embeddings: vec![embedding],
            created_at: SystemTime::now(),
        };
        entries.push(entry.clone());
        let next_id = guard.next_id + 1;
        commit(&mut guard, entries, next_id);
        entry
    }

    pub fn add_embedding(
        &self,
        person_id: PersonId,
        embedding: Embedding,
    ) -> Result<GalleryEntry, GalleryError> {
        self.update(|entries| {
            let entry = find_mut(entries, person_id)?;
            entry.embeddings.push(embedding);
            Ok(entry.clone())
        })
    }

    pub fn rename(&self, person_id: PersonId, name: &str) -> Result<GalleryEntry, GalleryError> {
        self.update(|entries| {
            let entry = find_mut(entries, person_id)?;
            entry.name = name.to_string();
            Ok(entry.clone())
        })
    }

    pub fn remove(&self, person_id: PersonId) -> Result<GalleryEntry, GalleryError> {
        self.update(|entries| {
            let idx = entries
                .iter()
                .position(|e| e.person_id == person_id)
                .ok_or(GalleryError::UnknownPerson(person_id))?;
            Ok(entries.remove(idx))
        })
    }

    /// Swaps in `entries` wholesale. Ids keep increasing past both the old
    /// and the new set.
    pub fn replace(&self, entries: Vec<GalleryEntry>) -> usize {
        let count = entries.len();
        let mut guard = self.write();
        let snapshot = GallerySnapshot::initial(entries, guard.version + 1, guard.next_id);
        *guard = Arc::new(snapshot);
        count
    }

    fn write(&self) -> Guard<'_> {
        self.current.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn update<T>(
        &self,
        f: impl FnOnce(&mut Vec<GalleryEntry>) -> Result<T, GalleryError>,
    ) -> Result<T, GalleryError> {
        let mut guard = self.write();
        let mut entries = guard.entries.clone();
        let out = f(&mut entries)?;
        let next_id = guard.next_id;
        commit(&mut guard, entries, next_id);
        Ok(out)
    }
}

fn commit(guard: &mut Guard<'_>, entries: Vec<GalleryEntry>, next_id: u64) {
    let version = guard.version + 1;
    **guard = Arc::new(GallerySnapshot {
        entries,
        version,
        next_id,
    });
}

fn find_mut(
    entries: &mut [GalleryEntry],
    person_id: PersonId,
) -> Result<&mut GalleryEntry, GalleryError> {
    entries
        .iter_mut()
        .find(|e| e.person_id == person_id)
        .ok_or(GalleryError::UnknownPerson(person_id))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::recognition::infrastructure::memory_gallery_store::MemoryGalleryStore;

    fn emb(values: &[f32]) -> Embedding {
        Embedding::from_raw(values.to_vec()).unwrap()
    }

    #[test]
    fn test_append_assigns_increasing_ids() {
        let gallery = Gallery::default();
        let a = gallery.append("alice", emb(&[1.0, 0.0]));
        let b = gallery.append("bob", emb(&[0.0, 1.0]));
        assert_eq!(a.person_id, PersonId(1));
        assert_eq!(b.person_id, PersonId(2));
        assert_eq!(gallery.snapshot().len(), 2);
    }

    #[test]
    fn test_ids_continue_after_loaded_entries() {
        let gallery = Gallery::default();
        gallery.append("alice", emb(&[1.0, 0.0]));
        let loaded = gallery.snapshot().entries().to_vec();
        let reopened = Gallery::new(loaded);
        assert_eq!(reopened.append("bob", emb(&[0.0, 1.0])).person_id, PersonId(2));
    }

    #[test]
    fn test_old_snapshot_unchanged_after_swap() {
        let gallery = Gallery::default();
        let before = gallery.snapshot();
        gallery.append("alice", emb(&[1.0, 0.0]));
        assert!(before.is_empty());
        assert_eq!(gallery.snapshot().len(), 1);
        assert!(gallery.snapshot().version() > before.version());
    }

    #[test]
    fn test_add_embedding_and_rename() {
        let gallery = Gallery::default();
        let id = gallery.append("alice", emb(&[1.0, 0.0])).person_id;
        gallery.add_embedding(id, emb(&[0.7, 0.7])).unwrap();
        gallery.rename(id, "Alice B.").unwrap();

        let snap = gallery.snapshot();
        let entry = snap.get(id).unwrap();
        assert_eq!(entry.embeddings.len(), 2);
        assert_eq!(entry.name, "Alice B.");
    }

    #[test]
    fn test_unknown_person_is_error() {
        let gallery = Gallery::default();
        let missing = PersonId(42);
        assert_eq!(
            gallery.rename(missing, "x").unwrap_err(),
            GalleryError::UnknownPerson(missing)
        );
        assert!(gallery.add_embedding(missing, emb(&[1.0])).is_err());
        assert!(gallery.remove(missing).is_err());
    }

    #[test]
    fn test_failed_update_does_not_bump_version() {
        let gallery = Gallery::default();
        let version = gallery.snapshot().version();
        let _ = gallery.remove(PersonId(1));
        assert_eq!(gallery.snapshot().version(), version);
    }

    #[test]
    fn test_removed_id_is_not_reused() {
        let gallery = Gallery::default();
        let id = gallery.append("alice", emb(&[1.0, 0.0])).person_id;
        gallery.remove(id).unwrap();
        assert_eq!(gallery.append("bob", emb(&[0.0, 1.0])).person_id, PersonId(2));
    }

    #[test]
    fn test_remove() {
        let gallery = Gallery::default();
        let id = gallery.append("alice", emb(&[1.0, 0.0])).person_id;
        let removed = gallery.remove(id).unwrap();
        assert_eq!(removed.name, "alice");
        assert!(gallery.snapshot().is_empty());
    }

    #[test]
    fn test_replace_swaps_in_store_contents() {
        let store = MemoryGalleryStore::default();
        let gallery = Gallery::from_store(&store).unwrap();
        gallery.append("alice", emb(&[1.0, 0.0]));
        gallery.append("bob", emb(&[0.0, 1.0]));
        let before = gallery.snapshot().version();

        let entry = Gallery::default().append("carol", emb(&[0.0, 1.0]));
        store.append(&entry).unwrap();
        assert_eq!(gallery.replace(store.load_all().unwrap()), 1);

        let snap = gallery.snapshot();
        assert_eq!(snap.entries()[0].name, "carol");
        assert!(snap.version() > before);
        // Ids 1 and 2 were handed out before the swap.
        assert_eq!(gallery.append("dave", emb(&[1.0, 1.0])).person_id, PersonId(3));
    }

    #[test]
    fn test_concurrent_readers_see_whole_snapshots() {
        let gallery = Arc::new(Gallery::default());
        let writer = {
            let gallery = Arc::clone(&gallery);
            std::thread::spawn(move || {
                for i in 0..50 {
                    gallery.append(&format!("p{i}"), emb(&[1.0, i as f32]));
                }
            })
        };
        for _ in 0..200 {
            let snap = gallery.snapshot();
            // Ids in a snapshot are always the dense prefix 1..=len.
            for (i, entry) in snap.entries().iter().enumerate() {
                assert_eq!(entry.person_id, PersonId(i as u64 + 1));
            }
        }
        writer.join().unwrap();
        assert_eq!(gallery.snapshot().len(), 50);
    }
}
