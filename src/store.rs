//! Note persistence.
//!
//! Notes live in memory as an ordered list and are mirrored, whole, to a
//! single key of a key-value store after every mutation.

use std::collections::HashMap;
use std::path::Path;
use std::sync::Mutex;

use crate::error::StoreError;
use crate::models::{Note, NoteId};

pub const NOTES_KEY: &str = "notes";

/// Minimal key-value collaborator the note store writes through to.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError>;
    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError>;
}

/// On-disk store backed by sled.
#[derive(Clone)]
pub struct SledStore {
    db: sled::Db,
}

impl SledStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, StoreError> {
        Ok(Self {
            db: sled::open(path)?,
        })
    }
}

impl KeyValueStore for SledStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.db.get(key)?.map(|v| v.to_vec()))
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        self.db.insert(key, value)?;
        self.db.flush()?;
        Ok(())
    }
}

/// In-process store, used by tests and throwaway sessions.
#[derive(Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        Ok(entries.get(key).cloned())
    }

    fn put(&self, key: &str, value: &[u8]) -> Result<(), StoreError> {
        let mut entries = self.entries.lock().unwrap_or_else(|e| e.into_inner());
        entries.insert(key.to_string(), value.to_vec());
        Ok(())
    }
}

pub struct NoteStore<K> {
    kv: K,
    notes: Vec<Note>,
}

impl<K: KeyValueStore> NoteStore<K> {
    /// Load the saved note list. A missing key is an empty list.
    pub fn open(kv: K) -> Result<Self, StoreError> {
        let notes = match kv.get(NOTES_KEY)? {
            Some(bytes) => serde_json::from_slice(&bytes)
                .map_err(|e| StoreError::Corrupt(e.to_string()))?,
            None => Vec::new(),
        };
        tracing::debug!(count = notes.len(), "loaded notes");
        Ok(Self { kv, notes })
    }

    pub fn notes(&self) -> &[Note] {
        &self.notes
    }

    pub fn get(&self, id: NoteId) -> Option<&Note> {
        self.notes.iter().find(|n| n.id == id)
    }

    pub fn position(&self, id: NoteId) -> Option<usize> {
        self.notes.iter().position(|n| n.id == id)
    }

    pub fn len(&self) -> usize {
        self.notes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notes.is_empty()
    }

    /// Replace the note with the same id in place, or append a new one.
    /// Returns the note's index.
    pub fn upsert(&mut self, note: Note) -> Result<usize, StoreError> {
        let index = match self.position(note.id) {
            Some(i) => {
                self.notes[i] = note;
                i
            }
            None => {
                self.notes.push(note);
                self.notes.len() - 1
            }
        };
        self.persist()?;
        Ok(index)
    }

    pub fn delete(&mut self, id: NoteId) -> Result<bool, StoreError> {
        let before = self.notes.len();
        self.notes.retain(|n| n.id != id);
        if self.notes.len() == before {
            return Ok(false);
        }
        self.persist()?;
        Ok(true)
    }

    fn persist(&self) -> Result<(), StoreError> {
        let bytes = serde_json::to_vec(&self.notes)?;
        self.kv.put(NOTES_KEY, &bytes)
    }

    pub fn backend(&self) -> &K {
        &self.kv
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::editor::Node;
    use crate::tags::extract_tags;

    fn note(id: NoteId, text: &str) -> Note {
        Note {
            id,
            timestamp: "1/2/2024, 3:04:05 PM".to_string(),
            content: vec![Node::text(text)],
            tags: extract_tags(text),
        }
    }

    #[test]
    fn test_open_empty() {
        let store = NoteStore::open(MemoryStore::default()).unwrap();
        assert!(store.is_empty());
    }

    #[test]
    fn test_upsert_appends_then_replaces_in_place() {
        let mut store = NoteStore::open(MemoryStore::default()).unwrap();
        assert_eq!(store.upsert(note(1, "first #a")).unwrap(), 0);
        assert_eq!(store.upsert(note(2, "second")).unwrap(), 1);

        assert_eq!(store.upsert(note(1, "first edited #b")).unwrap(), 0);
        assert_eq!(store.len(), 2);
        assert_eq!(store.notes()[0].id, 1);
        assert!(store.notes()[0].tags.contains("b"));
        assert!(!store.notes()[0].tags.contains("a"));
    }

    #[test]
    fn test_every_mutation_is_written_through() {
        let mut store = NoteStore::open(MemoryStore::default()).unwrap();
        store.upsert(note(1, "one")).unwrap();
        store.upsert(note(2, "two")).unwrap();
        store.delete(1).unwrap();

        let saved = store.backend().get(NOTES_KEY).unwrap().unwrap();
        let notes: Vec<Note> = serde_json::from_slice(&saved).unwrap();
        assert_eq!(notes, vec![note(2, "two")]);
    }

    #[test]
    fn test_delete_missing_is_noop() {
        let mut store = NoteStore::open(MemoryStore::default()).unwrap();
        store.upsert(note(1, "one")).unwrap();
        assert!(!store.delete(99).unwrap());
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_corrupt_payload() {
        let kv = MemoryStore::default();
        kv.put(NOTES_KEY, b"{not json").unwrap();
        assert!(matches!(NoteStore::open(kv), Err(StoreError::Corrupt(_))));
    }

    #[test]
    fn test_sled_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("notes_db");
        {
            let mut store = NoteStore::open(SledStore::open(&path).unwrap()).unwrap();
            store.upsert(note(7, "persisted #keep")).unwrap();
        }
        let store = NoteStore::open(SledStore::open(&path).unwrap()).unwrap();
        assert_eq!(store.len(), 1);
        assert_eq!(store.get(7).unwrap().tags, extract_tags("#keep"));
    }
}
