//! In-memory note store backed by `RwLock<HashMap>`.

use std::collections::{HashMap, HashSet};
use std::sync::RwLock;

use hearth_storage::StorageError;

use super::store::{ElectronicCashNote, NoteStore};

// ---------------------------------------------------------------------------
// InMemoryNoteStore
// ---------------------------------------------------------------------------

#[derive(Default)]
struct Inner {
    /// Held notes keyed by note id.
    notes: HashMap<String, ElectronicCashNote>,
    /// Ids of every note redeemed through this store.
    redeemed: HashSet<String>,
}

/// In-memory note store for development and testing.
#[derive(Default)]
pub struct InMemoryNoteStore {
    inner: RwLock<Inner>,
}

impl InMemoryNoteStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl NoteStore for InMemoryNoteStore {
    fn insert_notes(&self, notes: &[ElectronicCashNote]) -> Result<(), StorageError> {
        let mut inner = self.inner.write()?;
        let mut batch = HashSet::with_capacity(notes.len());
        for note in notes {
            let id = note.note_id.as_str();
            if inner.notes.contains_key(id) || inner.redeemed.contains(id) || !batch.insert(id) {
                return Err(StorageError::Duplicate(note.note_id.clone()));
            }
        }
        for note in notes {
            inner.notes.insert(note.note_id.clone(), note.clone());
        }
        Ok(())
    }

    fn get_note(&self, note_id: &str) -> Result<Option<ElectronicCashNote>, StorageError> {
        Ok(self.inner.read()?.notes.get(note_id).cloned())
    }

    fn is_redeemed(&self, note_id: &str) -> Result<bool, StorageError> {
        Ok(self.inner.read()?.redeemed.contains(note_id))
    }

    fn mark_redeemed(&self, note_ids: &[&str]) -> Result<(), StorageError> {
        let mut inner = self.inner.write()?;
        for id in note_ids {
            inner.notes.remove(*id);
            inner.redeemed.insert((*id).to_owned());
        }
        Ok(())
    }

    fn list_notes(&self) -> Result<Vec<ElectronicCashNote>, StorageError> {
        Ok(self.inner.read()?.notes.values().cloned().collect())
    }

    fn purge_expired(&self, now_ms: u64) -> Result<usize, StorageError> {
        let mut inner = self.inner.write()?;
        let before = inner.notes.len();
        inner.notes.retain(|_, n| !n.is_expired(now_ms));
        Ok(before - inner.notes.len())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
