//! In-memory storage backend.
//!
//! Thread-safe implementation of [`RegistryStorage`] intended for embedded
//! usage, tests, and as a reference implementation. Relocated entries are
//! kept aside and stay inspectable.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::RwLock;

use chrono::{DateTime, Duration, Utc};

use crate::storage::traits::{RegistryStorage, StorageError, StorageId, StorageMetadata};

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Unavailable(format!("poisoned lock: {context}"))
}

#[derive(Debug, Clone)]
struct StoredBlob {
    data: Vec<u8>,
    created_at: DateTime<Utc>,
    last_modified_at: DateTime<Utc>,
}

#[derive(Debug, Default)]
struct MemoryState {
    live: HashMap<StorageId, StoredBlob>,
    relocated: HashMap<StorageId, StoredBlob>,
    /// Creation times are strictly increasing so reopen order is stable.
    last_created: DateTime<Utc>,
}

/// Registry storage held entirely in memory.
#[derive(Debug, Default)]
pub struct InMemoryStorage {
    state: RwLock<MemoryState>,
    offline: AtomicBool,
}

impl InMemoryStorage {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Simulates an outage: while offline every operation fails with `Unavailable`.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Ids of relocated (soft-deleted) entries.
    pub fn relocated_entries(&self) -> Result<Vec<StorageId>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("memory.relocated_entries"))?;
        Ok(state.relocated.keys().copied().collect())
    }

    /// Reads a relocated entry's blob.
    pub fn read_relocated(&self, id: StorageId) -> Result<Vec<u8>, StorageError> {
        let state = self.state.read().map_err(|_| lock_err("memory.read_relocated"))?;
        state
            .relocated
            .get(&id)
            .map(|b| b.data.clone())
            .ok_or(StorageError::NotFound(id))
    }

    fn ensure_online(&self) -> Result<(), StorageError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StorageError::Unavailable("in-memory storage is offline".to_string()));
        }
        Ok(())
    }
}

impl RegistryStorage for InMemoryStorage {
    fn list_entries(&self) -> Result<Vec<StorageId>, StorageError> {
        self.ensure_online()?;
        let state = self.state.read().map_err(|_| lock_err("memory.list_entries"))?;
        Ok(state.live.keys().copied().collect())
    }

    fn read_entry(&self, id: StorageId) -> Result<Vec<u8>, StorageError> {
        self.ensure_online()?;
        let state = self.state.read().map_err(|_| lock_err("memory.read_entry"))?;
        state
            .live
            .get(&id)
            .map(|b| b.data.clone())
            .ok_or(StorageError::NotFound(id))
    }

    fn write_entry(&self, id: StorageId, data: &[u8]) -> Result<(), StorageError> {
        self.ensure_online()?;
        let mut state = self.state.write().map_err(|_| lock_err("memory.write_entry"))?;
        let blob = state.live.get_mut(&id).ok_or(StorageError::NotFound(id))?;
        blob.data = data.to_vec();
        blob.last_modified_at = Utc::now();
        Ok(())
    }

    fn create_entry(&self, data: &[u8]) -> Result<StorageId, StorageError> {
        self.ensure_online()?;
        let mut state = self.state.write().map_err(|_| lock_err("memory.create_entry"))?;
        let mut id = StorageId::new();
        while state.live.contains_key(&id) || state.relocated.contains_key(&id) {
            id = StorageId::new();
        }
        let mut now = Utc::now();
        if now <= state.last_created {
            now = state.last_created + Duration::nanoseconds(1);
        }
        state.last_created = now;
        state.live.insert(
            id,
            StoredBlob {
                data: data.to_vec(),
                created_at: now,
                last_modified_at: now,
            },
        );
        Ok(id)
    }

    fn relocate_entry(&self, id: StorageId) -> Result<(), StorageError> {
        self.ensure_online()?;
        let mut state = self.state.write().map_err(|_| lock_err("memory.relocate_entry"))?;
        let blob = state.live.remove(&id).ok_or(StorageError::NotFound(id))?;
        state.relocated.insert(id, blob);
        Ok(())
    }

    fn entry_metadata(&self, id: StorageId) -> Result<StorageMetadata, StorageError> {
        self.ensure_online()?;
        let state = self.state.read().map_err(|_| lock_err("memory.entry_metadata"))?;
        state
            .live
            .get(&id)
            .map(|b| StorageMetadata {
                created_at: b.created_at,
                last_modified_at: b.last_modified_at,
            })
            .ok_or(StorageError::NotFound(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_create_read_write() {
        let store = InMemoryStorage::new();
        let id = store.create_entry(b"one").unwrap();
        assert_eq!(store.read_entry(id).unwrap(), b"one");

        let before = store.entry_metadata(id).unwrap();
        store.write_entry(id, b"two").unwrap();
        let after = store.entry_metadata(id).unwrap();
        assert_eq!(store.read_entry(id).unwrap(), b"two");
        assert_eq!(before.created_at, after.created_at);
        assert!(after.last_modified_at >= before.last_modified_at);
    }

    #[test]
    fn test_write_unknown_is_not_found() {
        let store = InMemoryStorage::new();
        let err = store.write_entry(StorageId::new(), b"x").unwrap_err();
        assert!(matches!(err, StorageError::NotFound(_)));
    }

    #[test]
    fn test_relocate_keeps_blob_aside() {
        let store = InMemoryStorage::new();
        let id = store.create_entry(b"gone").unwrap();
        store.relocate_entry(id).unwrap();

        assert!(store.list_entries().unwrap().is_empty());
        assert!(matches!(store.read_entry(id), Err(StorageError::NotFound(_))));
        assert_eq!(store.relocated_entries().unwrap(), vec![id]);
        assert_eq!(store.read_relocated(id).unwrap(), b"gone");
        assert!(matches!(store.relocate_entry(id), Err(StorageError::NotFound(_))));
    }

    #[test]
    fn test_offline_store_is_unavailable() {
        let store = InMemoryStorage::new();
        store.set_offline(true);
        assert!(matches!(store.create_entry(b"x"), Err(StorageError::Unavailable(_))));
        store.set_offline(false);
        assert!(store.create_entry(b"x").is_ok());
    }
}
