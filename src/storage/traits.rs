//! Abstract registry storage.
//!
//! The registry persists each alias entry as an opaque blob under a
//! backend-assigned [`StorageId`]. Backends decide where blobs live; the
//! registry only relies on the contract below:
//! - `create_entry` assigns a fresh id and records creation time
//! - `write_entry` overwrites an existing blob and bumps its modification time
//! - `relocate_entry` removes the blob from the live set without destroying it

use std::fmt;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// Backend-assigned identifier of a stored entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageId(Uuid);

impl StorageId {
    /// Creates a new random id.
    #[must_use]
    pub fn new() -> Self {
        Self(Uuid::new_v4())
    }

    /// Wraps an existing UUID.
    #[must_use]
    pub const fn from_uuid(uuid: Uuid) -> Self {
        Self(uuid)
    }

    /// The underlying UUID.
    #[must_use]
    pub const fn as_uuid(&self) -> &Uuid {
        &self.0
    }
}

impl Default for StorageId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for StorageId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<Uuid> for StorageId {
    fn from(uuid: Uuid) -> Self {
        Self(uuid)
    }
}

/// Timestamps the backend keeps for every entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StorageMetadata {
    /// When the entry was created.
    pub created_at: DateTime<Utc>,
    /// When the entry was last written.
    pub last_modified_at: DateTime<Utc>,
}

/// Errors that can occur during storage operations.
#[derive(Debug, Error)]
pub enum StorageError {
    /// No live entry has this id.
    #[error("Stored entry not found: {0}")]
    NotFound(StorageId),

    /// The backend could not be reached or refused the operation.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),

    /// A stored blob failed integrity checks.
    #[error("Stored entry {id} is corrupt: {message}")]
    Corrupt {
        /// Entry that failed the check.
        id: StorageId,
        /// What the check found.
        message: String,
    },

    /// Serialization failed.
    #[error("Serialization error: {0}")]
    Serialization(String),
}

/// Blob storage for alias registry entries.
///
/// # Safety Considerations
/// - Implementations must be safe for concurrent use
/// - `create_entry` and `write_entry` must not expose partially written blobs
pub trait RegistryStorage: Send + Sync {
    /// Ids of all live entries, in no particular order.
    fn list_entries(&self) -> Result<Vec<StorageId>, StorageError>;

    /// Reads a live entry's blob.
    fn read_entry(&self, id: StorageId) -> Result<Vec<u8>, StorageError>;

    /// Overwrites a live entry. Returns `NotFound` if the id is not live.
    fn write_entry(&self, id: StorageId, data: &[u8]) -> Result<(), StorageError>;

    /// Stores a new entry and returns its id.
    fn create_entry(&self, data: &[u8]) -> Result<StorageId, StorageError>;

    /// Moves an entry out of the live set (soft delete).
    fn relocate_entry(&self, id: StorageId) -> Result<(), StorageError>;

    /// Creation and modification times of a live entry.
    fn entry_metadata(&self, id: StorageId) -> Result<StorageMetadata, StorageError>;
}

impl<S: RegistryStorage + ?Sized> RegistryStorage for Arc<S> {
    fn list_entries(&self) -> Result<Vec<StorageId>, StorageError> {
        (**self).list_entries()
    }

    fn read_entry(&self, id: StorageId) -> Result<Vec<u8>, StorageError> {
        (**self).read_entry(id)
    }

    fn write_entry(&self, id: StorageId, data: &[u8]) -> Result<(), StorageError> {
        (**self).write_entry(id, data)
    }

    fn create_entry(&self, data: &[u8]) -> Result<StorageId, StorageError> {
        (**self).create_entry(data)
    }

    fn relocate_entry(&self, id: StorageId) -> Result<(), StorageError> {
        (**self).relocate_entry(id)
    }

    fn entry_metadata(&self, id: StorageId) -> Result<StorageMetadata, StorageError> {
        (**self).entry_metadata(id)
    }
}
