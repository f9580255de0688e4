//! One-file-per-entry registry storage in a local directory.

use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, ErrorKind, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use chrono::{DateTime, Duration, Utc};
use tracing::{debug, info};
use uuid::Uuid;

use super::codec::{self, EntryFrame};
use super::file_lock::{LockOwner, RegistryLock};
use crate::storage::traits::{RegistryStorage, StorageError, StorageId, StorageMetadata};

const ENTRIES_DIR: &str = "entries";
const REMOVED_DIR: &str = "removed";
const ENTRY_EXT: &str = "entry";

/// Options for [`DirectoryStorage`].
#[derive(Debug, Clone)]
pub struct DirectoryConfig {
    /// Whether to fsync entry files before they become visible.
    pub sync_on_write: bool,
}

impl Default for DirectoryConfig {
    fn default() -> Self {
        Self { sync_on_write: true }
    }
}

/// Registry storage backed by a directory:
///
/// ```text
/// <root>/.lock
/// <root>/entries/<uuid>.entry
/// <root>/removed/<uuid>.entry
/// ```
///
/// Writes go to a temporary file that is renamed over the target, so readers
/// never observe a partially written entry.
#[derive(Debug)]
pub struct DirectoryStorage {
    root: PathBuf,
    config: DirectoryConfig,
    lock: RegistryLock,
    /// Serializes writers; holds the last creation time handed out.
    writer: Mutex<DateTime<Utc>>,
}

fn io_err(context: &str, err: &std::io::Error) -> StorageError {
    StorageError::Unavailable(format!("{context}: {err}"))
}

fn lock_err(context: &'static str) -> StorageError {
    StorageError::Unavailable(format!("poisoned lock: {context}"))
}

impl DirectoryStorage {
    /// Opens (creating if needed) a registry directory with default options.
    ///
    /// # Errors
    /// `Unavailable` if the directory cannot be created or another process holds the lock.
    pub fn open(root: impl AsRef<Path>) -> Result<Self, StorageError> {
        Self::open_with(root, DirectoryConfig::default())
    }

    /// Opens a registry directory with explicit options.
    ///
    /// # Errors
    /// See [`Self::open`].
    pub fn open_with(root: impl AsRef<Path>, config: DirectoryConfig) -> Result<Self, StorageError> {
        let root = root.as_ref().to_path_buf();
        fs::create_dir_all(root.join(ENTRIES_DIR)).map_err(|e| io_err("create entries dir", &e))?;
        fs::create_dir_all(root.join(REMOVED_DIR)).map_err(|e| io_err("create removed dir", &e))?;
        let lock = RegistryLock::acquire(&root)?;
        info!(path = %root.display(), pid = lock.holder().pid, "opened registry directory");
        Ok(Self {
            root,
            config,
            lock,
            writer: Mutex::new(DateTime::<Utc>::MIN_UTC),
        })
    }

    /// Root directory.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.root
    }

    /// Owner record this process wrote into the directory lock.
    #[must_use]
    pub const fn owner(&self) -> &LockOwner {
        self.lock.holder()
    }

    /// Ids of relocated entries.
    pub fn relocated_entries(&self) -> Result<Vec<StorageId>, StorageError> {
        list_ids(&self.root.join(REMOVED_DIR))
    }

    fn entry_path(&self, id: StorageId) -> PathBuf {
        self.root.join(ENTRIES_DIR).join(format!("{id}.{ENTRY_EXT}"))
    }

    fn removed_path(&self, id: StorageId) -> PathBuf {
        self.root.join(REMOVED_DIR).join(format!("{id}.{ENTRY_EXT}"))
    }

    fn read_frame(&self, id: StorageId) -> Result<EntryFrame, StorageError> {
        let file = match File::open(self.entry_path(id)) {
            Ok(file) => file,
            Err(e) if e.kind() == ErrorKind::NotFound => return Err(StorageError::NotFound(id)),
            Err(e) => return Err(io_err("open entry", &e)),
        };
        codec::decode(&mut BufReader::new(file)).map_err(|e| match e.kind() {
            ErrorKind::InvalidData | ErrorKind::UnexpectedEof => StorageError::Corrupt {
                id,
                message: e.to_string(),
            },
            _ => io_err("read entry", &e),
        })
    }

    fn write_frame(&self, id: StorageId, frame: &EntryFrame) -> Result<(), StorageError> {
        let bytes = codec::encode(frame).map_err(|e| StorageError::Serialization(e.to_string()))?;
        let target = self.entry_path(id);
        let tmp = target.with_extension("tmp");

        let mut file = OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .open(&tmp)
            .map_err(|e| io_err("create temp entry", &e))?;
        file.write_all(&bytes).map_err(|e| io_err("write temp entry", &e))?;
        if self.config.sync_on_write {
            file.sync_all().map_err(|e| io_err("sync temp entry", &e))?;
        }
        drop(file);

        fs::rename(&tmp, &target).map_err(|e| io_err("publish entry", &e))?;
        debug!(%id, bytes = bytes.len(), "wrote registry entry");
        Ok(())
    }
}

fn list_ids(dir: &Path) -> Result<Vec<StorageId>, StorageError> {
    let mut ids = Vec::new();
    for item in fs::read_dir(dir).map_err(|e| io_err("list entries", &e))? {
        let path = item.map_err(|e| io_err("list entries", &e))?.path();
        if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXT) {
            continue;
        }
        let Some(stem) = path.file_stem().and_then(|s| s.to_str()) else {
            continue;
        };
        if let Ok(uuid) = Uuid::parse_str(stem) {
            ids.push(StorageId::from_uuid(uuid));
        }
    }
    Ok(ids)
}

fn now_millis() -> DateTime<Utc> {
    let now = Utc::now();
    // frames store millisecond precision
    DateTime::from_timestamp_millis(now.timestamp_millis()).unwrap_or(now)
}

impl RegistryStorage for DirectoryStorage {
    fn list_entries(&self) -> Result<Vec<StorageId>, StorageError> {
        list_ids(&self.root.join(ENTRIES_DIR))
    }

    fn read_entry(&self, id: StorageId) -> Result<Vec<u8>, StorageError> {
        Ok(self.read_frame(id)?.data)
    }

    fn write_entry(&self, id: StorageId, data: &[u8]) -> Result<(), StorageError> {
        let _guard = self.writer.lock().map_err(|_| lock_err("directory.write_entry"))?;
        let existing = self.read_frame(id)?;
        let frame = EntryFrame {
            created_at: existing.created_at,
            last_modified_at: now_millis(),
            data: data.to_vec(),
        };
        self.write_frame(id, &frame)
    }

    fn create_entry(&self, data: &[u8]) -> Result<StorageId, StorageError> {
        let mut last_created = self.writer.lock().map_err(|_| lock_err("directory.create_entry"))?;
        let mut id = StorageId::new();
        while self.entry_path(id).exists() || self.removed_path(id).exists() {
            id = StorageId::new();
        }
        // strictly increasing so entries reopen in creation order
        let now = now_millis().max(*last_created + Duration::milliseconds(1));
        *last_created = now;
        let frame = EntryFrame {
            created_at: now,
            last_modified_at: now,
            data: data.to_vec(),
        };
        self.write_frame(id, &frame)?;
        Ok(id)
    }

    fn relocate_entry(&self, id: StorageId) -> Result<(), StorageError> {
        let _guard = self.writer.lock().map_err(|_| lock_err("directory.relocate_entry"))?;
        let source = self.entry_path(id);
        if !source.exists() {
            return Err(StorageError::NotFound(id));
        }
        let target = self.removed_path(id);
        fs::rename(&source, &target).map_err(|e| io_err("relocate entry", &e))?;
        info!(%id, to = %target.display(), "relocated registry entry");
        Ok(())
    }

    fn entry_metadata(&self, id: StorageId) -> Result<StorageMetadata, StorageError> {
        let frame = self.read_frame(id)?;
        Ok(StorageMetadata {
            created_at: frame.created_at,
            last_modified_at: frame.last_modified_at,
        })
    }
}
