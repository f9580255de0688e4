//! Persistent registry storage.
//!
//! Entries are stored one framed file each, guarded by an exclusive
//! directory lock:
//! - CRC32 checksums for corruption detection
//! - temp-file-and-rename writes so a crash never leaves a torn entry
//! - soft deletes that move files aside instead of unlinking them

mod codec;
mod directory;
mod file_lock;

pub use codec::{EntryFrame, MAGIC};
pub use directory::{DirectoryConfig, DirectoryStorage};
pub use file_lock::{LockOwner, RegistryLock};
