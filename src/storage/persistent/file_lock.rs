//! Single-owner lock on a registry directory.
//!
//! The owner holds an advisory lock on `<root>/.lock` and records its pid and
//! open time in that file, so a process that is locked out can say who holds
//! the registry.

use std::fmt;
use std::fs::{self, File, OpenOptions};
use std::io::{self, Write};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};

use crate::storage::traits::StorageError;

const LOCK_FILE: &str = ".lock";

/// Process recorded as holding a registry directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LockOwner {
    /// Process id of the holder.
    pub pid: u32,
    /// When the holder opened the directory.
    pub opened_at: DateTime<Utc>,
}

impl LockOwner {
    fn current() -> Self {
        Self {
            pid: std::process::id(),
            opened_at: Utc::now(),
        }
    }

    fn parse(text: &str) -> Option<Self> {
        let (pid, opened_at) = text.trim().split_once(' ')?;
        Some(Self {
            pid: pid.parse().ok()?,
            opened_at: DateTime::parse_from_rfc3339(opened_at).ok()?.with_timezone(&Utc),
        })
    }
}

impl fmt::Display for LockOwner {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.pid, self.opened_at.to_rfc3339())
    }
}

/// Exclusive ownership of a registry directory, released on drop.
#[derive(Debug)]
pub struct RegistryLock {
    _file: File,
    path: PathBuf,
    owner: LockOwner,
}

impl RegistryLock {
    /// Claims `root` for this process without blocking.
    ///
    /// # Errors
    /// `Unavailable` naming the current holder when another owner has the
    /// directory, or describing the I/O failure otherwise.
    pub fn acquire(root: &Path) -> Result<Self, StorageError> {
        let path = root.join(LOCK_FILE);
        let mut file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&path)
            .map_err(|e| StorageError::Unavailable(format!("open {}: {e}", path.display())))?;

        match try_exclusive(&file) {
            Ok(true) => {}
            Ok(false) => {
                let holder = Self::owner(root).map_or_else(|| "unknown owner".to_string(), |o| format!("pid {}", o.pid));
                return Err(StorageError::Unavailable(format!(
                    "registry directory {} is held by {holder}",
                    root.display()
                )));
            }
            Err(e) => return Err(StorageError::Unavailable(format!("lock {}: {e}", path.display()))),
        }

        let owner = LockOwner::current();
        file.set_len(0)
            .and_then(|()| writeln!(file, "{owner}"))
            .and_then(|()| file.sync_data())
            .map_err(|e| StorageError::Unavailable(format!("record lock owner: {e}")))?;

        Ok(Self {
            _file: file,
            path,
            owner,
        })
    }

    /// Last owner recorded for `root`, if the lock file names one.
    #[must_use]
    pub fn owner(root: &Path) -> Option<LockOwner> {
        LockOwner::parse(&fs::read_to_string(root.join(LOCK_FILE)).ok()?)
    }

    /// Owner record written by this process.
    #[must_use]
    pub const fn holder(&self) -> &LockOwner {
        &self.owner
    }

    /// Path of the lock file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

/// Takes an exclusive non-blocking lock. `Ok(false)` means someone else has it.
#[cfg(unix)]
fn try_exclusive(file: &File) -> io::Result<bool> {
    use std::os::unix::io::AsRawFd;

    // SAFETY: the descriptor stays owned by `file` for the duration of the call.
    if unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) } == 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    if err.raw_os_error() == Some(libc::EWOULDBLOCK) {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(windows)]
fn try_exclusive(file: &File) -> io::Result<bool> {
    use std::os::windows::io::AsRawHandle;
    use windows_sys::Win32::Foundation::{ERROR_LOCK_VIOLATION, HANDLE};
    use windows_sys::Win32::Storage::FileSystem::{LockFileEx, LOCKFILE_EXCLUSIVE_LOCK, LOCKFILE_FAIL_IMMEDIATELY};
    use windows_sys::Win32::System::IO::OVERLAPPED;

    // SAFETY: the handle belongs to `file`; OVERLAPPED is plain data.
    let locked = unsafe {
        let mut overlapped = std::mem::zeroed::<OVERLAPPED>();
        LockFileEx(
            file.as_raw_handle() as HANDLE,
            LOCKFILE_EXCLUSIVE_LOCK | LOCKFILE_FAIL_IMMEDIATELY,
            0,
            1,
            0,
            &mut overlapped,
        )
    };
    if locked != 0 {
        return Ok(true);
    }
    let err = io::Error::last_os_error();
    #[allow(clippy::cast_possible_wrap)]
    let busy = err.raw_os_error() == Some(ERROR_LOCK_VIOLATION as i32);
    if busy {
        Ok(false)
    } else {
        Err(err)
    }
}

#[cfg(not(any(unix, windows)))]
fn try_exclusive(_file: &File) -> io::Result<bool> {
    Err(io::Error::new(io::ErrorKind::Unsupported, "directory locking is not supported here"))
}
