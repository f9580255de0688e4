//! Binary framing for stored registry entries.
//!
//! Every entry file holds exactly one frame:
//! ```text
//! [magic: 4 bytes "RCLK"][version: 1 byte]
//! [created_at: 8 bytes LE millis][last_modified_at: 8 bytes LE millis]
//! [length: 4 bytes LE][data: N bytes][crc32: 4 bytes LE]
//! ```
//! The checksum covers the timestamps, the length and the data.

use std::io::{Error as IoError, ErrorKind, Read, Result as IoResult};

use chrono::{DateTime, Utc};
use crc32fast::Hasher;

/// Current frame version.
const FRAME_VERSION: u8 = 1;

/// Magic bytes identifying reclink entry files.
pub const MAGIC: [u8; 4] = *b"RCLK";

/// Upper bound on a single entry's payload.
const MAX_ENTRY_SIZE: usize = 16 * 1024 * 1024;

/// One decoded entry file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryFrame {
    /// Creation time.
    pub created_at: DateTime<Utc>,
    /// Last write time.
    pub last_modified_at: DateTime<Utc>,
    /// Entry payload.
    pub data: Vec<u8>,
}

fn checksum(created: &[u8], modified: &[u8], len: &[u8], data: &[u8]) -> u32 {
    let mut hasher = Hasher::new();
    hasher.update(created);
    hasher.update(modified);
    hasher.update(len);
    hasher.update(data);
    hasher.finalize()
}

/// Serializes a frame.
///
/// # Errors
/// Returns `InvalidInput` if the payload exceeds the maximum entry size.
pub fn encode(frame: &EntryFrame) -> IoResult<Vec<u8>> {
    if frame.data.len() > MAX_ENTRY_SIZE {
        return Err(IoError::new(
            ErrorKind::InvalidInput,
            format!("entry size {} exceeds maximum {MAX_ENTRY_SIZE}", frame.data.len()),
        ));
    }
    let created = frame.created_at.timestamp_millis().to_le_bytes();
    let modified = frame.last_modified_at.timestamp_millis().to_le_bytes();
    #[allow(clippy::cast_possible_truncation)]
    let len = (frame.data.len() as u32).to_le_bytes();
    let crc = checksum(&created, &modified, &len, &frame.data);

    let mut out = Vec::with_capacity(4 + 1 + 8 + 8 + 4 + frame.data.len() + 4);
    out.extend_from_slice(&MAGIC);
    out.push(FRAME_VERSION);
    out.extend_from_slice(&created);
    out.extend_from_slice(&modified);
    out.extend_from_slice(&len);
    out.extend_from_slice(&frame.data);
    out.extend_from_slice(&crc.to_le_bytes());
    Ok(out)
}

fn timestamp(bytes: [u8; 8], what: &str) -> IoResult<DateTime<Utc>> {
    let millis = i64::from_le_bytes(bytes);
    DateTime::from_timestamp_millis(millis)
        .ok_or_else(|| IoError::new(ErrorKind::InvalidData, format!("{what} timestamp out of range: {millis}")))
}

/// Deserializes a frame, verifying magic, version and checksum.
///
/// # Errors
/// Returns `InvalidData` on any integrity failure and `UnexpectedEof` on truncation.
pub fn decode(reader: &mut impl Read) -> IoResult<EntryFrame> {
    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic)?;
    if magic != MAGIC {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("invalid magic bytes: expected {MAGIC:?}, got {magic:?}"),
        ));
    }

    let mut version = [0u8; 1];
    reader.read_exact(&mut version)?;
    if version[0] != FRAME_VERSION {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("unsupported frame version: {} (expected {FRAME_VERSION})", version[0]),
        ));
    }

    let mut created = [0u8; 8];
    reader.read_exact(&mut created)?;
    let mut modified = [0u8; 8];
    reader.read_exact(&mut modified)?;

    let mut len_bytes = [0u8; 4];
    reader.read_exact(&mut len_bytes)?;
    let len = u32::from_le_bytes(len_bytes) as usize;
    if len > MAX_ENTRY_SIZE {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("entry size {len} exceeds maximum {MAX_ENTRY_SIZE}"),
        ));
    }

    let mut data = vec![0u8; len];
    reader.read_exact(&mut data)?;

    let mut crc_bytes = [0u8; 4];
    reader.read_exact(&mut crc_bytes)?;
    let stored_crc = u32::from_le_bytes(crc_bytes);
    let computed_crc = checksum(&created, &modified, &len_bytes, &data);
    if stored_crc != computed_crc {
        return Err(IoError::new(
            ErrorKind::InvalidData,
            format!("CRC mismatch: stored={stored_crc:08x}, computed={computed_crc:08x} (data corrupted)"),
        ));
    }

    Ok(EntryFrame {
        created_at: timestamp(created, "created")?,
        last_modified_at: timestamp(modified, "modified")?,
        data,
    })
}
