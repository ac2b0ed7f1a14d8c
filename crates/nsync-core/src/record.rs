//! Index records and fixed-size data records.
//!
//! The durable index is made of two files per folder:
//!
//! - an append-only log of [`IndexRecord`] lines (`relative/path:position`),
//!   where a negative position marks a tombstone;
//! - a data file of [`RECORD_SIZE`]-byte slots, each holding one [`DataRecord`].
//!
//! ## Slot Layout
//!
//! ```text
//! offset  size  field
//! 0       16    checksum (MD5)
//! 16      8     size, i64 big-endian
//! 24      8     modified time, i64 big-endian epoch millis
//! 32      4     status ordinal, i32 big-endian
//! 36      2     slot marker
//! ```
//!
//! The marker distinguishes a written slot from a hole left in a sparse or
//! partially written data file; a zeroed slot decodes as absent.

use std::fmt;

use bytes::{Buf, BufMut};
use serde::{Deserialize, Serialize};

use crate::checksum::{Checksum, CHECKSUM_SIZE};
use crate::error::{CoreError, Result};

/// Size in bytes of one data slot.
pub const RECORD_SIZE: usize = 38;

/// Bytes of a slot holding record fields.
const PAYLOAD_SIZE: usize = CHECKSUM_SIZE + 8 + 8 + 4;

/// Trailing bytes of every written slot.
pub const SLOT_MARKER: [u8; 2] = [0x4e, 0x53];

// ─────────────────────────────────────────────────────────────────────────────
// Status
// ─────────────────────────────────────────────────────────────────────────────

/// Synchronization state of one file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SynchronizationStatus {
    Pending,
    Transferring,
    Synchronized,
}

impl SynchronizationStatus {
    /// Ordinal stored on disk.
    pub fn to_code(self) -> i32 {
        match self {
            Self::Pending => 0,
            Self::Transferring => 1,
            Self::Synchronized => 2,
        }
    }

    /// Decode an on-disk ordinal.
    pub fn from_code(code: i32) -> Result<Self> {
        match code {
            0 => Ok(Self::Pending),
            1 => Ok(Self::Transferring),
            2 => Ok(Self::Synchronized),
            other => Err(CoreError::InvalidStatus(other)),
        }
    }
}

impl fmt::Display for SynchronizationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Pending => "PENDING",
            Self::Transferring => "TRANSFERRING",
            Self::Synchronized => "SYNCHRONIZED",
        };
        f.write_str(name)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Data Record
// ─────────────────────────────────────────────────────────────────────────────

/// Metadata about one file, stored in a fixed-size slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataRecord {
    pub checksum: Checksum,
    pub size: i64,
    pub modified_ms: i64,
    pub status: SynchronizationStatus,
}

impl DataRecord {
    /// A freshly observed file awaiting transfer.
    pub fn pending(checksum: Checksum, size: i64, modified_ms: i64) -> Self {
        Self {
            checksum,
            size,
            modified_ms,
            status: SynchronizationStatus::Pending,
        }
    }

    /// Same fingerprint, different status.
    pub fn with_status(self, status: SynchronizationStatus) -> Self {
        Self { status, ..self }
    }

    /// Encode into a full slot, marker included.
    pub fn to_bytes(&self) -> [u8; RECORD_SIZE] {
        let mut out = [0u8; RECORD_SIZE];
        let mut buf = &mut out[..];
        buf.put_slice(self.checksum.as_bytes());
        buf.put_i64(self.size);
        buf.put_i64(self.modified_ms);
        buf.put_i32(self.status.to_code());
        buf.put_slice(&SLOT_MARKER);
        out
    }

    /// Decode a slot.
    ///
    /// Returns `Ok(None)` for a slot that was never written (all zero).
    pub fn from_bytes(bytes: &[u8]) -> Result<Option<Self>> {
        if bytes.len() != RECORD_SIZE {
            return Err(CoreError::MalformedRecord(format!(
                "expected {} bytes, got {}",
                RECORD_SIZE,
                bytes.len()
            )));
        }

        let marker = &bytes[PAYLOAD_SIZE..];
        if marker == [0, 0] {
            if bytes.iter().all(|b| *b == 0) {
                return Ok(None);
            }
            return Err(CoreError::MalformedRecord("slot marker missing".into()));
        }
        if marker != SLOT_MARKER {
            return Err(CoreError::MalformedRecord(format!(
                "unexpected slot marker {}",
                hex::encode(marker)
            )));
        }

        let mut buf = &bytes[..PAYLOAD_SIZE];
        let mut checksum = [0u8; CHECKSUM_SIZE];
        buf.copy_to_slice(&mut checksum);
        let size = buf.get_i64();
        let modified_ms = buf.get_i64();
        let status = SynchronizationStatus::from_code(buf.get_i32())?;

        Ok(Some(Self {
            checksum: Checksum::from_bytes(checksum),
            size,
            modified_ms,
            status,
        }))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Index Record
// ─────────────────────────────────────────────────────────────────────────────

/// One line of the index log: a path and the offset of its data slot.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IndexRecord {
    pub relative_path: String,
    pub position: u64,
    pub tombstone: bool,
}

impl IndexRecord {
    /// A live mapping from path to slot offset.
    pub fn live(relative_path: impl Into<String>, position: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            position,
            tombstone: false,
        }
    }

    /// A removal marker for a path previously mapped to `position`.
    pub fn tombstone(relative_path: impl Into<String>, position: u64) -> Self {
        Self {
            relative_path: relative_path.into(),
            position,
            tombstone: true,
        }
    }

    /// Render as a log line, trailing newline included.
    ///
    /// The sign is written explicitly so a tombstone at offset zero stays
    /// distinguishable from a live entry.
    pub fn to_line(&self) -> Result<String> {
        if self.relative_path.is_empty() || self.relative_path.contains('\n') {
            return Err(CoreError::MalformedIndexEntry {
                line: self.relative_path.clone(),
                reason: "path must be non-empty and single-line".into(),
            });
        }
        let sign = if self.tombstone { "-" } else { "" };
        Ok(format!("{}:{}{}\n", self.relative_path, sign, self.position))
    }

    /// Parse one log line, with or without its trailing newline.
    pub fn parse_line(line: &str) -> Result<Self> {
        let malformed = |reason: &str| CoreError::MalformedIndexEntry {
            line: line.to_string(),
            reason: reason.to_string(),
        };

        let trimmed = line.strip_suffix('\n').unwrap_or(line);
        let (path, position) = trimmed
            .rsplit_once(':')
            .ok_or_else(|| malformed("missing ':' separator"))?;
        if path.is_empty() {
            return Err(malformed("empty path"));
        }

        let (tombstone, digits) = match position.strip_prefix('-') {
            Some(rest) => (true, rest),
            None => (false, position),
        };
        let position = digits
            .parse::<u64>()
            .map_err(|_| malformed("position is not an integer"))?;

        Ok(Self {
            relative_path: path.to_string(),
            position,
            tombstone,
        })
    }
}
