//! # NSync Core
//!
//! Pure primitives shared by every NSync crate: folder definitions, file
//! events, checksums, and the on-disk record formats of the durable index.
//!
//! This crate performs no I/O.
//!
//! ## Key Types
//!
//! - [`SyncFolder`] - A registered local/remote folder pair
//! - [`LocalFile`] - A change observed on a local file
//! - [`DataRecord`] - Fixed-size per-file metadata slot
//! - [`IndexRecord`] - One entry of the append-only index log

pub mod checksum;
pub mod error;
pub mod file;
pub mod folder;
pub mod record;

pub use checksum::{Checksum, CHECKSUM_SIZE};
pub use error::{CoreError, Result};
pub use file::{FolderRejection, FolderRequest, LocalFile, RemoteFile, TransferStatus};
pub use folder::{FolderDefinition, FolderId, FolderUri, SyncFolder};
pub use record::{DataRecord, IndexRecord, SynchronizationStatus, RECORD_SIZE};

/// Current wall-clock time in epoch milliseconds.
pub fn now_millis() -> i64 {
    std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.as_millis() as i64)
        .unwrap_or(0)
}
