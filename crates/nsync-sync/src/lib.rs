//! # NSync Sync
//!
//! Decides what needs synchronizing.
//!
//! ## Key Types
//!
//! - [`FolderCatalog`] - Persisted registry of sync folders
//! - [`SyncArbiter`] - State machine over the per-folder index
//! - [`ChecksumEngine`] - MD5 content fingerprints
//!
//! ## Flow
//!
//! ```text
//! FileModified ─► arbiter ─► checksum differs? ─► PENDING + TransferFile
//! FileDeleted  ─► arbiter ─► DeleteFile + tombstone
//! ChangeStatus ─► arbiter ─► status rewritten in place
//! ```

pub mod arbiter;
pub mod catalog;
pub mod checksum;
pub mod error;

pub use arbiter::SyncArbiter;
pub use catalog::FolderCatalog;
pub use checksum::{digest, ChecksumEngine, Fingerprint, DEFAULT_BUFFER_SIZE};
pub use error::{Result, SyncError};
