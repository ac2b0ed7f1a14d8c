//! # NSync Store
//!
//! Persistence for NSync: the per-folder durable index and the key-value
//! store behind the folder catalog.
//!
//! ## Key Types
//!
//! - [`Index`] - Async trait over a folder's path to record map
//! - [`FileIndex`] - Append-only log plus fixed-slot data file
//! - [`CatalogStore`] - Key-value adapter persisting folder definitions
//! - [`SqliteCatalogStore`] - SQLite-based catalog persistence
//! - [`MemoryIndex`], [`MemoryCatalogStore`] - In-memory doubles for tests
//!
//! ## Design Notes
//!
//! - **Log before visibility**: a new path's slot mapping is synced to the
//!   log before it is added to the in-memory map
//! - **Stable slots**: a record is overwritten in place and never relocated
//! - **Tombstones**: removal appends a negative-offset entry; slots are not
//!   reclaimed

pub mod error;
pub mod file;
pub mod memory;
pub mod migration;
pub mod sqlite;
pub mod traits;

pub use error::{Result, StoreError};
pub use file::{FileIndex, FileIndexProvider};
pub use memory::{MemoryCatalogStore, MemoryIndex, MemoryIndexProvider};
pub use sqlite::SqliteCatalogStore;
pub use traits::{CatalogStore, Index, IndexProvider};
