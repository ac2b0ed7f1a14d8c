//! Error types for the store module.

use nsync_core::CoreError;
use thiserror::Error;

/// Errors that can occur during store operations.
#[derive(Debug, Error)]
pub enum StoreError {
    /// Database error from SQLite.
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// Catalog value encoding/decoding error.
    #[error("serialization error: {0}")]
    Serialization(String),

    /// Invalid data in storage.
    #[error("invalid data: {0}")]
    InvalidData(String),

    /// Migration error.
    #[error("migration error: {0}")]
    Migration(String),

    /// I/O error on the index or data file.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// A record or path failed core validation.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A lock was poisoned by a panicking holder.
    #[error("lock poisoned: {0}")]
    Lock(String),

    /// A blocking task failed to complete.
    #[error("blocking task failed: {0}")]
    Task(String),
}

/// Result type for store operations.
pub type Result<T> = std::result::Result<T, StoreError>;
