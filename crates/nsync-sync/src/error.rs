//! Error types for the sync module.

use std::path::PathBuf;

use thiserror::Error;

/// Errors that can occur in the catalog, the arbiter or the checksum engine.
#[derive(Debug, Error)]
pub enum SyncError {
    /// A folder with the same remote URI is already registered.
    #[error("a folder with remote URI '{0}' is already registered")]
    DuplicateFolder(String),

    /// Store operation failed.
    #[error("store error: {0}")]
    Store(#[from] nsync_store::StoreError),

    /// Invalid folder or path.
    #[error(transparent)]
    Core(#[from] nsync_core::CoreError),

    /// The bus refused a signal.
    #[error("bus error: {0}")]
    Bus(#[from] nsync_bus::BusError),

    /// Reading a local file failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The path exists but is not a regular file.
    #[error("not a regular file: {0}")]
    NotAFile(PathBuf),
}

impl SyncError {
    /// Whether the error means the file disappeared.
    pub fn is_not_found(&self) -> bool {
        matches!(self, SyncError::Io { source, .. } if source.kind() == std::io::ErrorKind::NotFound)
    }
}

/// Result type for sync operations.
pub type Result<T> = std::result::Result<T, SyncError>;
