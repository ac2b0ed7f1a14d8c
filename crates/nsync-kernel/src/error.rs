//! Unified error types for the NSync kernel.

use thiserror::Error;

/// Errors raised while booting or driving the daemon.
#[derive(Debug, Error)]
pub enum KernelError {
    /// Configuration file could not be read or parsed.
    #[error("configuration error: {0}")]
    Config(String),

    /// A background thread could not be started.
    #[error("startup error: {0}")]
    Startup(String),

    /// The filesystem watcher failed.
    #[error("watch error: {0}")]
    Watch(#[from] notify::Error),

    /// A folder request was refused by the catalog.
    #[error("folder rejected: {0}")]
    Rejected(String),

    /// No correlated reply arrived in time.
    #[error("no response received within {0} ms")]
    NoResponse(u64),

    /// A reply of an unexpected kind arrived.
    #[error("unexpected response: {0}")]
    UnexpectedResponse(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Core(#[from] nsync_core::CoreError),

    #[error(transparent)]
    Store(#[from] nsync_store::StoreError),

    #[error(transparent)]
    Sync(#[from] nsync_sync::SyncError),

    #[error(transparent)]
    Bus(#[from] nsync_bus::BusError),
}

/// Result type for kernel operations.
pub type Result<T> = std::result::Result<T, KernelError>;
