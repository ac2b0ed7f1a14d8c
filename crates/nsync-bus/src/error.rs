//! Error types for the signal bus.

use thiserror::Error;

/// Error returned by a consumer's handler.
pub type ConsumerError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Errors raised by the bus and its connections.
#[derive(Debug, Error)]
pub enum BusError {
    #[error("no response received within {0} ms")]
    NoResponse(u64),

    #[error("bus is closed")]
    Closed,

    #[error("bus is already running")]
    AlreadyRunning,

    #[error("bus has been stopped")]
    Stopped,

    #[error("bus must be started from within a tokio runtime")]
    NoRuntime,
}

/// Result type for bus operations.
pub type Result<T> = std::result::Result<T, BusError>;
