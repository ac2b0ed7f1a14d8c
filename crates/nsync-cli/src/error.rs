//! Errors seen by CLI commands talking to a running daemon.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClientError {
    /// The daemon could not be reached or answered garbage.
    #[error("request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// The daemon answered with an error status.
    #[error("{message} (HTTP {status})")]
    Api { status: u16, message: String },
}

pub type Result<T> = std::result::Result<T, ClientError>;
