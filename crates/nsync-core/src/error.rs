//! Error types for the NSync core primitives.

use std::path::PathBuf;

use thiserror::Error;

/// Errors raised while building or decoding core values.
#[derive(Debug, Error)]
pub enum CoreError {
    #[error("invalid folder URI '{uri}': {reason}")]
    InvalidUri { uri: String, reason: String },

    #[error("path {path} is outside folder root {root}")]
    OutsideFolder { path: PathBuf, root: PathBuf },

    #[error("path is not valid UTF-8: {0}")]
    NonUtf8Path(PathBuf),

    #[error("invalid synchronization status code: {0}")]
    InvalidStatus(i32),

    #[error("malformed data record: {0}")]
    MalformedRecord(String),

    #[error("malformed index entry '{line}': {reason}")]
    MalformedIndexEntry { line: String, reason: String },

    #[error("invalid checksum: {0}")]
    InvalidChecksum(String),
}

/// Result type for core operations.
pub type Result<T> = std::result::Result<T, CoreError>;
