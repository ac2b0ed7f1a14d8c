//! Transient payloads carried by bus signals.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::folder::{FolderId, SyncFolder};
use crate::record::SynchronizationStatus;

/// A change observed on a local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LocalFile {
    pub folder_id: FolderId,
    pub path: PathBuf,
    pub deleted: bool,
}

impl LocalFile {
    /// A file that was created, modified, or found by a scan.
    pub fn changed(folder_id: FolderId, path: impl Into<PathBuf>) -> Self {
        Self {
            folder_id,
            path: path.into(),
            deleted: false,
        }
    }

    /// A file that no longer exists.
    pub fn deleted(folder_id: FolderId, path: impl Into<PathBuf>) -> Self {
        Self {
            folder_id,
            path: path.into(),
            deleted: true,
        }
    }
}

/// A request for a storage driver to act on one local file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RemoteFile {
    pub path: PathBuf,
    pub folder: SyncFolder,
}

impl RemoteFile {
    pub fn new(path: impl Into<PathBuf>, folder: SyncFolder) -> Self {
        Self {
            path: path.into(),
            folder,
        }
    }

    pub fn local_path(&self) -> &Path {
        &self.path
    }
}

/// A status report from a storage driver.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TransferStatus {
    pub folder_id: FolderId,
    pub path: PathBuf,
    pub status: SynchronizationStatus,
}

impl TransferStatus {
    pub fn new(folder_id: FolderId, path: impl Into<PathBuf>, status: SynchronizationStatus) -> Self {
        Self {
            folder_id,
            path: path.into(),
            status,
        }
    }
}

/// A request to register a new sync folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderRequest {
    pub local_uri: String,
    pub remote_uri: String,
}

impl FolderRequest {
    pub fn new(local_uri: impl Into<String>, remote_uri: impl Into<String>) -> Self {
        Self {
            local_uri: local_uri.into(),
            remote_uri: remote_uri.into(),
        }
    }
}

/// Answer to a [`FolderRequest`] that could not be registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderRejection {
    pub request: FolderRequest,
    pub reason: String,
}
