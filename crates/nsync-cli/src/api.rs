//! JSON bodies exchanged between the CLI and the daemon's REST endpoint.

use nsync_core::SyncFolder;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatusResponse {
    pub uptime_mins: u64,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddFolderRequest {
    pub local_uri: String,
    pub remote_uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderResponse {
    pub uid: String,
    pub local_uri: String,
    pub remote_uri: String,
}

impl From<&SyncFolder> for FolderResponse {
    fn from(folder: &SyncFolder) -> Self {
        Self {
            uid: folder.folder_id().to_string(),
            local_uri: folder.local_folder().to_string(),
            remote_uri: folder.remote_folder().to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub message: String,
}
