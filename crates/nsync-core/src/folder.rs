//! Sync folder definitions.
//!
//! A [`SyncFolder`] pairs a local directory with a remote destination, both
//! expressed as URIs. The scheme of the remote URI selects the storage driver,
//! and the local path is the root every file event is relativized against.

use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{CoreError, Result};

/// Opaque, stable identifier of a registered sync folder.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FolderId(String);

impl FolderId {
    /// Wrap an existing identifier.
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the identifier as a string slice.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FolderId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for FolderId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for FolderId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

impl AsRef<str> for FolderId {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// The scheme and path components of a folder URI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FolderUri {
    uri: String,
    scheme: String,
    host: Option<String>,
    path: PathBuf,
}

impl FolderUri {
    /// Parse a folder URI such as `file:///tmp/a`.
    pub fn parse(uri: &str) -> Result<Self> {
        let url = Url::parse(uri).map_err(|e| CoreError::InvalidUri {
            uri: uri.to_string(),
            reason: e.to_string(),
        })?;

        let path = if url.scheme() == "file" {
            url.to_file_path()
                .unwrap_or_else(|_| PathBuf::from(url.path()))
        } else {
            PathBuf::from(url.path())
        };

        if path.as_os_str().is_empty() {
            return Err(CoreError::InvalidUri {
                uri: uri.to_string(),
                reason: "URI has no path component".into(),
            });
        }

        Ok(Self {
            uri: uri.to_string(),
            scheme: url.scheme().to_string(),
            host: url.host_str().map(str::to_string),
            path,
        })
    }

    /// The URI exactly as it was registered.
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Scheme component, e.g. `file`.
    pub fn scheme(&self) -> &str {
        &self.scheme
    }

    /// Host component, if the URI carries one.
    pub fn host(&self) -> Option<&str> {
        self.host.as_deref()
    }

    /// Path component.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Whether both URIs name the same location, ignoring trailing
    /// separators and redundant `.` components.
    pub fn same_location(&self, other: &FolderUri) -> bool {
        self.scheme == other.scheme && self.host == other.host && self.path == other.path
    }
}

impl fmt::Display for FolderUri {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.uri)
    }
}

/// Persisted shape of a sync folder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FolderDefinition {
    pub folder_id: String,
    pub local_folder: String,
    pub remote_folder: String,
}

/// A registered pair of local and remote folders.
///
/// Immutable once created. The catalog guarantees `remote_folder` is unique
/// across all registered folders; `local_folder` may repeat.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "FolderDefinition", into = "FolderDefinition")]
pub struct SyncFolder {
    folder_id: FolderId,
    local: FolderUri,
    remote: FolderUri,
}

impl SyncFolder {
    /// Build a folder, validating both URIs.
    pub fn new(folder_id: impl Into<FolderId>, local_uri: &str, remote_uri: &str) -> Result<Self> {
        Ok(Self {
            folder_id: folder_id.into(),
            local: FolderUri::parse(local_uri)?,
            remote: FolderUri::parse(remote_uri)?,
        })
    }

    pub fn folder_id(&self) -> &FolderId {
        &self.folder_id
    }

    pub fn local_folder(&self) -> &FolderUri {
        &self.local
    }

    pub fn remote_folder(&self) -> &FolderUri {
        &self.remote
    }

    /// Scheme of the remote URI; selects the storage driver.
    pub fn remote_scheme(&self) -> &str {
        self.remote.scheme()
    }

    /// Local root directory.
    pub fn local_path(&self) -> &Path {
        self.local.path()
    }

    /// Remote root path.
    pub fn remote_path(&self) -> &Path {
        self.remote.path()
    }

    /// Map an absolute local file path to a `/`-separated path relative to
    /// the folder root.
    pub fn relative_path(&self, file: &Path) -> Result<String> {
        let outside = || CoreError::OutsideFolder {
            path: file.to_path_buf(),
            root: self.local.path().to_path_buf(),
        };

        let stripped = file.strip_prefix(self.local.path()).map_err(|_| outside())?;

        let mut parts = Vec::new();
        for component in stripped.components() {
            match component {
                Component::Normal(part) => {
                    let part = part
                        .to_str()
                        .ok_or_else(|| CoreError::NonUtf8Path(file.to_path_buf()))?;
                    parts.push(part);
                }
                Component::CurDir => {}
                _ => return Err(outside()),
            }
        }

        if parts.is_empty() {
            return Err(outside());
        }
        Ok(parts.join("/"))
    }

    /// Destination of a local file under the remote root.
    pub fn remote_destination(&self, file: &Path) -> Result<PathBuf> {
        let relative = self.relative_path(file)?;
        Ok(relative
            .split('/')
            .fold(self.remote.path().to_path_buf(), |acc, part| acc.join(part)))
    }
}

impl fmt::Display for SyncFolder {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "SyncFolder(id={} local={} remote={})",
            self.folder_id, self.local, self.remote
        )
    }
}

impl TryFrom<FolderDefinition> for SyncFolder {
    type Error = CoreError;

    fn try_from(def: FolderDefinition) -> Result<Self> {
        SyncFolder::new(def.folder_id, &def.local_folder, &def.remote_folder)
    }
}

impl From<SyncFolder> for FolderDefinition {
    fn from(folder: SyncFolder) -> Self {
        Self {
            folder_id: folder.folder_id.0,
            local_folder: folder.local.uri,
            remote_folder: folder.remote.uri,
        }
    }
}
