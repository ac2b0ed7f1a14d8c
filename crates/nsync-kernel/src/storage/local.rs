//! Local filesystem driver (`file://` remotes).

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use nsync_bus::{Signal, SignalBus};
use nsync_core::{SyncFolder, SynchronizationStatus, TransferStatus};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tracing::{debug, error, info, warn};

use super::StorageDriver;
use crate::config::DEFAULT_CHUNK_SIZE;
use crate::error::Result;

pub const SCHEME: &str = "file";

/// Copies files into a directory on the local filesystem.
pub struct LocalFileStorage {
    bus: Arc<SignalBus>,
    chunk_size: usize,
}

impl LocalFileStorage {
    pub fn new(bus: Arc<SignalBus>, chunk_size: usize) -> Self {
        Self {
            bus,
            chunk_size: if chunk_size == 0 { DEFAULT_CHUNK_SIZE } else { chunk_size },
        }
    }

    fn report(&self, folder: &SyncFolder, path: &Path, status: SynchronizationStatus) {
        let update = TransferStatus::new(folder.folder_id().clone(), path, status);
        if let Err(e) = self.bus.publish(Signal::ChangeStatus(update)) {
            warn!(path = %path.display(), %status, error = %e, "status report dropped");
        }
    }

    /// Copy `path` to its destination in bounded chunks.
    async fn copy(&self, path: &Path, folder: &SyncFolder) -> Result<(PathBuf, u64)> {
        let destination = folder.remote_destination(path)?;
        if let Some(parent) = destination.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }

        let mut source = tokio::fs::File::open(path).await?;
        let mut target = tokio::fs::File::create(&destination).await?;
        let mut buf = vec![0u8; self.chunk_size];
        let mut copied = 0u64;
        loop {
            let n = source.read(&mut buf).await?;
            if n == 0 {
                break;
            }
            target.write_all(&buf[..n]).await?;
            copied += n as u64;
        }
        target.flush().await?;
        target.sync_all().await?;

        Ok((destination, copied))
    }

    async fn remove(&self, path: &Path, folder: &SyncFolder) -> Result<Option<PathBuf>> {
        let destination = folder.remote_destination(path)?;
        let metadata = match tokio::fs::symlink_metadata(&destination).await {
            Ok(metadata) => metadata,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        // Only files are mirrored; a directory is emptied file by file.
        if metadata.is_dir() {
            debug!(path = %destination.display(), "not removing remote directory");
            return Ok(None);
        }
        tokio::fs::remove_file(&destination).await?;
        Ok(Some(destination))
    }
}

#[async_trait]
impl StorageDriver for LocalFileStorage {
    fn scheme(&self) -> &str {
        SCHEME
    }

    async fn sync_file(&self, path: &Path, folder: &SyncFolder) {
        self.report(folder, path, SynchronizationStatus::Transferring);

        match self.copy(path, folder).await {
            Ok((destination, bytes)) => {
                info!(
                    folder_id = %folder.folder_id(),
                    from = %path.display(),
                    to = %destination.display(),
                    bytes,
                    "file synchronized"
                );
                self.report(folder, path, SynchronizationStatus::Synchronized);
            }
            Err(e) => {
                error!(folder_id = %folder.folder_id(), path = %path.display(), error = %e, "transfer failed");
                self.report(folder, path, SynchronizationStatus::Pending);
            }
        }
    }

    async fn delete_file(&self, path: &Path, folder: &SyncFolder) {
        match self.remove(path, folder).await {
            Ok(Some(destination)) => {
                info!(folder_id = %folder.folder_id(), path = %destination.display(), "remote copy deleted");
            }
            Ok(None) => {
                debug!(folder_id = %folder.folder_id(), path = %path.display(), "remote copy already absent");
            }
            Err(e) => {
                error!(folder_id = %folder.folder_id(), path = %path.display(), error = %e, "delete failed");
            }
        }
    }
}
