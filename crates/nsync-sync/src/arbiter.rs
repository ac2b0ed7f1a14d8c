//! The synchronization arbiter.
//!
//! State per (folder, relative path):
//!
//! ```text
//! absent ──► PENDING ──► TRANSFERRING ──► SYNCHRONIZED
//!               ▲              │
//!               └──────────────┘  transfer failed
//! ```
//!
//! The arbiter decides when a file must be transferred, writes `PENDING`
//! records, and applies the status reports published by storage drivers.
//! Every read-modify-write on a folder's index runs inside that folder's
//! section.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use nsync_bus::{Consumer, ConsumerError, ConsumerId, Signal, SignalBus, SignalKind};
use nsync_core::{
    CoreError, DataRecord, FolderId, LocalFile, RemoteFile, SyncFolder, SynchronizationStatus,
    TransferStatus,
};
use nsync_store::{Index, IndexProvider, StoreError};
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, warn};

use crate::catalog::FolderCatalog;
use crate::checksum::ChecksumEngine;
use crate::error::{Result, SyncError};

/// An open index and the lock serializing its read-modify-write sequences.
struct FolderIndex {
    index: Arc<dyn Index>,
    section: Mutex<()>,
}

pub struct SyncArbiter {
    catalog: Arc<FolderCatalog>,
    bus: Arc<SignalBus>,
    provider: Arc<dyn IndexProvider>,
    checksum: ChecksumEngine,
    indexes: RwLock<HashMap<FolderId, Arc<FolderIndex>>>,
}

impl SyncArbiter {
    pub fn new(
        catalog: Arc<FolderCatalog>,
        bus: Arc<SignalBus>,
        provider: Arc<dyn IndexProvider>,
        checksum: ChecksumEngine,
    ) -> Self {
        Self {
            catalog,
            bus,
            provider,
            checksum,
            indexes: RwLock::new(HashMap::new()),
        }
    }

    /// Subscribe to folder and file signals.
    pub fn attach(self: &Arc<Self>) -> ConsumerId {
        self.bus.register(
            self.clone(),
            &[
                SignalKind::FolderAdded,
                SignalKind::FileModified,
                SignalKind::FileDeleted,
                SignalKind::ChangeStatus,
            ],
        )
    }

    /// Open the index of a folder. Already open indexes are kept.
    pub async fn open_index(&self, folder: &SyncFolder) -> Result<()> {
        self.index_for(folder.folder_id()).await.map(|_| ())
    }

    /// Stored record of a file, for inspection.
    pub async fn record(&self, folder_id: &FolderId, relative: &str) -> Result<Option<DataRecord>> {
        let entry = self.index_for(folder_id).await?;
        let _section = entry.section.lock().await;
        Ok(entry.index.get(relative).await?)
    }

    /// Whether a file is tracked.
    pub async fn contains(&self, folder_id: &FolderId, relative: &str) -> Result<bool> {
        let entry = self.index_for(folder_id).await?;
        Ok(entry.index.contains(relative).await?)
    }

    async fn index_for(&self, folder_id: &FolderId) -> Result<Arc<FolderIndex>> {
        if let Some(entry) = self.indexes.read().await.get(folder_id) {
            return Ok(Arc::clone(entry));
        }

        let mut indexes = self.indexes.write().await;
        if let Some(entry) = indexes.get(folder_id) {
            return Ok(Arc::clone(entry));
        }
        let index = self.provider.open(folder_id).await?;
        let entry = Arc::new(FolderIndex {
            index,
            section: Mutex::new(()),
        });
        indexes.insert(folder_id.clone(), Arc::clone(&entry));
        info!(folder_id = %folder_id, "index opened for folder");
        Ok(entry)
    }

    async fn folder(&self, folder_id: &FolderId) -> Option<SyncFolder> {
        let folder = self.catalog.find(folder_id).await;
        if folder.is_none() {
            info!(folder_id = %folder_id, "dropping event for unknown folder");
        }
        folder
    }

    async fn on_file_modified(&self, file: LocalFile) -> Result<()> {
        let Some(folder) = self.folder(&file.folder_id).await else {
            return Ok(());
        };
        let relative = folder.relative_path(&file.path)?;

        let fingerprint = match self.checksum.fingerprint(&file.path).await {
            Ok(fingerprint) => fingerprint,
            Err(e) if e.is_not_found() => {
                debug!(path = %file.path.display(), "file vanished before it was read");
                return Ok(());
            }
            Err(SyncError::NotAFile(_)) => {
                debug!(path = %file.path.display(), "skipping non-regular file");
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let entry = self.index_for(folder.folder_id()).await?;
        let _section = entry.section.lock().await;

        let stored = match entry.index.get(&relative).await {
            Ok(stored) => stored,
            Err(StoreError::Core(e @ (CoreError::MalformedRecord(_) | CoreError::InvalidStatus(_)))) => {
                warn!(
                    folder_id = %folder.folder_id(),
                    path = %relative,
                    error = %e,
                    "unreadable record, overwriting"
                );
                None
            }
            Err(e) => return Err(e.into()),
        };
        if let Some(record) = stored.filter(|record| record.checksum == fingerprint.checksum) {
            if record.status == SynchronizationStatus::Pending {
                info!(folder_id = %folder.folder_id(), path = %relative, "retrying pending transfer");
                self.bus
                    .publish(Signal::TransferFile(RemoteFile::new(file.path, folder)))?;
            } else {
                debug!(folder_id = %folder.folder_id(), path = %relative, "content unchanged");
            }
            return Ok(());
        }

        let record = DataRecord::pending(fingerprint.checksum, fingerprint.size, fingerprint.modified_ms);
        entry.index.set(&relative, record).await?;
        info!(
            folder_id = %folder.folder_id(),
            path = %relative,
            checksum = %fingerprint.checksum,
            "file changed, scheduling transfer"
        );
        self.bus
            .publish(Signal::TransferFile(RemoteFile::new(file.path, folder)))?;
        Ok(())
    }

    async fn on_file_deleted(&self, file: LocalFile) -> Result<()> {
        let Some(folder) = self.folder(&file.folder_id).await else {
            return Ok(());
        };
        let relative = folder.relative_path(&file.path)?;

        let entry = self.index_for(folder.folder_id()).await?;
        let _section = entry.section.lock().await;

        if !entry.index.contains(&relative).await? {
            // A removed or moved-out directory: its files are the tracked
            // paths under it.
            let prefix = format!("{}/", relative);
            let nested: Vec<String> = entry
                .index
                .paths()
                .await?
                .into_iter()
                .filter(|path| path.starts_with(&prefix))
                .collect();
            if !nested.is_empty() {
                info!(
                    folder_id = %folder.folder_id(),
                    path = %relative,
                    files = nested.len(),
                    "directory deleted, scheduling removal of its files"
                );
                for path in nested {
                    let local = folder.local_path().join(&path);
                    self.bus
                        .publish(Signal::DeleteFile(RemoteFile::new(local, folder.clone())))?;
                    entry.index.remove(&path).await?;
                }
                return Ok(());
            }
        }

        info!(folder_id = %folder.folder_id(), path = %relative, "file deleted, scheduling removal");
        self.bus
            .publish(Signal::DeleteFile(RemoteFile::new(file.path, folder.clone())))?;
        entry.index.remove(&relative).await?;
        Ok(())
    }

    async fn on_change_status(&self, update: TransferStatus) -> Result<()> {
        let Some(folder) = self.folder(&update.folder_id).await else {
            return Ok(());
        };
        let relative = folder.relative_path(&update.path)?;

        let entry = self.index_for(folder.folder_id()).await?;
        let _section = entry.section.lock().await;
        match entry.index.get(&relative).await? {
            Some(record) => {
                entry
                    .index
                    .set(&relative, record.with_status(update.status))
                    .await?;
                debug!(folder_id = %folder.folder_id(), path = %relative, status = %update.status, "status changed");
            }
            None => {
                debug!(folder_id = %folder.folder_id(), path = %relative, "status for untracked file ignored");
            }
        }
        Ok(())
    }
}

#[async_trait]
impl Consumer for SyncArbiter {
    fn name(&self) -> &str {
        "sync-arbiter"
    }

    async fn handle(&self, signal: Signal) -> std::result::Result<(), ConsumerError> {
        match signal {
            Signal::FolderAdded(folder) => self.open_index(&folder).await?,
            Signal::FileModified(file) => self.on_file_modified(file).await?,
            Signal::FileDeleted(file) => self.on_file_deleted(file).await?,
            Signal::ChangeStatus(update) => self.on_change_status(update).await?,
            _ => {}
        }
        Ok(())
    }
}
