//! The folder catalog.
//!
//! Persisted registry of sync folders and the source of `FolderAdded`
//! signals. Remote URIs are unique across the catalog; local URIs are not.

use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use nsync_bus::{Consumer, ConsumerError, ConsumerId, Signal, SignalBus, SignalKind};
use nsync_core::{FolderId, FolderRejection, FolderRequest, FolderUri, SyncFolder};
use nsync_store::CatalogStore;
use tokio::sync::RwLock;
use tracing::{info, warn};
use uuid::Uuid;

use crate::error::{Result, SyncError};

pub struct FolderCatalog {
    store: Arc<dyn CatalogStore>,
    bus: Arc<SignalBus>,
    folders: RwLock<BTreeMap<FolderId, SyncFolder>>,
}

impl FolderCatalog {
    /// An empty catalog.
    pub fn new(store: Arc<dyn CatalogStore>, bus: Arc<SignalBus>) -> Self {
        Self {
            store,
            bus,
            folders: RwLock::new(BTreeMap::new()),
        }
    }

    /// A catalog populated from its store.
    pub async fn load(store: Arc<dyn CatalogStore>, bus: Arc<SignalBus>) -> Result<Self> {
        let folders = store
            .load_folders()
            .await?
            .into_iter()
            .map(|folder| (folder.folder_id().clone(), folder))
            .collect::<BTreeMap<_, _>>();
        info!(folders = folders.len(), "folder catalog loaded");

        Ok(Self {
            store,
            bus,
            folders: RwLock::new(folders),
        })
    }

    /// Register a new folder pair, persist it and announce it.
    pub async fn register(&self, local_uri: &str, remote_uri: &str) -> Result<SyncFolder> {
        let remote = FolderUri::parse(remote_uri)?;

        let mut folders = self.folders.write().await;
        if folders
            .values()
            .any(|existing| existing.remote_folder().same_location(&remote))
        {
            return Err(SyncError::DuplicateFolder(remote_uri.to_string()));
        }

        let folder_id = FolderId::new(Uuid::new_v4().to_string());
        let folder = SyncFolder::new(folder_id.clone(), local_uri, remote_uri)?;
        self.store.save_folder(&folder).await?;
        folders.insert(folder_id.clone(), folder.clone());
        drop(folders);

        info!(folder_id = %folder_id, local = local_uri, remote = remote_uri, "folder registered");
        self.bus.publish(Signal::FolderAdded(folder.clone()))?;
        Ok(folder)
    }

    pub async fn find(&self, folder_id: &FolderId) -> Option<SyncFolder> {
        self.folders.read().await.get(folder_id).cloned()
    }

    /// All registered folders, ordered by id.
    pub async fn folders(&self) -> Vec<SyncFolder> {
        self.folders.read().await.values().cloned().collect()
    }

    pub async fn len(&self) -> usize {
        self.folders.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.folders.read().await.is_empty()
    }

    /// Publish `FolderAdded` for every known folder so that indexes and
    /// watchers resume after a restart.
    pub async fn announce(&self) -> Result<usize> {
        let folders = self.folders().await;
        for folder in &folders {
            self.bus.publish(Signal::FolderAdded(folder.clone()))?;
        }
        info!(folders = folders.len(), "announced persisted folders");
        Ok(folders.len())
    }

    /// Serve `AddFolder` requests from the bus.
    pub fn attach(self: &Arc<Self>) -> ConsumerId {
        self.bus.register(self.clone(), &[SignalKind::AddFolder])
    }

    async fn on_add_folder(&self, request: FolderRequest) -> Result<()> {
        match self.register(&request.local_uri, &request.remote_uri).await {
            Ok(_) => Ok(()),
            Err(e) => {
                warn!(remote = %request.remote_uri, error = %e, "folder request rejected");
                self.bus.publish(Signal::FolderRejected(FolderRejection {
                    request,
                    reason: e.to_string(),
                }))?;
                Ok(())
            }
        }
    }
}

#[async_trait]
impl Consumer for FolderCatalog {
    fn name(&self) -> &str {
        "folder-catalog"
    }

    async fn handle(&self, signal: Signal) -> std::result::Result<(), ConsumerError> {
        match signal {
            Signal::AddFolder(request) => Ok(self.on_add_folder(request).await?),
            _ => Ok(()),
        }
    }
}
