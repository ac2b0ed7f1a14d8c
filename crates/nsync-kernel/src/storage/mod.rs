//! Storage drivers and the manager routing transfers to them.
//!
//! A driver is bound to one URI scheme. It reports progress only through
//! `ChangeStatus` signals; nothing is returned to the manager.

pub mod local;

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use async_trait::async_trait;
use nsync_bus::{Consumer, ConsumerError, ConsumerId, Signal, SignalBus, SignalKind};
use nsync_core::{RemoteFile, SyncFolder};
use tokio::sync::RwLock;
use tracing::{info, warn};

use crate::config::DaemonConfig;

pub use local::LocalFileStorage;

/// A storage backend for one URI scheme.
#[async_trait]
pub trait StorageDriver: Send + Sync {
    fn scheme(&self) -> &str;

    /// Copy a local file to its destination under the folder's remote root.
    async fn sync_file(&self, path: &Path, folder: &SyncFolder);

    /// Remove a file's destination under the folder's remote root.
    async fn delete_file(&self, path: &Path, folder: &SyncFolder);
}

/// Routes `TransferFile` and `DeleteFile` to the driver of the folder's
/// remote scheme.
pub struct StorageManager {
    bus: Arc<SignalBus>,
    drivers: RwLock<BTreeMap<String, Arc<dyn StorageDriver>>>,
}

impl StorageManager {
    pub fn new(bus: Arc<SignalBus>) -> Self {
        Self {
            bus,
            drivers: RwLock::new(BTreeMap::new()),
        }
    }

    /// Register the built-in drivers.
    pub async fn load_drivers(&self, config: &DaemonConfig) {
        self.add_driver(Arc::new(LocalFileStorage::new(
            Arc::clone(&self.bus),
            config.transfer_chunk_size,
        )))
        .await;
    }

    /// Register a driver, replacing any driver for the same scheme.
    pub async fn add_driver(&self, driver: Arc<dyn StorageDriver>) {
        let scheme = driver.scheme().to_string();
        info!(scheme = %scheme, "storage driver loaded");
        self.drivers.write().await.insert(scheme, driver);
    }

    pub async fn schemes(&self) -> Vec<String> {
        self.drivers.read().await.keys().cloned().collect()
    }

    pub fn attach(self: &Arc<Self>) -> ConsumerId {
        self.bus
            .register(self.clone(), &[SignalKind::TransferFile, SignalKind::DeleteFile])
    }

    async fn driver_for(&self, remote: &RemoteFile) -> Option<Arc<dyn StorageDriver>> {
        let scheme = remote.folder.remote_scheme();
        let driver = self.drivers.read().await.get(scheme).cloned();
        if driver.is_none() {
            warn!(
                scheme,
                folder_id = %remote.folder.folder_id(),
                path = %remote.path.display(),
                "no storage driver for scheme, dropping"
            );
        }
        driver
    }
}

#[async_trait]
impl Consumer for StorageManager {
    fn name(&self) -> &str {
        "storage-manager"
    }

    async fn handle(&self, signal: Signal) -> std::result::Result<(), ConsumerError> {
        match signal {
            Signal::TransferFile(remote) => {
                if let Some(driver) = self.driver_for(&remote).await {
                    driver.sync_file(&remote.path, &remote.folder).await;
                }
            }
            Signal::DeleteFile(remote) => {
                if let Some(driver) = self.driver_for(&remote).await {
                    driver.delete_file(&remote.path, &remote.folder).await;
                }
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;
    use std::sync::Mutex;

    #[derive(Default)]
    struct RecordingDriver {
        calls: Mutex<Vec<(String, PathBuf)>>,
    }

    #[async_trait]
    impl StorageDriver for RecordingDriver {
        fn scheme(&self) -> &str {
            "mem"
        }

        async fn sync_file(&self, path: &Path, _folder: &SyncFolder) {
            self.calls.lock().unwrap().push(("sync".into(), path.to_path_buf()));
        }

        async fn delete_file(&self, path: &Path, _folder: &SyncFolder) {
            self.calls.lock().unwrap().push(("delete".into(), path.to_path_buf()));
        }
    }

    fn remote(scheme: &str) -> RemoteFile {
        let folder = SyncFolder::new("f", "file:///tmp/a", &format!("{}:///tmp/b", scheme)).unwrap();
        RemoteFile::new("/tmp/a/x.txt", folder)
    }

    #[tokio::test]
    async fn test_routes_by_scheme() {
        let bus = Arc::new(SignalBus::new());
        let manager = StorageManager::new(bus);
        let driver = Arc::new(RecordingDriver::default());
        manager.add_driver(driver.clone()).await;

        manager.handle(Signal::TransferFile(remote("mem"))).await.unwrap();
        manager.handle(Signal::DeleteFile(remote("mem"))).await.unwrap();

        let calls = driver.calls.lock().unwrap().clone();
        assert_eq!(
            calls,
            vec![
                ("sync".to_string(), PathBuf::from("/tmp/a/x.txt")),
                ("delete".to_string(), PathBuf::from("/tmp/a/x.txt")),
            ]
        );
    }

    #[tokio::test]
    async fn test_unknown_scheme_dropped() {
        let bus = Arc::new(SignalBus::new());
        let manager = StorageManager::new(bus);
        let driver = Arc::new(RecordingDriver::default());
        manager.add_driver(driver.clone()).await;

        manager.handle(Signal::TransferFile(remote("s3"))).await.unwrap();
        assert!(driver.calls.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_load_drivers_registers_local() {
        let bus = Arc::new(SignalBus::new());
        let manager = StorageManager::new(bus);
        manager.load_drivers(&DaemonConfig::with_config_dir("/tmp/nsync")).await;
        assert_eq!(manager.schemes().await, vec!["file".to_string()]);
    }
}
