//! Kernel bootstrap and the facade used by the CLI and REST layers.

use std::sync::Arc;
use std::time::{Duration, Instant};

use nsync_bus::{BusError, Signal, SignalBus, SignalKind};
use nsync_core::{FolderRequest, SyncFolder};
use nsync_store::{FileIndexProvider, SqliteCatalogStore};
use nsync_sync::{ChecksumEngine, FolderCatalog, SyncArbiter};
use tracing::info;

use crate::analyzer::DirAnalyzer;
use crate::config::DaemonConfig;
use crate::error::{KernelError, Result};
use crate::storage::StorageManager;

/// The wired daemon. The storage manager is owned by its bus registration.
pub struct Kernel {
    config: DaemonConfig,
    bus: Arc<SignalBus>,
    catalog: Arc<FolderCatalog>,
    arbiter: Arc<SyncArbiter>,
    analyzer: Arc<DirAnalyzer>,
    started: Instant,
}

impl Kernel {
    /// Build every component, start the bus and resume persisted folders.
    ///
    /// # Errors
    /// Fails if the metadata directory or the catalog cannot be opened, or
    /// if the watcher cannot be started.
    pub async fn boot(config: DaemonConfig) -> Result<Self> {
        tokio::fs::create_dir_all(&config.config_dir).await?;
        tokio::fs::create_dir_all(config.metadata_dir()).await?;

        let bus = Arc::new(SignalBus::new());

        let store = SqliteCatalogStore::open(config.catalog_path())?;
        let catalog = Arc::new(FolderCatalog::load(Arc::new(store), Arc::clone(&bus)).await?);

        let arbiter = Arc::new(SyncArbiter::new(
            Arc::clone(&catalog),
            Arc::clone(&bus),
            Arc::new(FileIndexProvider::new(config.metadata_dir())),
            ChecksumEngine::new(config.checksum_buffer_size),
        ));

        let analyzer = Arc::new(DirAnalyzer::start(Arc::clone(&bus))?);

        let storage = Arc::new(StorageManager::new(Arc::clone(&bus)));
        storage.load_drivers(&config).await;

        catalog.attach();
        arbiter.attach();
        analyzer.attach();
        storage.attach();

        bus.start()?;
        catalog.announce().await?;

        info!(
            config_dir = %config.config_dir.display(),
            metadata_dir = %config.metadata_dir().display(),
            "kernel booted"
        );

        Ok(Self {
            config,
            bus,
            catalog,
            arbiter,
            analyzer,
            started: Instant::now(),
        })
    }

    pub fn facade(&self) -> KernelFacade {
        KernelFacade {
            bus: Arc::clone(&self.bus),
            catalog: Arc::clone(&self.catalog),
            started: self.started,
            response_timeout: self.config.response_timeout(),
        }
    }

    pub fn config(&self) -> &DaemonConfig {
        &self.config
    }

    pub fn bus(&self) -> &Arc<SignalBus> {
        &self.bus
    }

    pub fn catalog(&self) -> &Arc<FolderCatalog> {
        &self.catalog
    }

    pub fn arbiter(&self) -> &Arc<SyncArbiter> {
        &self.arbiter
    }

    /// Wait until the dispatch loop has terminated.
    pub async fn join(&self) {
        self.bus.join().await;
    }

    /// Stop the bus and the watcher.
    pub fn shutdown(&self) {
        self.bus.stop();
        self.analyzer.shutdown();
        info!("kernel shut down");
    }
}

/// Request/response entry points over the bus.
#[derive(Clone)]
pub struct KernelFacade {
    bus: Arc<SignalBus>,
    catalog: Arc<FolderCatalog>,
    started: Instant,
    response_timeout: Duration,
}

impl KernelFacade {
    /// Ask the catalog to register a folder and wait for its answer.
    ///
    /// # Errors
    /// `Rejected` if the catalog refused the request, `NoResponse` if no
    /// answer arrived within the response timeout.
    pub async fn add_folder(&self, local_uri: &str, remote_uri: &str) -> Result<SyncFolder> {
        let request = FolderRequest::new(local_uri, remote_uri);
        let mut conn = self
            .bus
            .connect(&[SignalKind::FolderAdded, SignalKind::FolderRejected]);
        conn.send(Signal::AddFolder(request.clone()))?;

        let reply = conn
            .receive_matching(self.response_timeout, |signal| match signal {
                Signal::FolderAdded(folder) => folder.remote_folder().as_str() == remote_uri,
                Signal::FolderRejected(rejection) => rejection.request == request,
                _ => false,
            })
            .await
            .map_err(|e| match e {
                BusError::NoResponse(ms) => KernelError::NoResponse(ms),
                other => KernelError::Bus(other),
            })?;

        match reply {
            Signal::FolderAdded(folder) => Ok(folder),
            Signal::FolderRejected(rejection) => Err(KernelError::Rejected(rejection.reason)),
            other => Err(KernelError::UnexpectedResponse(other.to_string())),
        }
    }

    pub async fn folders(&self) -> Vec<SyncFolder> {
        self.catalog.folders().await
    }

    /// Ask the dispatch loop to terminate.
    pub fn stop(&self) -> Result<()> {
        info!("stop requested");
        self.bus.publish(Signal::Stop)?;
        Ok(())
    }

    /// Wait until the dispatch loop has terminated.
    pub async fn join(&self) {
        self.bus.join().await;
    }

    pub fn uptime(&self) -> Duration {
        self.started.elapsed()
    }
}
