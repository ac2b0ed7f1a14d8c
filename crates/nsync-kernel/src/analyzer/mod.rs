//! Directory analysis: watching and scanning registered folders.
//!
//! On `FolderAdded` the analyzer arms a recursive watch on the folder and
//! then scans it, so files that already exist are reported once and later
//! changes arrive through the watcher.

pub mod scanner;
pub mod watcher;

use std::sync::Arc;

use async_trait::async_trait;
use nsync_bus::{Consumer, ConsumerError, ConsumerId, Signal, SignalBus, SignalKind};
use nsync_core::SyncFolder;
use tracing::info;

use crate::error::Result;

pub use scanner::DirScanner;
pub use watcher::{classify, DirWatcher, FileChange};

pub struct DirAnalyzer {
    bus: Arc<SignalBus>,
    watcher: DirWatcher,
    scanner: Arc<DirScanner>,
}

impl DirAnalyzer {
    /// Start the watch thread.
    pub fn start(bus: Arc<SignalBus>) -> Result<Self> {
        let scanner = Arc::new(DirScanner::new(Arc::clone(&bus)));
        let watcher = DirWatcher::start(Arc::clone(&bus), Arc::clone(&scanner))?;
        Ok(Self {
            bus,
            watcher,
            scanner,
        })
    }

    pub fn attach(self: &Arc<Self>) -> ConsumerId {
        self.bus
            .register(self.clone(), &[SignalKind::FolderAdded, SignalKind::Stop])
    }

    /// Watch, then scan, one folder.
    pub fn analyze(&self, folder: &SyncFolder) -> Result<()> {
        self.watcher.watch(folder)?;
        // The scan thread runs detached; its count is only logged.
        self.scanner.scan(folder)?;
        Ok(())
    }

    pub fn shutdown(&self) {
        self.watcher.shutdown();
    }
}

#[async_trait]
impl Consumer for DirAnalyzer {
    fn name(&self) -> &str {
        "dir-analyzer"
    }

    async fn handle(&self, signal: Signal) -> std::result::Result<(), ConsumerError> {
        match signal {
            Signal::FolderAdded(folder) => self.analyze(&folder)?,
            Signal::Stop => {
                info!("stop requested, stopping watcher");
                self.watcher.stop();
            }
            _ => {}
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_stop_signal_stops_watcher() {
        let bus = Arc::new(SignalBus::new());
        let analyzer = Arc::new(DirAnalyzer::start(bus).unwrap());
        let folder = SyncFolder::new("f", "file:///tmp/a", "file:///tmp/b").unwrap();

        tokio::time::timeout(Duration::from_millis(500), analyzer.handle(Signal::Stop))
            .await
            .unwrap()
            .unwrap();

        let mut stopped = false;
        for _ in 0..100 {
            if analyzer.watcher.watch(&folder).is_err() {
                stopped = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(stopped);
        analyzer.shutdown();
    }
}
