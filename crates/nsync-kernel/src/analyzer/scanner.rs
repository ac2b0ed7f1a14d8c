//! Full directory scans.
//!
//! A scan reports every regular file under a folder as `FileModified`; the
//! arbiter filters out the ones whose content is already known. Scans run on
//! dedicated threads and hand their results to the bus.

use std::path::Path;
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use nsync_bus::{Signal, SignalBus};
use nsync_core::{LocalFile, SyncFolder};
use tracing::{debug, info, warn};
use walkdir::WalkDir;

use crate::error::{KernelError, Result};

pub struct DirScanner {
    bus: Arc<SignalBus>,
}

impl DirScanner {
    pub fn new(bus: Arc<SignalBus>) -> Self {
        Self { bus }
    }

    /// Scan the whole folder in the background.
    pub fn scan(&self, folder: &SyncFolder) -> Result<JoinHandle<usize>> {
        self.scan_subtree(folder, folder.local_path())
    }

    /// Scan one directory of a folder in the background.
    ///
    /// The handle yields the number of files reported.
    pub fn scan_subtree(&self, folder: &SyncFolder, dir: &Path) -> Result<JoinHandle<usize>> {
        let bus = Arc::clone(&self.bus);
        let folder = folder.clone();
        let dir = dir.to_path_buf();

        thread::Builder::new()
            .name("nsync-scanner".to_string())
            .spawn(move || walk(&bus, &folder, &dir))
            .map_err(|e| KernelError::Startup(format!("failed to spawn scanner: {}", e)))
    }
}

/// Publish `FileModified` for every regular file below `dir`.
pub fn walk(bus: &SignalBus, folder: &SyncFolder, dir: &Path) -> usize {
    let mut reported = 0usize;
    for entry in WalkDir::new(dir).follow_links(false) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!(folder_id = %folder.folder_id(), error = %e, "scan entry skipped");
                continue;
            }
        };
        if !entry.file_type().is_file() {
            continue;
        }

        let file = LocalFile::changed(folder.folder_id().clone(), entry.into_path());
        debug!(path = %file.path.display(), "scanned");
        if bus.publish(Signal::FileModified(file)).is_err() {
            warn!(folder_id = %folder.folder_id(), "bus closed, scan aborted");
            break;
        }
        reported += 1;
    }

    info!(folder_id = %folder.folder_id(), dir = %dir.display(), files = reported, "scan complete");
    reported
}
