//! Filesystem watcher.
//!
//! One `nsync-watcher` thread owns the platform watcher and the set of
//! watched folders. Raw notify events are classified into file changes,
//! attributed to every folder whose root contains the path, and published on
//! the bus. A directory appearing inside a folder is handed to the scanner,
//! since files created before its watch was armed produce no events.

use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex, PoisonError};
use std::thread::{self, JoinHandle};

use notify::event::{ModifyKind, RenameMode};
use notify::{Event, EventKind, RecommendedWatcher, RecursiveMode, Watcher};
use nsync_bus::{Signal, SignalBus};
use nsync_core::{FolderId, LocalFile, SyncFolder};
use tracing::{debug, error, info, warn};

use super::scanner::DirScanner;
use crate::error::{KernelError, Result};

/// A change worth reporting, derived from a raw notify event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FileChange {
    Changed(PathBuf),
    Deleted(PathBuf),
    DirectoryCreated(PathBuf),
}

/// Map a notify event to file changes.
///
/// Renames become a deletion of the old path and a creation of the new one.
/// A removed or moved-out directory surfaces as a deletion of its path, which
/// the arbiter expands to the files it tracked under it. Access events and
/// changes to directories that still exist are ignored.
pub fn classify(event: Event) -> Vec<FileChange> {
    let Event { kind, paths, .. } = event;

    if let EventKind::Modify(ModifyKind::Name(mode)) = kind {
        return match mode {
            RenameMode::Both => {
                let mut changes = Vec::with_capacity(2);
                if let Some(from) = paths.first() {
                    changes.push(FileChange::Deleted(from.clone()));
                }
                if let Some(to) = paths.get(1) {
                    changes.push(created(to.clone()));
                }
                changes
            }
            RenameMode::From => paths
                .into_iter()
                .filter(|path| !path.is_dir())
                .map(FileChange::Deleted)
                .collect(),
            RenameMode::To => paths.into_iter().map(created).collect(),
            RenameMode::Any | RenameMode::Other => paths
                .into_iter()
                .map(|path| {
                    if path.symlink_metadata().is_ok() {
                        created(path)
                    } else {
                        FileChange::Deleted(path)
                    }
                })
                .collect(),
        };
    }

    match kind {
        EventKind::Create(_) => paths.into_iter().map(created).collect(),
        EventKind::Modify(_) => paths
            .into_iter()
            .filter(|path| !path.is_dir())
            .map(FileChange::Changed)
            .collect(),
        EventKind::Remove(_) => paths
            .into_iter()
            .filter(|path| !path.is_dir())
            .map(FileChange::Deleted)
            .collect(),
        _ => Vec::new(),
    }
}

fn created(path: PathBuf) -> FileChange {
    if path.is_dir() {
        FileChange::DirectoryCreated(path)
    } else {
        FileChange::Changed(path)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Watch thread
// ─────────────────────────────────────────────────────────────────────────────

enum Command {
    Event(notify::Result<Event>),
    Watch(SyncFolder),
    Shutdown,
}

struct WatchLoop {
    watcher: RecommendedWatcher,
    bus: Arc<SignalBus>,
    scanner: Arc<DirScanner>,
    folders: BTreeMap<FolderId, SyncFolder>,
    watched: HashSet<PathBuf>,
}

impl WatchLoop {
    fn run(mut self, commands: Receiver<Command>) {
        while let Ok(command) = commands.recv() {
            match command {
                Command::Event(Ok(event)) => self.dispatch(event),
                Command::Event(Err(e)) => warn!(error = %e, "watch error"),
                Command::Watch(folder) => self.watch(folder),
                Command::Shutdown => break,
            }
        }
        info!("watcher stopped");
    }

    fn watch(&mut self, folder: SyncFolder) {
        let root = folder.local_path().to_path_buf();
        if !self.watched.contains(&root) {
            if let Err(e) = self.watcher.watch(&root, RecursiveMode::Recursive) {
                error!(folder_id = %folder.folder_id(), root = %root.display(), error = %e, "failed to watch folder");
                return;
            }
            self.watched.insert(root.clone());
        }
        info!(folder_id = %folder.folder_id(), root = %root.display(), "watching folder");
        self.folders.insert(folder.folder_id().clone(), folder);
    }

    fn owners<'a>(&'a self, path: &'a Path) -> impl Iterator<Item = &'a SyncFolder> + 'a {
        self.folders
            .values()
            .filter(move |folder| path.starts_with(folder.local_path()) && path != folder.local_path())
    }

    fn dispatch(&self, event: Event) {
        for change in classify(event) {
            match &change {
                FileChange::Changed(path) => {
                    for folder in self.owners(path) {
                        self.publish(Signal::FileModified(LocalFile::changed(
                            folder.folder_id().clone(),
                            path.clone(),
                        )));
                    }
                }
                FileChange::Deleted(path) => {
                    for folder in self.owners(path) {
                        self.publish(Signal::FileDeleted(LocalFile::deleted(
                            folder.folder_id().clone(),
                            path.clone(),
                        )));
                    }
                }
                FileChange::DirectoryCreated(path) => {
                    for folder in self.owners(path) {
                        debug!(dir = %path.display(), "directory created, scanning");
                        if let Err(e) = self.scanner.scan_subtree(folder, path) {
                            error!(dir = %path.display(), error = %e, "failed to scan new directory");
                        }
                    }
                }
            }
        }
    }

    fn publish(&self, signal: Signal) {
        debug!(%signal, "watch event");
        if let Err(e) = self.bus.publish(signal) {
            warn!(error = %e, "watch event dropped");
        }
    }
}

/// Handle to the watch thread.
pub struct DirWatcher {
    commands: Sender<Command>,
    thread: Mutex<Option<JoinHandle<()>>>,
}

impl DirWatcher {
    /// Create the platform watcher and start its thread.
    pub fn start(bus: Arc<SignalBus>, scanner: Arc<DirScanner>) -> Result<Self> {
        let (commands, rx) = mpsc::channel();

        let events = commands.clone();
        let watcher = notify::recommended_watcher(move |event| {
            if events.send(Command::Event(event)).is_err() {
                debug!("watch event dropped because the watcher thread is gone");
            }
        })?;

        let watch_loop = WatchLoop {
            watcher,
            bus,
            scanner,
            folders: BTreeMap::new(),
            watched: HashSet::new(),
        };
        let thread = thread::Builder::new()
            .name("nsync-watcher".to_string())
            .spawn(move || watch_loop.run(rx))
            .map_err(|e| KernelError::Startup(format!("failed to spawn watcher: {}", e)))?;

        Ok(Self {
            commands,
            thread: Mutex::new(Some(thread)),
        })
    }

    /// Start watching a folder recursively. Watching a folder twice is a no-op.
    pub fn watch(&self, folder: &SyncFolder) -> Result<()> {
        self.commands
            .send(Command::Watch(folder.clone()))
            .map_err(|_| KernelError::Startup("watcher thread has stopped".to_string()))
    }

    /// Ask the watch thread to stop without waiting for it.
    pub fn stop(&self) {
        if self.commands.send(Command::Shutdown).is_err() {
            debug!("watcher thread already stopped");
        }
    }

    /// Stop the watch thread and wait for it.
    pub fn shutdown(&self) {
        self.stop();
        let thread = self
            .thread
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(thread) = thread {
            if thread.join().is_err() {
                error!("watcher thread panicked");
            }
        }
    }
}

impl Drop for DirWatcher {
    fn drop(&mut self) {
        let _ = self.commands.send(Command::Shutdown);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use notify::event::{AccessKind, CreateKind, DataChange, RemoveKind};
    use nsync_bus::SignalKind;
    use std::time::Duration;
    use tempfile::TempDir;

    #[test]
    fn test_classify_basic_kinds() {
        let file = PathBuf::from("/nonexistent/x.txt");

        let create = Event::new(EventKind::Create(CreateKind::File)).add_path(file.clone());
        assert_eq!(classify(create), vec![FileChange::Changed(file.clone())]);

        let modify = Event::new(EventKind::Modify(ModifyKind::Data(DataChange::Content)))
            .add_path(file.clone());
        assert_eq!(classify(modify), vec![FileChange::Changed(file.clone())]);

        let remove = Event::new(EventKind::Remove(RemoveKind::File)).add_path(file.clone());
        assert_eq!(classify(remove), vec![FileChange::Deleted(file.clone())]);

        let access = Event::new(EventKind::Access(AccessKind::Any)).add_path(file);
        assert!(classify(access).is_empty());
    }

    #[test]
    fn test_classify_rename() {
        let from = PathBuf::from("/nonexistent/old.txt");
        let to = PathBuf::from("/nonexistent/new.txt");

        let both = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Both)))
            .add_path(from.clone())
            .add_path(to.clone());
        assert_eq!(
            classify(both),
            vec![FileChange::Deleted(from.clone()), FileChange::Changed(to.clone())]
        );

        let half = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From))).add_path(from.clone());
        assert_eq!(classify(half), vec![FileChange::Deleted(from.clone())]);

        // Unknown direction: decided by whether the path still exists.
        let any = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::Any))).add_path(from.clone());
        assert_eq!(classify(any), vec![FileChange::Deleted(from)]);
    }

    #[test]
    fn test_classify_directories() {
        let dir = TempDir::new().unwrap();
        let sub = dir.path().join("sub");
        std::fs::create_dir(&sub).unwrap();

        let create = Event::new(EventKind::Create(CreateKind::Folder)).add_path(sub.clone());
        assert_eq!(classify(create), vec![FileChange::DirectoryCreated(sub.clone())]);

        let touch = Event::new(EventKind::Modify(ModifyKind::Any)).add_path(sub.clone());
        assert!(classify(touch).is_empty());

        // Removal reported for a directory that is back in place.
        let stale = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(sub.clone());
        assert!(classify(stale).is_empty());

        let gone = dir.path().join("gone");
        let removed = Event::new(EventKind::Remove(RemoveKind::Folder)).add_path(gone.clone());
        assert_eq!(classify(removed), vec![FileChange::Deleted(gone.clone())]);

        let moved_out = Event::new(EventKind::Modify(ModifyKind::Name(RenameMode::From))).add_path(gone.clone());
        assert_eq!(classify(moved_out), vec![FileChange::Deleted(gone)]);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 2)]
    async fn test_watch_reports_new_file() {
        let dir = TempDir::new().unwrap();
        let root = dir.path().join("a");
        std::fs::create_dir_all(&root).unwrap();
        let folder = SyncFolder::new(
            "f",
            &format!("file://{}", root.display()),
            "file:///tmp/remote",
        )
        .unwrap();

        let bus = Arc::new(SignalBus::new());
        bus.start().unwrap();
        let mut conn = bus.connect(&[SignalKind::FileModified]);

        let watcher = DirWatcher::start(bus.clone(), Arc::new(DirScanner::new(bus.clone()))).unwrap();
        watcher.watch(&folder).unwrap();
        tokio::time::sleep(Duration::from_millis(200)).await;

        std::fs::write(root.join("new.txt"), "data").unwrap();

        let signal = conn
            .receive_matching(Duration::from_secs(5), |s| {
                matches!(s, Signal::FileModified(f) if f.path.ends_with("new.txt"))
            })
            .await
            .unwrap();
        assert!(matches!(signal, Signal::FileModified(f) if f.folder_id == FolderId::new("f")));

        watcher.shutdown();
    }

    #[tokio::test]
    async fn test_stop_does_not_wait_for_thread() {
        let bus = Arc::new(SignalBus::new());
        let watcher = DirWatcher::start(bus.clone(), Arc::new(DirScanner::new(bus))).unwrap();
        let folder = SyncFolder::new("f", "file:///tmp/a", "file:///tmp/b").unwrap();

        watcher.stop();
        let mut stopped = false;
        for _ in 0..100 {
            if watcher.watch(&folder).is_err() {
                stopped = true;
                break;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        assert!(stopped);

        // Joining an exited thread returns at once.
        watcher.shutdown();
    }
}
