//! File-backed durable index.
//!
//! Each folder owns two files under the metadata directory:
//!
//! - `<folderId>.index`: append-only log of `relative/path:position` lines.
//!   A negative position is a tombstone. On open the log is replayed and the
//!   last line for a path wins.
//! - `<folderId>.bin`: fixed [`RECORD_SIZE`]-byte slots. A slot is allocated
//!   once per path and overwritten in place; removed slots are not reclaimed.
//!
//! A new mapping is forced to stable storage before it becomes visible, and
//! every record write is forced before `set` returns. A torn last log line
//! left by a crash is truncated on open.
//!
//! File operations are blocking and run on `spawn_blocking`.

use std::collections::HashMap;
use std::fs::{self, File, OpenOptions};
use std::io::{ErrorKind, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use nsync_core::{DataRecord, FolderId, IndexRecord, RECORD_SIZE};
use tracing::{debug, info, warn};

use crate::error::{Result, StoreError};
use crate::traits::{Index, IndexProvider};

const SLOT: u64 = RECORD_SIZE as u64;

/// Path of a folder's index log.
pub fn index_path(dir: &Path, folder_id: &FolderId) -> PathBuf {
    dir.join(format!("{}.index", folder_id))
}

/// Path of a folder's data file.
pub fn data_path(dir: &Path, folder_id: &FolderId) -> PathBuf {
    dir.join(format!("{}.bin", folder_id))
}

struct IndexState {
    log: File,
    data: File,
    entries: HashMap<String, u64>,
    next_position: u64,
}

impl IndexState {
    fn append(&mut self, record: &IndexRecord) -> Result<()> {
        let line = record.to_line()?;
        self.log.write_all(line.as_bytes())?;
        self.log.sync_data()?;
        Ok(())
    }

    fn set(&mut self, path: &str, record: &DataRecord) -> Result<()> {
        let position = match self.entries.get(path) {
            Some(position) => *position,
            None => {
                let position = self.next_position;
                self.append(&IndexRecord::live(path, position))?;
                self.entries.insert(path.to_string(), position);
                self.next_position = position + SLOT;
                position
            }
        };

        self.data.seek(SeekFrom::Start(position))?;
        self.data.write_all(&record.to_bytes())?;
        self.data.sync_data()?;
        Ok(())
    }

    fn get(&mut self, path: &str) -> Result<Option<DataRecord>> {
        let Some(position) = self.entries.get(path).copied() else {
            return Ok(None);
        };

        let mut slot = [0u8; RECORD_SIZE];
        self.data.seek(SeekFrom::Start(position))?;
        match self.data.read_exact(&mut slot) {
            Ok(()) => Ok(DataRecord::from_bytes(&slot)?),
            // Mapping logged but record never written.
            Err(e) if e.kind() == ErrorKind::UnexpectedEof => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    fn remove(&mut self, path: &str) -> Result<bool> {
        let Some(position) = self.entries.get(path).copied() else {
            return Ok(false);
        };
        self.append(&IndexRecord::tombstone(path, position))?;
        self.entries.remove(path);
        Ok(true)
    }
}

/// Replay the log, truncating a torn tail.
///
/// Returns the live entries and the end offset of the highest slot ever
/// allocated, tombstoned slots included.
fn replay(path: &Path) -> Result<(HashMap<String, u64>, u64)> {
    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .open(path)?;

    let mut contents = Vec::new();
    file.read_to_end(&mut contents)?;

    let complete = contents
        .iter()
        .rposition(|b| *b == b'\n')
        .map(|i| i + 1)
        .unwrap_or(0);
    if complete < contents.len() {
        warn!(
            path = %path.display(),
            dropped = contents.len() - complete,
            "truncating torn index log tail"
        );
        file.set_len(complete as u64)?;
        file.sync_all()?;
    }

    let mut entries = HashMap::new();
    let mut allocated = 0u64;
    for (n, raw) in contents[..complete].split(|b| *b == b'\n').enumerate() {
        if raw.is_empty() {
            continue;
        }
        let parsed = std::str::from_utf8(raw)
            .map_err(|e| StoreError::InvalidData(e.to_string()))
            .and_then(|line| IndexRecord::parse_line(line).map_err(StoreError::from));
        let record = match parsed {
            Ok(record) => record,
            Err(e) => {
                warn!(path = %path.display(), line = n + 1, error = %e, "skipping index log line");
                continue;
            }
        };

        let end = match record.position.checked_add(SLOT) {
            Some(end) if record.position % SLOT == 0 => end,
            _ => {
                warn!(
                    path = %path.display(),
                    line = n + 1,
                    position = record.position,
                    "skipping index log line with invalid slot position"
                );
                continue;
            }
        };
        allocated = allocated.max(end);
        if record.tombstone {
            entries.remove(&record.relative_path);
        } else {
            entries.insert(record.relative_path, record.position);
        }
    }

    Ok((entries, allocated))
}

/// Durable index of one folder.
pub struct FileIndex {
    folder_id: FolderId,
    state: Arc<Mutex<IndexState>>,
}

impl FileIndex {
    /// Open or create the index of `folder_id` under `dir`.
    ///
    /// Blocking.
    pub fn open(dir: impl AsRef<Path>, folder_id: &FolderId) -> Result<Self> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir)?;

        let log_path = index_path(dir, folder_id);
        let (entries, allocated) = replay(&log_path)?;

        let log = OpenOptions::new().append(true).open(&log_path)?;
        let data = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .open(data_path(dir, folder_id))?;

        let data_len = data.metadata()?.len();
        let next_position = data_len.div_ceil(SLOT).saturating_mul(SLOT).max(allocated);

        info!(folder_id = %folder_id, entries = entries.len(), "index opened");

        Ok(Self {
            folder_id: folder_id.clone(),
            state: Arc::new(Mutex::new(IndexState {
                log,
                data,
                entries,
                next_position,
            })),
        })
    }

    pub fn folder_id(&self) -> &FolderId {
        &self.folder_id
    }

    /// Run a blocking operation under the index lock.
    async fn with_state<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut IndexState) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let state = Arc::clone(&self.state);
        tokio::task::spawn_blocking(move || {
            let mut state = state
                .lock()
                .map_err(|e| StoreError::Lock(e.to_string()))?;
            f(&mut state)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl Index for FileIndex {
    async fn set(&self, path: &str, record: DataRecord) -> Result<()> {
        let path = path.to_string();
        self.with_state(move |state| state.set(&path, &record)).await
    }

    async fn get(&self, path: &str) -> Result<Option<DataRecord>> {
        let path = path.to_string();
        self.with_state(move |state| state.get(&path)).await
    }

    async fn remove(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        let removed = self.with_state(move |state| state.remove(&path)).await?;
        debug!(folder_id = %self.folder_id, removed, "index remove");
        Ok(removed)
    }

    async fn contains(&self, path: &str) -> Result<bool> {
        let path = path.to_string();
        self.with_state(move |state| Ok(state.entries.contains_key(&path)))
            .await
    }

    async fn len(&self) -> Result<usize> {
        self.with_state(|state| Ok(state.entries.len())).await
    }

    async fn paths(&self) -> Result<Vec<String>> {
        self.with_state(|state| {
            let mut paths: Vec<String> = state.entries.keys().cloned().collect();
            paths.sort();
            Ok(paths)
        })
        .await
    }
}

/// Opens [`FileIndex`]es under one metadata directory.
pub struct FileIndexProvider {
    dir: PathBuf,
}

impl FileIndexProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

#[async_trait]
impl IndexProvider for FileIndexProvider {
    async fn open(&self, folder_id: &FolderId) -> Result<Arc<dyn Index>> {
        let dir = self.dir.clone();
        let folder_id = folder_id.clone();
        let index = tokio::task::spawn_blocking(move || FileIndex::open(dir, &folder_id))
            .await
            .map_err(|e| StoreError::Task(e.to_string()))??;
        Ok(Arc::new(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsync_core::{Checksum, SynchronizationStatus};
    use proptest::prelude::*;
    use tempfile::TempDir;

    fn record(seed: u8) -> DataRecord {
        DataRecord::pending(Checksum::from_bytes([seed; 16]), seed as i64 * 10, 1_000 + seed as i64)
    }

    fn folder() -> FolderId {
        FolderId::new("folder-1")
    }

    #[tokio::test]
    async fn test_set_get_contains() {
        let dir = TempDir::new().unwrap();
        let index = FileIndex::open(dir.path(), &folder()).unwrap();

        assert!(!index.contains("a.txt").await.unwrap());
        assert_eq!(index.get("a.txt").await.unwrap(), None);

        index.set("a.txt", record(1)).await.unwrap();
        assert!(index.contains("a.txt").await.unwrap());
        assert_eq!(index.get("a.txt").await.unwrap(), Some(record(1)));
        assert_eq!(index.len().await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_overwrite_in_place() {
        let dir = TempDir::new().unwrap();
        let index = FileIndex::open(dir.path(), &folder()).unwrap();

        index.set("a.txt", record(1)).await.unwrap();
        let updated = record(1).with_status(SynchronizationStatus::Synchronized);
        index.set("a.txt", updated).await.unwrap();

        assert_eq!(index.get("a.txt").await.unwrap(), Some(updated));
        let data_len = fs::metadata(data_path(dir.path(), &folder())).unwrap().len();
        assert_eq!(data_len, SLOT);
        let log = fs::read_to_string(index_path(dir.path(), &folder())).unwrap();
        assert_eq!(log, "a.txt:0\n");
    }

    #[tokio::test]
    async fn test_remove_writes_tombstone() {
        let dir = TempDir::new().unwrap();
        let index = FileIndex::open(dir.path(), &folder()).unwrap();

        index.set("a.txt", record(1)).await.unwrap();
        index.set("b.txt", record(2)).await.unwrap();
        assert!(index.remove("a.txt").await.unwrap());
        assert!(!index.remove("a.txt").await.unwrap());

        assert!(!index.contains("a.txt").await.unwrap());
        assert_eq!(index.get("a.txt").await.unwrap(), None);
        assert_eq!(index.paths().await.unwrap(), vec!["b.txt".to_string()]);

        let log = fs::read_to_string(index_path(dir.path(), &folder())).unwrap();
        assert_eq!(log, "a.txt:0\nb.txt:38\na.txt:-0\n");
    }

    #[tokio::test]
    async fn test_survives_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let index = FileIndex::open(dir.path(), &folder()).unwrap();
            for n in 0..20u8 {
                index.set(&format!("dir/{}.bin", n), record(n)).await.unwrap();
            }
        }

        let index = FileIndex::open(dir.path(), &folder()).unwrap();
        assert_eq!(index.len().await.unwrap(), 20);
        for n in 0..20u8 {
            assert_eq!(
                index.get(&format!("dir/{}.bin", n)).await.unwrap(),
                Some(record(n))
            );
        }
    }

    #[tokio::test]
    async fn test_tombstone_precedence_across_reopen() {
        let dir = TempDir::new().unwrap();
        {
            let index = FileIndex::open(dir.path(), &folder()).unwrap();
            index.set("a.txt", record(1)).await.unwrap();
            index.remove("a.txt").await.unwrap();
        }

        let index = FileIndex::open(dir.path(), &folder()).unwrap();
        assert!(!index.contains("a.txt").await.unwrap());

        // A re-added path gets a fresh slot; the tombstoned one is not reused.
        index.set("a.txt", record(3)).await.unwrap();
        drop(index);

        let index = FileIndex::open(dir.path(), &folder()).unwrap();
        assert_eq!(index.get("a.txt").await.unwrap(), Some(record(3)));
        let log = fs::read_to_string(index_path(dir.path(), &folder())).unwrap();
        assert_eq!(log, "a.txt:0\na.txt:-0\na.txt:38\n");
    }

    #[tokio::test]
    async fn test_torn_tail_truncated() {
        let dir = TempDir::new().unwrap();
        {
            let index = FileIndex::open(dir.path(), &folder()).unwrap();
            index.set("a.txt", record(1)).await.unwrap();
        }
        let log_path = index_path(dir.path(), &folder());
        let mut log = OpenOptions::new().append(true).open(&log_path).unwrap();
        log.write_all(b"b.tx").unwrap();
        drop(log);

        let index = FileIndex::open(dir.path(), &folder()).unwrap();
        assert_eq!(index.paths().await.unwrap(), vec!["a.txt".to_string()]);
        index.set("c.txt", record(2)).await.unwrap();
        assert_eq!(
            fs::read_to_string(&log_path).unwrap(),
            "a.txt:0\nc.txt:38\n"
        );
    }

    #[tokio::test]
    async fn test_malformed_line_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(index_path(dir.path(), &folder()), "garbage\nx:abc\n").unwrap();

        let index = FileIndex::open(dir.path(), &folder()).unwrap();
        assert_eq!(index.len().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_out_of_range_position_skipped() {
        let dir = TempDir::new().unwrap();
        fs::write(
            index_path(dir.path(), &folder()),
            "a.txt:18446744073709551615\nb.txt:39\n",
        )
        .unwrap();

        let index = FileIndex::open(dir.path(), &folder()).unwrap();
        assert_eq!(index.len().await.unwrap(), 0);

        // Nothing was allocated, so the first slot is handed out again.
        index.set("c.txt", record(3)).await.unwrap();
        assert_eq!(index.get("c.txt").await.unwrap(), Some(record(3)));
        let log = fs::read_to_string(index_path(dir.path(), &folder())).unwrap();
        assert!(log.ends_with("c.txt:0\n"));
    }

    #[tokio::test]
    async fn test_unwritten_slot_reads_absent() {
        let dir = TempDir::new().unwrap();
        fs::write(index_path(dir.path(), &folder()), "a.txt:0\n").unwrap();

        let index = FileIndex::open(dir.path(), &folder()).unwrap();
        assert!(index.contains("a.txt").await.unwrap());
        assert_eq!(index.get("a.txt").await.unwrap(), None);

        // Allocation continues past the logged slot.
        index.set("b.txt", record(2)).await.unwrap();
        let log = fs::read_to_string(index_path(dir.path(), &folder())).unwrap();
        assert_eq!(log, "a.txt:0\nb.txt:38\n");
    }

    #[tokio::test]
    async fn test_provider_opens_per_folder_files() {
        let dir = TempDir::new().unwrap();
        let provider = FileIndexProvider::new(dir.path().join("metadata"));

        let a = provider.open(&FolderId::new("a")).await.unwrap();
        let b = provider.open(&FolderId::new("b")).await.unwrap();
        a.set("x", record(1)).await.unwrap();

        assert!(!b.contains("x").await.unwrap());
        assert!(dir.path().join("metadata/a.index").exists());
        assert!(dir.path().join("metadata/b.bin").exists());
    }

    proptest! {
        #![proptest_config(ProptestConfig::with_cases(16))]

        #[test]
        fn prop_records_survive_reopen(
            records in proptest::collection::btree_map("[a-z]{1,8}(/[a-z0-9]{1,8}){0,2}", any::<u8>(), 1..30)
        ) {
            let rt = tokio::runtime::Runtime::new().unwrap();
            rt.block_on(async {
                let dir = TempDir::new().unwrap();
                {
                    let index = FileIndex::open(dir.path(), &folder()).unwrap();
                    for (path, seed) in &records {
                        index.set(path, record(*seed)).await.unwrap();
                    }
                }
                let index = FileIndex::open(dir.path(), &folder()).unwrap();
                assert_eq!(index.len().await.unwrap(), records.len());
                for (path, seed) in &records {
                    assert_eq!(index.get(path).await.unwrap(), Some(record(*seed)));
                }
            });
        }
    }
}
