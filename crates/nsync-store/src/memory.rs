//! In-memory implementations of the storage traits.
//!
//! These are primarily for testing. They have the same semantics as the
//! file index and SQLite catalog but keep everything in memory.

use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex, RwLock};

use async_trait::async_trait;
use nsync_core::{DataRecord, FolderId};

use crate::error::{Result, StoreError};
use crate::traits::{CatalogStore, Index, IndexProvider};

fn poisoned<E: std::fmt::Display>(e: E) -> StoreError {
    StoreError::Lock(e.to_string())
}

/// In-memory index.
#[derive(Default)]
pub struct MemoryIndex {
    records: RwLock<BTreeMap<String, DataRecord>>,
}

impl MemoryIndex {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Index for MemoryIndex {
    async fn set(&self, path: &str, record: DataRecord) -> Result<()> {
        self.records
            .write()
            .map_err(poisoned)?
            .insert(path.to_string(), record);
        Ok(())
    }

    async fn get(&self, path: &str) -> Result<Option<DataRecord>> {
        Ok(self.records.read().map_err(poisoned)?.get(path).copied())
    }

    async fn remove(&self, path: &str) -> Result<bool> {
        Ok(self.records.write().map_err(poisoned)?.remove(path).is_some())
    }

    async fn contains(&self, path: &str) -> Result<bool> {
        Ok(self.records.read().map_err(poisoned)?.contains_key(path))
    }

    async fn len(&self) -> Result<usize> {
        Ok(self.records.read().map_err(poisoned)?.len())
    }

    async fn paths(&self) -> Result<Vec<String>> {
        Ok(self.records.read().map_err(poisoned)?.keys().cloned().collect())
    }
}

/// Hands out one [`MemoryIndex`] per folder, reusing it on reopen.
#[derive(Default)]
pub struct MemoryIndexProvider {
    indexes: Mutex<HashMap<FolderId, Arc<MemoryIndex>>>,
}

impl MemoryIndexProvider {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl IndexProvider for MemoryIndexProvider {
    async fn open(&self, folder_id: &FolderId) -> Result<Arc<dyn Index>> {
        let mut indexes = self.indexes.lock().map_err(poisoned)?;
        let index = indexes
            .entry(folder_id.clone())
            .or_insert_with(|| Arc::new(MemoryIndex::new()));
        Ok(Arc::clone(index) as Arc<dyn Index>)
    }
}

/// In-memory catalog store.
#[derive(Default)]
pub struct MemoryCatalogStore {
    entries: RwLock<BTreeMap<String, Vec<u8>>>,
}

impl MemoryCatalogStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CatalogStore for MemoryCatalogStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        self.entries
            .write()
            .map_err(poisoned)?
            .insert(key.to_string(), value);
        Ok(())
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        Ok(self.entries.read().map_err(poisoned)?.get(key).cloned())
    }

    async fn entries(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self
            .entries
            .read()
            .map_err(poisoned)?
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect())
    }
}
