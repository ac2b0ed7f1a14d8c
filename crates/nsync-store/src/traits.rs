//! Storage traits: the per-folder index and the catalog key-value adapter.
//!
//! The arbiter and the catalog only see these traits. Implementations include
//! the file-backed index and SQLite catalog (primary) and in-memory doubles
//! (for tests).

use std::sync::Arc;

use async_trait::async_trait;
use nsync_core::{DataRecord, FolderId, SyncFolder};

use crate::error::{Result, StoreError};

/// Key prefix of folder definitions in the catalog store.
pub const FOLDER_KEY_PREFIX: &str = "folder/";

/// Durable mapping from relative path to [`DataRecord`] for one folder.
///
/// Every operation is mutually exclusive with every other operation on the
/// same index.
#[async_trait]
pub trait Index: Send + Sync {
    /// Insert or overwrite the record for `path`.
    async fn set(&self, path: &str, record: DataRecord) -> Result<()>;

    /// Read the record for `path`, if any.
    async fn get(&self, path: &str) -> Result<Option<DataRecord>>;

    /// Forget `path`. Returns whether it was present.
    async fn remove(&self, path: &str) -> Result<bool>;

    async fn contains(&self, path: &str) -> Result<bool>;

    /// Number of live paths.
    async fn len(&self) -> Result<usize>;

    async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// Live paths in ascending order.
    async fn paths(&self) -> Result<Vec<String>>;
}

/// Opens the index of a folder.
#[async_trait]
pub trait IndexProvider: Send + Sync {
    async fn open(&self, folder_id: &FolderId) -> Result<Arc<dyn Index>>;
}

/// Key-value persistence for the folder catalog.
#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()>;

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>>;

    /// All entries whose key starts with `prefix`, ordered by key.
    async fn entries(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>>;

    // ─────────────────────────────────────────────────────────────────────────
    // Folder helpers
    // ─────────────────────────────────────────────────────────────────────────

    /// Persist a folder definition under `folder/<id>`.
    async fn save_folder(&self, folder: &SyncFolder) -> Result<()> {
        let key = folder_key(folder.folder_id());
        self.put(&key, encode_folder(folder)?).await
    }

    /// Load every persisted folder definition.
    async fn load_folders(&self) -> Result<Vec<SyncFolder>> {
        self.entries(FOLDER_KEY_PREFIX)
            .await?
            .into_iter()
            .map(|(_, value)| decode_folder(&value))
            .collect()
    }
}

/// Catalog key of a folder definition.
pub fn folder_key(folder_id: &FolderId) -> String {
    format!("{}{}", FOLDER_KEY_PREFIX, folder_id)
}

/// Encode a folder as CBOR.
pub fn encode_folder(folder: &SyncFolder) -> Result<Vec<u8>> {
    let mut buf = Vec::new();
    ciborium::into_writer(folder, &mut buf)
        .map_err(|e| StoreError::Serialization(e.to_string()))?;
    Ok(buf)
}

/// Decode a folder from CBOR.
pub fn decode_folder(bytes: &[u8]) -> Result<SyncFolder> {
    ciborium::from_reader(bytes).map_err(|e| StoreError::Serialization(e.to_string()))
}
