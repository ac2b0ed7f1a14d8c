//! SQLite implementation of the catalog store.
//!
//! Uses rusqlite with bundled SQLite, wrapped in async via
//! `tokio::task::spawn_blocking`.

use std::path::Path;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StoreError};
use crate::migration;
use crate::traits::CatalogStore;

/// SQLite-based catalog store.
///
/// Thread-safe via internal Mutex.
pub struct SqliteCatalogStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteCatalogStore {
    /// Open a SQLite database at the given path.
    ///
    /// Creates the file and runs migrations if it doesn't exist.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let mut conn = Connection::open(path)?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Open an in-memory SQLite database.
    pub fn open_memory() -> Result<Self> {
        let mut conn = Connection::open_in_memory()?;
        migration::migrate(&mut conn)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    /// Execute a blocking operation on the connection.
    async fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|e| {
                StoreError::Database(rusqlite::Error::SqliteFailure(
                    rusqlite::ffi::Error::new(rusqlite::ffi::SQLITE_LOCKED),
                    Some(format!("mutex poisoned: {}", e)),
                ))
            })?;
            f(&conn)
        })
        .await
        .map_err(|e| StoreError::Task(e.to_string()))?
    }
}

#[async_trait]
impl CatalogStore for SqliteCatalogStore {
    async fn put(&self, key: &str, value: Vec<u8>) -> Result<()> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.execute(
                "INSERT INTO catalog (key, value, updated_at) VALUES (?1, ?2, ?3)
                 ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at",
                params![key, value, nsync_core::now_millis()],
            )?;
            Ok(())
        })
        .await
    }

    async fn get(&self, key: &str) -> Result<Option<Vec<u8>>> {
        let key = key.to_string();
        self.with_conn(move |conn| {
            conn.query_row(
                "SELECT value FROM catalog WHERE key = ?1",
                params![key],
                |row| row.get(0),
            )
            .optional()
            .map_err(StoreError::from)
        })
        .await
    }

    async fn entries(&self, prefix: &str) -> Result<Vec<(String, Vec<u8>)>> {
        let prefix = prefix.to_string();
        self.with_conn(move |conn| {
            let mut stmt = conn.prepare(
                "SELECT key, value FROM catalog
                 WHERE substr(key, 1, length(?1)) = ?1
                 ORDER BY key",
            )?;
            let rows = stmt
                .query_map(params![prefix], |row| Ok((row.get(0)?, row.get(1)?)))?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsync_core::SyncFolder;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_put_get_overwrite() {
        let store = SqliteCatalogStore::open_memory().unwrap();
        assert_eq!(store.get("k").await.unwrap(), None);

        store.put("k", vec![1, 2]).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(vec![1, 2]));

        store.put("k", vec![3]).await.unwrap();
        assert_eq!(store.get("k").await.unwrap(), Some(vec![3]));
    }

    #[tokio::test]
    async fn test_entries_by_prefix() {
        let store = SqliteCatalogStore::open_memory().unwrap();
        store.put("folder/b", vec![2]).await.unwrap();
        store.put("folder/a", vec![1]).await.unwrap();
        store.put("settings", vec![9]).await.unwrap();

        let entries = store.entries("folder/").await.unwrap();
        assert_eq!(
            entries,
            vec![
                ("folder/a".to_string(), vec![1]),
                ("folder/b".to_string(), vec![2])
            ]
        );
    }

    #[tokio::test]
    async fn test_folders_persist_across_reopen() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("catalog.db");
        let folder = SyncFolder::new("uid", "file:///tmp/a", "file:///tmp/b").unwrap();

        {
            let store = SqliteCatalogStore::open(&path).unwrap();
            store.save_folder(&folder).await.unwrap();
        }

        let store = SqliteCatalogStore::open(&path).unwrap();
        assert_eq!(store.load_folders().await.unwrap(), vec![folder]);
    }
}
