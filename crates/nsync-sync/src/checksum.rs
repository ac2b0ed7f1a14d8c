//! Content fingerprints.
//!
//! MD5 is used for change detection only.

use std::path::Path;
use std::time::UNIX_EPOCH;

use md5::{Digest, Md5};
use nsync_core::Checksum;
use tokio::io::AsyncReadExt;

use crate::error::{Result, SyncError};

/// Default read buffer size.
pub const DEFAULT_BUFFER_SIZE: usize = 64 * 1024;

/// What the arbiter compares and stores for a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fingerprint {
    pub checksum: Checksum,
    pub size: i64,
    pub modified_ms: i64,
}

/// Streams files through MD5.
#[derive(Debug, Clone)]
pub struct ChecksumEngine {
    buffer_size: usize,
}

impl ChecksumEngine {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer_size: buffer_size.max(1),
        }
    }

    /// Digest the whole content of a file.
    pub async fn checksum(&self, path: &Path) -> Result<Checksum> {
        let io_err = |source| SyncError::Io {
            path: path.to_path_buf(),
            source,
        };

        let mut file = tokio::fs::File::open(path).await.map_err(io_err)?;
        let mut hasher = Md5::new();
        let mut buf = vec![0u8; self.buffer_size];
        loop {
            let n = file.read(&mut buf).await.map_err(io_err)?;
            if n == 0 {
                break;
            }
            hasher.update(&buf[..n]);
        }
        Ok(finish(hasher))
    }

    /// Checksum, size and modification time of a regular file.
    pub async fn fingerprint(&self, path: &Path) -> Result<Fingerprint> {
        let metadata = tokio::fs::metadata(path)
            .await
            .map_err(|source| SyncError::Io {
                path: path.to_path_buf(),
                source,
            })?;
        if !metadata.is_file() {
            return Err(SyncError::NotAFile(path.to_path_buf()));
        }

        let modified_ms = metadata
            .modified()
            .ok()
            .and_then(|t| t.duration_since(UNIX_EPOCH).ok())
            .map(|d| d.as_millis() as i64)
            .unwrap_or(0);

        Ok(Fingerprint {
            checksum: self.checksum(path).await?,
            size: metadata.len() as i64,
            modified_ms,
        })
    }
}

impl Default for ChecksumEngine {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

/// Digest an in-memory buffer.
pub fn digest(bytes: &[u8]) -> Checksum {
    let mut hasher = Md5::new();
    hasher.update(bytes);
    finish(hasher)
}

fn finish(hasher: Md5) -> Checksum {
    let mut out = [0u8; 16];
    out.copy_from_slice(&hasher.finalize());
    Checksum::from_bytes(out)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_known_digests() {
        assert_eq!(digest(b"").to_hex(), "d41d8cd98f00b204e9800998ecf8427e");
        assert_eq!(digest(b"hi").to_hex(), "49f68a5c8493ec2c0bf489821c21fc3b");
    }

    #[tokio::test]
    async fn test_file_matches_buffer_digest() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("big.bin");
        let content: Vec<u8> = (0..10_000u32).map(|n| (n % 251) as u8).collect();
        std::fs::write(&path, &content).unwrap();

        // Small buffer to force many reads.
        let engine = ChecksumEngine::new(7);
        assert_eq!(engine.checksum(&path).await.unwrap(), digest(&content));

        let fp = engine.fingerprint(&path).await.unwrap();
        assert_eq!(fp.size, 10_000);
        assert!(fp.modified_ms > 0);
    }

    #[tokio::test]
    async fn test_missing_file_is_not_found() {
        let dir = TempDir::new().unwrap();
        let err = ChecksumEngine::default()
            .fingerprint(&dir.path().join("gone"))
            .await
            .unwrap_err();
        assert!(err.is_not_found());
    }

    #[tokio::test]
    async fn test_directory_is_not_a_file() {
        let dir = TempDir::new().unwrap();
        let err = ChecksumEngine::default()
            .fingerprint(dir.path())
            .await
            .unwrap_err();
        assert!(matches!(err, SyncError::NotAFile(_)));
    }
}
