//! Daemon configuration (`<config_dir>/config.toml`).
//!
//! Every setting is optional. A missing file yields the defaults.

use std::path::{Path, PathBuf};
use std::time::Duration;

use directories::BaseDirs;
use serde::{Deserialize, Serialize};

use crate::error::{KernelError, Result};

/// Config file name inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Default REST port.
pub const DEFAULT_PORT: u16 = 1982;

/// Default transfer chunk size (1 MiB).
pub const DEFAULT_CHUNK_SIZE: usize = 1024 * 1024;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DaemonConfig {
    /// Directory holding this file, the catalog, the metadata and the log.
    #[serde(skip)]
    pub config_dir: PathBuf,

    /// Defaults to `<config_dir>/metadata`.
    pub metadata_dir: Option<PathBuf>,

    /// Defaults to `<config_dir>/catalog.db`.
    pub catalog_path: Option<PathBuf>,

    pub port: u16,

    pub log_level: String,

    /// Wait for correlated bus replies.
    pub response_timeout_ms: u64,

    pub transfer_chunk_size: usize,

    pub checksum_buffer_size: usize,
}

impl Default for DaemonConfig {
    fn default() -> Self {
        Self {
            config_dir: default_config_dir(),
            metadata_dir: None,
            catalog_path: None,
            port: DEFAULT_PORT,
            log_level: "info".to_string(),
            response_timeout_ms: nsync_bus::DEFAULT_RESPONSE_TIMEOUT.as_millis() as u64,
            transfer_chunk_size: DEFAULT_CHUNK_SIZE,
            checksum_buffer_size: nsync_sync::DEFAULT_BUFFER_SIZE,
        }
    }
}

/// `~/.config/nsync` on Linux, the platform equivalent elsewhere.
pub fn default_config_dir() -> PathBuf {
    BaseDirs::new()
        .map(|dirs| dirs.config_dir().join("nsync"))
        .unwrap_or_else(|| PathBuf::from(".nsync"))
}

impl DaemonConfig {
    /// Defaults rooted at `config_dir`.
    pub fn with_config_dir(config_dir: impl Into<PathBuf>) -> Self {
        Self {
            config_dir: config_dir.into(),
            ..Self::default()
        }
    }

    /// Load `<config_dir>/config.toml`.
    ///
    /// Returns defaults if the file doesn't exist.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be read or parsed.
    pub fn load(config_dir: &Path) -> Result<Self> {
        let path = config_dir.join(CONFIG_FILE);
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(&path)?;
            toml::from_str::<Self>(&content)
                .map_err(|e| KernelError::Config(format!("{}: {}", path.display(), e)))?
        } else {
            Self::default()
        };
        config.config_dir = config_dir.to_path_buf();
        Ok(config)
    }

    pub fn metadata_dir(&self) -> PathBuf {
        self.metadata_dir
            .clone()
            .unwrap_or_else(|| self.config_dir.join("metadata"))
    }

    pub fn catalog_path(&self) -> PathBuf {
        self.catalog_path
            .clone()
            .unwrap_or_else(|| self.config_dir.join("catalog.db"))
    }

    /// Daemon log file used when not logging to the terminal.
    pub fn log_path(&self) -> PathBuf {
        self.config_dir.join("log")
    }

    pub fn response_timeout(&self) -> Duration {
        Duration::from_millis(self.response_timeout_ms)
    }
}
