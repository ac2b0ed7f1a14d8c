//! # NSync Kernel
//!
//! The daemon: wires the signal bus, folder catalog, synchronization
//! arbiter, directory analyzer and storage drivers together.
//!
//! ## Usage
//!
//! ```rust,no_run
//! use nsync_kernel::{DaemonConfig, Kernel};
//!
//! async fn example() -> nsync_kernel::Result<()> {
//!     let config = DaemonConfig::load(&nsync_kernel::config::default_config_dir())?;
//!     let kernel = Kernel::boot(config).await?;
//!
//!     let facade = kernel.facade();
//!     facade.add_folder("file:///home/me/docs", "file:///mnt/backup/docs").await?;
//!
//!     kernel.join().await;
//!     kernel.shutdown();
//!     Ok(())
//! }
//! ```

pub mod analyzer;
pub mod config;
pub mod error;
pub mod kernel;
pub mod storage;

pub use analyzer::DirAnalyzer;
pub use config::DaemonConfig;
pub use error::{KernelError, Result};
pub use kernel::{Kernel, KernelFacade};
pub use storage::{LocalFileStorage, StorageDriver, StorageManager};

// Re-export the component crates for downstream users.
pub use nsync_bus as bus;
pub use nsync_core as core;
pub use nsync_store as store;
pub use nsync_sync as sync;
