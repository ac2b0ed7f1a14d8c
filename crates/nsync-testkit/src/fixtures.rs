//! Test fixtures and helpers.
//!
//! Common setup code for integration tests.

use std::future::Future;
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use nsync_bus::{Consumer, ConsumerError, Signal};
use nsync_kernel::{DaemonConfig, Kernel};
use tempfile::TempDir;

/// A temporary workspace with a local folder, a remote folder and a daemon
/// configuration rooted inside it.
pub struct TestFixture {
    pub dir: TempDir,
    pub local: PathBuf,
    pub remote: PathBuf,
    pub config: DaemonConfig,
    staging: PathBuf,
}

impl TestFixture {
    /// Create the directory layout. The remote folder is left for the driver
    /// to create.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("failed to create temp dir");
        let local = dir.path().join("local");
        let remote = dir.path().join("remote");
        let staging = dir.path().join("staging");
        std::fs::create_dir_all(&local).expect("failed to create local folder");
        std::fs::create_dir_all(&staging).expect("failed to create staging dir");

        let config = DaemonConfig::with_config_dir(dir.path().join("config"));
        Self {
            dir,
            local,
            remote,
            config,
            staging,
        }
    }

    /// `file://` URI of a path.
    pub fn uri(path: &Path) -> String {
        format!("file://{}", path.display())
    }

    pub fn local_uri(&self) -> String {
        Self::uri(&self.local)
    }

    pub fn remote_uri(&self) -> String {
        Self::uri(&self.remote)
    }

    /// Boot a kernel on this fixture's configuration.
    pub async fn boot(&self) -> Kernel {
        Kernel::boot(self.config.clone())
            .await
            .expect("failed to boot kernel")
    }

    /// Replace a local file atomically, creating parent directories.
    ///
    /// The content is staged outside the watched folder and renamed into
    /// place, so the watcher never observes a partial write.
    pub fn put(&self, relative: &str, content: &str) -> PathBuf {
        let target = self.local.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        let staged = self.staging.join("staged.tmp");
        std::fs::write(&staged, content).expect("failed to stage file");
        std::fs::rename(&staged, &target).expect("failed to move file into place");
        target
    }

    /// Write a local file directly.
    pub fn write(&self, relative: &str, content: &str) -> PathBuf {
        let target = self.local.join(relative);
        if let Some(parent) = target.parent() {
            std::fs::create_dir_all(parent).expect("failed to create parent dir");
        }
        std::fs::write(&target, content).expect("failed to write file");
        target
    }

    pub fn remove(&self, relative: &str) {
        std::fs::remove_file(self.local.join(relative)).expect("failed to remove file");
    }

    /// Content of the remote copy, if it exists.
    pub fn remote_content(&self, relative: &str) -> Option<String> {
        std::fs::read_to_string(self.remote.join(relative)).ok()
    }
}

impl Default for TestFixture {
    fn default() -> Self {
        Self::new()
    }
}

/// Install a test subscriber honouring `RUST_LOG`. Safe to call repeatedly.
pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

/// Poll `condition` until it holds or `timeout` elapses.
pub async fn wait_until<F, Fut>(timeout: Duration, mut condition: F) -> bool
where
    F: FnMut() -> Fut,
    Fut: Future<Output = bool>,
{
    let deadline = Instant::now() + timeout;
    loop {
        if condition().await {
            return true;
        }
        if Instant::now() >= deadline {
            return false;
        }
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Consumers
// ─────────────────────────────────────────────────────────────────────────────

/// Remembers every signal it handles.
#[derive(Default)]
pub struct RecordingConsumer {
    signals: Mutex<Vec<Signal>>,
}

impl RecordingConsumer {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn signals(&self) -> Vec<Signal> {
        self.signals.lock().expect("recorder lock poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.signals.lock().expect("recorder lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Wait until at least `n` signals were recorded.
    pub async fn wait_for(&self, n: usize, timeout: Duration) -> bool {
        wait_until(timeout, || async { self.len() >= n }).await
    }
}

#[async_trait]
impl Consumer for RecordingConsumer {
    fn name(&self) -> &str {
        "recording"
    }

    async fn handle(&self, signal: Signal) -> Result<(), ConsumerError> {
        self.signals.lock().expect("recorder lock poisoned").push(signal);
        Ok(())
    }
}

/// Fails on every signal.
#[derive(Default)]
pub struct FailingConsumer;

#[async_trait]
impl Consumer for FailingConsumer {
    fn name(&self) -> &str {
        "failing"
    }

    async fn handle(&self, signal: Signal) -> Result<(), ConsumerError> {
        Err(format!("refusing {}", signal).into())
    }
}

/// Panics on every signal.
#[derive(Default)]
pub struct PanickingConsumer;

#[async_trait]
impl Consumer for PanickingConsumer {
    fn name(&self) -> &str {
        "panicking"
    }

    async fn handle(&self, signal: Signal) -> Result<(), ConsumerError> {
        panic!("cannot handle {}", signal);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fixture_layout() {
        let fixture = TestFixture::new();
        assert!(fixture.local.is_dir());
        assert!(!fixture.remote.exists());
        assert!(fixture.local_uri().starts_with("file:///"));
        assert_eq!(fixture.config.metadata_dir(), fixture.dir.path().join("config/metadata"));
    }

    #[test]
    fn test_put_creates_parents() {
        let fixture = TestFixture::new();
        let path = fixture.put("deep/nested/x.txt", "hi");
        assert_eq!(std::fs::read_to_string(path).unwrap(), "hi");
        assert_eq!(fixture.remote_content("deep/nested/x.txt"), None);
    }

    #[tokio::test]
    async fn test_wait_until_times_out() {
        assert!(!wait_until(Duration::from_millis(50), || async { false }).await);
        assert!(wait_until(Duration::from_millis(50), || async { true }).await);
    }
}
