//! Folders and index records survive a daemon restart.

use std::path::Path;
use std::time::{Duration, Instant};

use nsync_kernel::core::{SyncFolder, SynchronizationStatus};
use nsync_kernel::{DaemonConfig, Kernel};
use tempfile::TempDir;

const WAIT: Duration = Duration::from_secs(5);

fn uri(path: &Path) -> String {
    format!("file://{}", path.display())
}

async fn wait_synchronized(kernel: &Kernel, folder: &SyncFolder, relative: &str) {
    let deadline = Instant::now() + WAIT;
    loop {
        let record = kernel.arbiter().record(folder.folder_id(), relative).await.unwrap();
        if record.map(|r| r.status) == Some(SynchronizationStatus::Synchronized) {
            return;
        }
        assert!(Instant::now() < deadline, "{} never synchronized", relative);
        tokio::time::sleep(Duration::from_millis(20)).await;
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_restart_resumes_folders() {
    let dir = TempDir::new().unwrap();
    let config_dir = dir.path().join("config");
    let local = dir.path().join("a");
    let remote = dir.path().join("b");
    std::fs::create_dir_all(&local).unwrap();
    std::fs::write(local.join("x.txt"), "hi").unwrap();

    let folder = {
        let kernel = Kernel::boot(DaemonConfig::with_config_dir(&config_dir)).await.unwrap();
        let folder = kernel
            .facade()
            .add_folder(&uri(&local), &uri(&remote))
            .await
            .unwrap();
        wait_synchronized(&kernel, &folder, "x.txt").await;
        kernel.shutdown();
        folder
    };

    // Written while the daemon is down.
    std::fs::write(local.join("y.txt"), "offline").unwrap();

    let kernel = Kernel::boot(DaemonConfig::with_config_dir(&config_dir)).await.unwrap();

    let folders = kernel.facade().folders().await;
    assert_eq!(folders, vec![folder.clone()]);

    let record = kernel
        .arbiter()
        .record(folder.folder_id(), "x.txt")
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, SynchronizationStatus::Synchronized);

    // The startup scan picks up the file written while down.
    wait_synchronized(&kernel, &folder, "y.txt").await;
    assert_eq!(std::fs::read_to_string(remote.join("y.txt")).unwrap(), "offline");

    // The remote is still taken.
    assert!(kernel
        .facade()
        .add_folder(&uri(&dir.path().join("c")), &uri(&remote))
        .await
        .is_err());

    kernel.shutdown();
}
