//! End-to-end helpers that wait on a running kernel.

use std::time::Duration;

use nsync_bus::{Connection, Signal};
use nsync_core::{DataRecord, SyncFolder, SynchronizationStatus};
use nsync_kernel::Kernel;

use crate::fixtures::{wait_until, TestFixture};

/// Default deadline for anything crossing the watcher, bus and driver.
pub const SCENARIO_TIMEOUT: Duration = Duration::from_secs(5);

/// Receive the next signal accepted by `matches`, panicking on timeout.
pub async fn expect_signal<F>(conn: &mut Connection, matches: F) -> Signal
where
    F: FnMut(&Signal) -> bool,
{
    match conn.receive_matching(SCENARIO_TIMEOUT, matches).await {
        Ok(signal) => signal,
        Err(e) => panic!("expected signal did not arrive: {}", e),
    }
}

/// Whether no signal arrives on `conn` for `quiet`.
pub async fn expect_silence(conn: &mut Connection, quiet: Duration) -> bool {
    conn.receive(quiet).await.is_err()
}

/// Wait until the arbiter holds a record for `relative` with `status`.
pub async fn wait_for_record(
    kernel: &Kernel,
    folder: &SyncFolder,
    relative: &str,
    status: SynchronizationStatus,
) -> Option<DataRecord> {
    let arbiter = kernel.arbiter();
    let reached = wait_until(SCENARIO_TIMEOUT, || async {
        matches!(
            arbiter.record(folder.folder_id(), relative).await,
            Ok(Some(record)) if record.status == status
        )
    })
    .await;
    if !reached {
        return None;
    }
    arbiter.record(folder.folder_id(), relative).await.ok().flatten()
}

/// Wait until the remote copy of `relative` has `content`, or is absent
/// when `content` is `None`.
pub async fn wait_for_remote(fixture: &TestFixture, relative: &str, content: Option<&str>) -> bool {
    wait_until(SCENARIO_TIMEOUT, || async {
        fixture.remote_content(relative).as_deref() == content
    })
    .await
}
