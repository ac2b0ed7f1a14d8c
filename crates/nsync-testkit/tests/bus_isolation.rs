//! Consumer failures stay contained at the dispatch boundary.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use nsync_bus::{BusState, Signal, SignalBus, SignalKind};
use nsync_core::{FolderId, LocalFile};
use nsync_testkit::{init_tracing, FailingConsumer, PanickingConsumer, RecordingConsumer};

fn modified(name: &str) -> Signal {
    Signal::FileModified(LocalFile::changed(FolderId::new("f"), PathBuf::from(name)))
}

#[tokio::test]
async fn test_failing_and_panicking_consumers_are_isolated() {
    init_tracing();
    let bus = Arc::new(SignalBus::new());
    let recorder = Arc::new(RecordingConsumer::new());

    bus.register(Arc::new(FailingConsumer), &[SignalKind::FileModified]);
    bus.register(Arc::new(PanickingConsumer), &[SignalKind::FileModified]);
    bus.register(recorder.clone(), &[SignalKind::FileModified]);
    bus.start().unwrap();

    for name in ["/a/1", "/a/2", "/a/3"] {
        bus.publish(modified(name)).unwrap();
    }

    assert!(recorder.wait_for(3, Duration::from_secs(2)).await);
    assert_eq!(
        recorder.signals(),
        vec![modified("/a/1"), modified("/a/2"), modified("/a/3")]
    );
    assert_eq!(bus.state(), BusState::Running);

    // Still dispatching after the failures.
    bus.publish(modified("/a/4")).unwrap();
    assert!(recorder.wait_for(4, Duration::from_secs(2)).await);
}

#[tokio::test]
async fn test_recorder_only_sees_its_kinds() {
    let bus = Arc::new(SignalBus::new());
    let recorder = Arc::new(RecordingConsumer::new());
    bus.register(recorder.clone(), &[SignalKind::FileDeleted]);
    bus.start().unwrap();

    bus.publish(modified("/a/1")).unwrap();
    let deleted = Signal::FileDeleted(LocalFile::deleted(FolderId::new("f"), "/a/1"));
    bus.publish(deleted.clone()).unwrap();

    assert!(recorder.wait_for(1, Duration::from_secs(2)).await);
    tokio::time::sleep(Duration::from_millis(50)).await;
    assert_eq!(recorder.signals(), vec![deleted]);
}
