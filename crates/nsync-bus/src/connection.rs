//! Request/response on top of the broadcast bus.
//!
//! A [`Connection`] subscribes to the reply kinds before the request is
//! published, then waits for a matching signal with a bounded timeout.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::bus::{ConsumerId, SignalBus};
use crate::consumer::Consumer;
use crate::error::{BusError, ConsumerError, Result};
use crate::signal::{Signal, SignalKind};

/// Default wait for a correlated reply.
pub const DEFAULT_RESPONSE_TIMEOUT: Duration = Duration::from_millis(500);

struct Forwarder {
    tx: mpsc::UnboundedSender<Signal>,
}

#[async_trait]
impl Consumer for Forwarder {
    fn name(&self) -> &str {
        "connection"
    }

    async fn handle(&self, signal: Signal) -> std::result::Result<(), ConsumerError> {
        // The receiving side may already be gone.
        let _ = self.tx.send(signal);
        Ok(())
    }
}

/// A private subscription to a set of signal kinds.
///
/// Dropping the connection removes its registration from the bus.
pub struct Connection {
    bus: Arc<SignalBus>,
    id: ConsumerId,
    rx: mpsc::UnboundedReceiver<Signal>,
}

impl SignalBus {
    /// Open a connection receiving every signal of the given kinds.
    pub fn connect(self: &Arc<Self>, kinds: &[SignalKind]) -> Connection {
        let (tx, rx) = mpsc::unbounded_channel();
        let id = self.register(Arc::new(Forwarder { tx }), kinds);
        Connection {
            bus: Arc::clone(self),
            id,
            rx,
        }
    }
}

impl Connection {
    /// Publish a signal on the underlying bus.
    pub fn send(&self, signal: Signal) -> Result<()> {
        self.bus.publish(signal)
    }

    /// Wait for the next signal.
    pub async fn receive(&mut self, timeout: Duration) -> Result<Signal> {
        match tokio::time::timeout(timeout, self.rx.recv()).await {
            Ok(Some(signal)) => Ok(signal),
            Ok(None) => Err(BusError::Closed),
            Err(_) => Err(BusError::NoResponse(timeout.as_millis() as u64)),
        }
    }

    /// Wait for the next signal accepted by `matches`, discarding others.
    ///
    /// The timeout bounds the whole wait, not each signal.
    pub async fn receive_matching<F>(&mut self, timeout: Duration, mut matches: F) -> Result<Signal>
    where
        F: FnMut(&Signal) -> bool,
    {
        let deadline = Instant::now() + timeout;
        loop {
            match tokio::time::timeout_at(deadline, self.rx.recv()).await {
                Ok(Some(signal)) if matches(&signal) => return Ok(signal),
                Ok(Some(_)) => continue,
                Ok(None) => return Err(BusError::Closed),
                Err(_) => return Err(BusError::NoResponse(timeout.as_millis() as u64)),
            }
        }
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.bus.deregister(self.id);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use nsync_core::{FolderId, FolderRequest, LocalFile};

    #[tokio::test]
    async fn test_receive_times_out() {
        let bus = Arc::new(SignalBus::new());
        bus.start().unwrap();
        let mut conn = bus.connect(&[SignalKind::FolderAdded]);

        let err = conn.receive(Duration::from_millis(50)).await.unwrap_err();
        assert!(matches!(err, BusError::NoResponse(50)));
    }

    #[tokio::test]
    async fn test_send_and_receive() {
        let bus = Arc::new(SignalBus::new());
        bus.start().unwrap();
        let mut conn = bus.connect(&[SignalKind::AddFolder]);

        let request = Signal::AddFolder(FolderRequest::new("file:///tmp/a", "file:///tmp/b"));
        conn.send(request.clone()).unwrap();
        assert_eq!(conn.receive(DEFAULT_RESPONSE_TIMEOUT).await.unwrap(), request);
    }

    #[tokio::test]
    async fn test_receive_matching_skips_others() {
        let bus = Arc::new(SignalBus::new());
        bus.start().unwrap();
        let mut conn = bus.connect(&[SignalKind::FileModified]);

        for name in ["a", "b", "c"] {
            bus.publish(Signal::FileModified(LocalFile::changed(
                FolderId::new("f"),
                format!("/tmp/{}", name),
            )))
            .unwrap();
        }

        let got = conn
            .receive_matching(Duration::from_secs(2), |s| {
                matches!(s, Signal::FileModified(f) if f.path.ends_with("c"))
            })
            .await
            .unwrap();
        assert!(matches!(got, Signal::FileModified(f) if f.path.ends_with("c")));
    }

    #[tokio::test]
    async fn test_drop_deregisters() {
        let bus = Arc::new(SignalBus::new());
        let conn = bus.connect(&[SignalKind::Stop]);
        assert_eq!(bus.consumer_count(), 1);
        drop(conn);
        assert_eq!(bus.consumer_count(), 0);
    }
}
