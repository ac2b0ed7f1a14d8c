//! The consumer seam.

use async_trait::async_trait;

use crate::error::ConsumerError;
use crate::signal::Signal;

/// Handler invoked by the bus for the signal kinds it was registered for.
///
/// A consumer receives signals in publish order. Errors and panics raised by
/// `handle` are logged by the bus and never reach the publisher.
#[async_trait]
pub trait Consumer: Send + Sync + 'static {
    /// Name used in log output.
    fn name(&self) -> &str {
        std::any::type_name::<Self>()
    }

    async fn handle(&self, signal: Signal) -> Result<(), ConsumerError>;
}
