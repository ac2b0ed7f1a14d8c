//! # NSync Bus
//!
//! Typed publish/subscribe connecting the watcher, the arbiter, the folder
//! catalog and the storage drivers.
//!
//! ## Guarantees
//!
//! - `publish` never blocks
//! - a consumer receives signals in publish order
//! - a failing or panicking consumer never affects other consumers or the
//!   dispatch loop
//!
//! Request/response is layered on top with [`Connection`].

pub mod bus;
pub mod connection;
pub mod consumer;
pub mod error;
pub mod signal;

pub use bus::{BusState, ConsumerId, SignalBus};
pub use connection::{Connection, DEFAULT_RESPONSE_TIMEOUT};
pub use consumer::Consumer;
pub use error::{BusError, ConsumerError, Result};
pub use signal::{Signal, SignalKind};
