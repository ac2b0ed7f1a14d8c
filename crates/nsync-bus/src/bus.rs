//! The signal bus.
//!
//! Publishers push onto one unbounded queue and return immediately. A single
//! dispatcher task drains the queue in FIFO order and forwards every signal to
//! each consumer registered for its kind, in registration order.
//!
//! Each registration owns a private queue served by its own worker task, so a
//! consumer sees signals in publish order while distinct consumers run
//! concurrently. The worker runs each `handle` call in a child task: an error
//! or a panic is logged there and the worker moves on.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tokio::task::AbortHandle;
use tracing::{debug, error, info};

use crate::consumer::Consumer;
use crate::error::{BusError, Result};
use crate::signal::{Signal, SignalKind};

/// Identifies one registration on the bus.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

/// Lifecycle of the dispatch loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BusState {
    Idle,
    Running,
    Stopped,
}

// ─────────────────────────────────────────────────────────────────────────────
// Registry
// ─────────────────────────────────────────────────────────────────────────────

struct Slot {
    name: String,
    consumer: Arc<dyn Consumer>,
    tx: mpsc::UnboundedSender<Signal>,
    /// Held until a worker is spawned for this slot.
    pending_rx: Option<mpsc::UnboundedReceiver<Signal>>,
    worker: Option<AbortHandle>,
}

impl Slot {
    fn spawn_worker(&mut self, runtime: &Handle, id: ConsumerId) {
        if let Some(rx) = self.pending_rx.take() {
            let task = runtime.spawn(run_consumer(
                id,
                self.name.clone(),
                Arc::clone(&self.consumer),
                rx,
            ));
            self.worker = Some(task.abort_handle());
        }
    }
}

#[derive(Default)]
struct Registry {
    next_id: u64,
    slots: HashMap<ConsumerId, Slot>,
    routes: HashMap<SignalKind, Vec<ConsumerId>>,
    /// Set while the bus is running.
    runtime: Option<Handle>,
}

impl Registry {
    fn targets(&self, kind: SignalKind) -> Vec<mpsc::UnboundedSender<Signal>> {
        self.routes
            .get(&kind)
            .map(|ids| {
                ids.iter()
                    .filter_map(|id| self.slots.get(id).map(|slot| slot.tx.clone()))
                    .collect()
            })
            .unwrap_or_default()
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

// ─────────────────────────────────────────────────────────────────────────────
// Bus
// ─────────────────────────────────────────────────────────────────────────────

/// In-process publish/subscribe dispatcher.
///
/// Constructed explicitly and shared as `Arc<SignalBus>`.
pub struct SignalBus {
    queue: mpsc::UnboundedSender<Signal>,
    inbox: Mutex<Option<mpsc::UnboundedReceiver<Signal>>>,
    registry: Arc<Mutex<Registry>>,
    state: Arc<watch::Sender<BusState>>,
    dispatcher: Mutex<Option<AbortHandle>>,
}

impl SignalBus {
    pub fn new() -> Self {
        let (queue, inbox) = mpsc::unbounded_channel();
        let (state, _) = watch::channel(BusState::Idle);
        Self {
            queue,
            inbox: Mutex::new(Some(inbox)),
            registry: Arc::new(Mutex::new(Registry::default())),
            state: Arc::new(state),
            dispatcher: Mutex::new(None),
        }
    }

    /// Register a consumer for one or more signal kinds.
    ///
    /// Registering the same consumer twice, or listing a kind twice, results
    /// in duplicate delivery.
    pub fn register(&self, consumer: Arc<dyn Consumer>, kinds: &[SignalKind]) -> ConsumerId {
        let mut registry = lock(&self.registry);
        let id = ConsumerId(registry.next_id);
        registry.next_id += 1;

        let (tx, rx) = mpsc::unbounded_channel();
        let name = consumer.name().to_string();
        let mut slot = Slot {
            name: name.clone(),
            consumer,
            tx,
            pending_rx: Some(rx),
            worker: None,
        };
        if let Some(runtime) = registry.runtime.clone() {
            slot.spawn_worker(&runtime, id);
        }

        registry.slots.insert(id, slot);
        for kind in kinds {
            registry.routes.entry(*kind).or_default().push(id);
        }

        debug!(consumer = %name, %id, ?kinds, "consumer registered");
        id
    }

    /// Remove a registration. Signals already queued for it are discarded.
    pub fn deregister(&self, id: ConsumerId) -> bool {
        let mut registry = lock(&self.registry);
        let Some(slot) = registry.slots.remove(&id) else {
            return false;
        };
        if let Some(worker) = slot.worker {
            worker.abort();
        }
        for ids in registry.routes.values_mut() {
            ids.retain(|existing| *existing != id);
        }
        debug!(consumer = %slot.name, %id, "consumer deregistered");
        true
    }

    /// Number of live registrations.
    pub fn consumer_count(&self) -> usize {
        lock(&self.registry).slots.len()
    }

    /// Enqueue a signal. Never blocks.
    pub fn publish(&self, signal: Signal) -> Result<()> {
        self.queue.send(signal).map_err(|_| BusError::Closed)
    }

    pub fn state(&self) -> BusState {
        *self.state.borrow()
    }

    pub fn is_running(&self) -> bool {
        self.state() == BusState::Running
    }

    /// Start the dispatch loop on the current tokio runtime.
    pub fn start(&self) -> Result<()> {
        let runtime = Handle::try_current().map_err(|_| BusError::NoRuntime)?;
        match self.state() {
            BusState::Running => return Err(BusError::AlreadyRunning),
            BusState::Stopped => return Err(BusError::Stopped),
            BusState::Idle => {}
        }
        let inbox = lock(&self.inbox).take().ok_or(BusError::AlreadyRunning)?;

        let consumers = {
            let mut registry = lock(&self.registry);
            for (id, slot) in registry.slots.iter_mut() {
                slot.spawn_worker(&runtime, *id);
            }
            registry.runtime = Some(runtime.clone());
            registry.slots.len()
        };

        self.state.send_replace(BusState::Running);
        let dispatcher = Dispatcher {
            inbox,
            registry: Arc::clone(&self.registry),
            state: Arc::clone(&self.state),
        };
        let task = runtime.spawn(dispatcher.run());
        *lock(&self.dispatcher) = Some(task.abort_handle());

        info!(consumers, "signal bus started");
        Ok(())
    }

    /// Terminate the dispatch loop and every consumer worker without draining.
    pub fn stop(&self) {
        if let Some(task) = lock(&self.dispatcher).take() {
            task.abort();
        }
        lock(&self.inbox).take();

        let mut registry = lock(&self.registry);
        registry.runtime = None;
        for slot in registry.slots.values_mut() {
            if let Some(worker) = slot.worker.take() {
                worker.abort();
            }
        }
        drop(registry);

        self.state.send_replace(BusState::Stopped);
        info!("signal bus stopped");
    }

    /// Wait until the dispatch loop has terminated.
    pub async fn join(&self) {
        let mut state = self.state.subscribe();
        let _ = state.wait_for(|s| *s == BusState::Stopped).await;
    }
}

impl Default for SignalBus {
    fn default() -> Self {
        Self::new()
    }
}

impl Drop for SignalBus {
    fn drop(&mut self) {
        if let Some(task) = lock(&self.dispatcher).take() {
            task.abort();
        }
        for slot in lock(&self.registry).slots.values_mut() {
            if let Some(worker) = slot.worker.take() {
                worker.abort();
            }
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tasks
// ─────────────────────────────────────────────────────────────────────────────

struct Dispatcher {
    inbox: mpsc::UnboundedReceiver<Signal>,
    registry: Arc<Mutex<Registry>>,
    state: Arc<watch::Sender<BusState>>,
}

impl Dispatcher {
    async fn run(mut self) {
        while let Some(signal) = self.inbox.recv().await {
            let kind = signal.kind();
            let targets = lock(&self.registry).targets(kind);

            debug!(%signal, consumers = targets.len(), "dispatching signal");
            for target in targets {
                let _ = target.send(signal.clone());
            }

            if kind == SignalKind::Stop {
                info!("stop signal delivered, dispatch loop exiting");
                break;
            }
        }
    }
}

impl Drop for Dispatcher {
    fn drop(&mut self) {
        // Refuse further publishes before reporting the loop as stopped.
        self.inbox.close();
        self.state.send_replace(BusState::Stopped);
    }
}

async fn run_consumer(
    id: ConsumerId,
    name: String,
    consumer: Arc<dyn Consumer>,
    mut rx: mpsc::UnboundedReceiver<Signal>,
) {
    while let Some(signal) = rx.recv().await {
        let label = signal.to_string();
        let handler = Arc::clone(&consumer);
        let outcome = tokio::spawn(async move { handler.handle(signal).await }).await;

        match outcome {
            Ok(Ok(())) => {}
            Ok(Err(e)) => {
                error!(consumer = %name, %id, signal = %label, error = %e, "consumer failed");
            }
            Err(e) if e.is_panic() => {
                error!(consumer = %name, %id, signal = %label, "consumer panicked");
            }
            Err(_) => break,
        }
    }
}
