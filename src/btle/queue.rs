//! Transaction queue: public face of the dispatcher.
//!
//! ```text
//!  BtleQueue::enqueue ─┐                       ┌─▶ GattLink
//!  QueueHandle::insert ┼─▶ pending deque ──▶ dispatcher thread
//!  LinkEventSender ────┴─▶ event channel ──┘   └─▶ GattCallback / EventSink
//! ```
//!
//! [`BtleQueue`] owns the dispatcher thread and tears it down on `dispose()`
//! or drop. [`QueueHandle`] is the cloneable capability drivers and
//! callbacks use to enqueue work and read the connection state.

use std::sync::Arc;
use std::thread::JoinHandle;

use log::{debug, info, warn};

use super::channels::Shared;
use super::dispatch::Dispatcher;
use super::link::{GattLink, LinkEventSender};
use super::state::ConnectionState;
use super::transaction::Transaction;
use crate::app::events::EngineEvent;
use crate::app::ports::{EventSink, GattCallback};
use crate::config::QueueConfig;
use crate::error::QueueError;

// ── Handle ───────────────────────────────────────────────────

/// Cloneable enqueue / state-read capability.
#[derive(Clone)]
pub struct QueueHandle {
    shared: Arc<Shared>,
}

impl QueueHandle {
    pub(crate) fn new(shared: Arc<Shared>) -> Self {
        Self { shared }
    }

    pub(crate) fn shared(&self) -> &Arc<Shared> {
        &self.shared
    }

    /// Append a transaction. Empty transactions are silently skipped.
    pub fn enqueue(&self, transaction: Transaction) -> Result<(), QueueError> {
        if transaction.is_empty() {
            debug!("skipping empty transaction '{}'", transaction.name());
            return Ok(());
        }
        debug!("enqueue '{}'", transaction.name());
        self.shared.push_back(transaction)
    }

    /// Put a transaction ahead of everything still pending. The one
    /// currently running finishes first.
    pub fn insert(&self, transaction: Transaction) -> Result<(), QueueError> {
        if transaction.is_empty() {
            debug!("skipping empty transaction '{}'", transaction.name());
            return Ok(());
        }
        debug!("insert '{}'", transaction.name());
        self.shared.push_front(transaction)
    }

    pub fn state(&self) -> ConnectionState {
        self.shared.state()
    }

    pub fn is_connected(&self) -> bool {
        self.state().is_connected()
    }

    pub fn is_initialized(&self) -> bool {
        self.state() == ConnectionState::Initialized
    }

    /// Number of transactions waiting to start.
    pub fn len(&self) -> usize {
        self.shared.pending_len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

// ── Queue ────────────────────────────────────────────────────

/// Serializes GATT work for one remote device.
pub struct BtleQueue {
    handle: QueueHandle,
    worker: Option<JoinHandle<()>>,
}

impl BtleQueue {
    /// Spawn the dispatcher thread.
    ///
    /// `callback` receives every link event not consumed by a
    /// transaction-scoped callback; `sink` receives engine events.
    pub fn new(
        link: impl GattLink + 'static,
        callback: Option<Arc<dyn GattCallback>>,
        sink: impl EventSink + 'static,
        config: &QueueConfig,
    ) -> Result<Self, QueueError> {
        let shared = Arc::new(Shared::new(Box::new(link), Box::new(sink)));
        let handle = QueueHandle::new(shared.clone());
        let dispatcher = Dispatcher::new(handle.clone(), callback, config.auto_reconnect);

        let worker = std::thread::Builder::new()
            .name(config.thread_name.clone())
            .stack_size(config.stack_kb as usize * 1024)
            .spawn(move || dispatcher.run_thread())
            .map_err(|e| {
                warn!("failed to spawn dispatcher: {}", e);
                QueueError::Spawn
            })?;

        info!("queue started ('{}')", config.thread_name);
        Ok(Self {
            handle,
            worker: Some(worker),
        })
    }

    pub(crate) fn shared(&self) -> &Shared {
        &self.handle.shared
    }

    pub fn handle(&self) -> QueueHandle {
        self.handle.clone()
    }

    /// Start connecting. Returns `false` when already connected or
    /// connecting, when the queue is closed, or when the link refuses.
    pub fn connect(&self) -> bool {
        let shared = self.shared();
        if !shared.is_alive() {
            warn!("connect on a closed queue");
            return false;
        }
        let prev = shared.state();
        if !matches!(
            prev,
            ConnectionState::NotConnected | ConnectionState::WaitingForReconnect
        ) {
            debug!("connect ignored in state {:?}", prev);
            return false;
        }

        let Ok(mut link) = shared.lock_link() else {
            return false;
        };
        // Set before the link can report `Connected`.
        shared.set_state(ConnectionState::Connecting);
        let sender = LinkEventSender::new(Arc::downgrade(&self.handle.shared));
        match link.connect(sender) {
            Ok(()) => {
                info!("connecting");
                true
            }
            Err(e) => {
                warn!("link refused to connect: {}", e);
                shared.set_state(ConnectionState::NotConnected);
                false
            }
        }
    }

    /// Close the connection. The dispatcher learns about it through the
    /// link's `Disconnected` event, if the platform sends one.
    pub fn disconnect(&self) {
        let shared = self.shared();
        match shared.lock_link() {
            Ok(mut link) => link.disconnect(),
            Err(e) => warn!("disconnect: {}", e),
        }
        shared.set_state(ConnectionState::NotConnected);
    }

    pub fn enqueue(&self, transaction: Transaction) -> Result<(), QueueError> {
        self.handle.enqueue(transaction)
    }

    pub fn insert(&self, transaction: Transaction) -> Result<(), QueueError> {
        self.handle.insert(transaction)
    }

    /// Drop every transaction that has not started yet.
    pub fn clear(&self) {
        let dropped = self.shared().clear_pending();
        if dropped > 0 {
            self.shared().emit(&EngineEvent::QueueCleared { dropped });
        }
    }

    /// Abandon whatever the dispatcher is waiting for (connection or
    /// action result). The current transaction is not resumed.
    pub fn interrupt(&self) {
        self.shared().interrupt.signal(());
    }

    /// Disconnect and stop the dispatcher. Idempotent.
    pub fn dispose(&mut self) {
        if !self.shared().mark_disposed() {
            return;
        }
        info!("disposing queue");
        self.disconnect();
        self.shared().clear_pending();
        self.shared().shutdown.signal(());

        if let Some(worker) = self.worker.take() {
            if worker.thread().id() == std::thread::current().id() {
                debug!("dispose from dispatcher thread, not joining");
            } else if worker.join().is_err() {
                warn!("dispatcher thread panicked during shutdown");
            }
        }
    }

    pub fn state(&self) -> ConnectionState {
        self.handle.state()
    }

    pub fn is_connected(&self) -> bool {
        self.handle.is_connected()
    }

    pub fn is_initialized(&self) -> bool {
        self.handle.is_initialized()
    }

    pub fn is_disposed(&self) -> bool {
        self.shared().is_disposed()
    }

    /// The dispatcher died; this queue accepts no more work.
    pub fn is_crashed(&self) -> bool {
        self.shared().is_crashed()
    }

    pub fn len(&self) -> usize {
        self.handle.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handle.is_empty()
    }
}

impl Drop for BtleQueue {
    fn drop(&mut self) {
        self.dispose();
    }
}

// ── Tests ────────────────────────────────────────────────────
