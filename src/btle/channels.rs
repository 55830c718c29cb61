//! State shared between a [`BtleQueue`](super::queue::BtleQueue), its
//! handles, and the dispatcher thread.
//!
//! Pending transactions sit in a bounded deque behind a mutex (so urgent
//! work can be inserted at the head); the dispatcher is woken through an
//! `embassy-sync` signal. Link events travel through a bounded
//! `embassy-sync` channel.
//!
//! ```text
//! ┌──────────────┐ Transaction ┌─────────────┐  LinkEvent  ┌──────────┐
//! │ driver/queue │────────────▶│ dispatcher  │◀────────────│ platform │
//! │  (any thread)│  + wake sig │  (1 thread) │   channel   │ callback │
//! └──────────────┘             └─────────────┘             └──────────┘
//! ```

use core::sync::atomic::{AtomicBool, Ordering};
use core::time::Duration;
use std::sync::{Mutex, MutexGuard, OnceLock, PoisonError};
use std::thread::ThreadId;

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::channel::Channel;
use embassy_sync::signal::Signal;
use futures_lite::FutureExt;
use heapless::Deque;
use log::warn;

use super::link::{GattLink, LinkEvent};
use super::state::{ConnectionState, StateCell};
use super::transaction::Transaction;
use crate::app::events::EngineEvent;
use crate::app::ports::EventSink;
use crate::error::{LinkError, QueueError};

/// Maximum number of transactions waiting to run.
pub const QUEUE_DEPTH: usize = 64;

/// Link events buffered ahead of the dispatcher.
pub const EVENT_DEPTH: usize = 32;

pub(crate) type LinkGuard<'a> = MutexGuard<'a, Box<dyn GattLink>>;

pub(crate) struct Shared {
    pending: Mutex<Deque<Transaction, QUEUE_DEPTH>>,
    pub(crate) work_ready: Signal<CriticalSectionRawMutex, ()>,
    pub(crate) events: Channel<CriticalSectionRawMutex, LinkEvent, EVENT_DEPTH>,
    pub(crate) shutdown: Signal<CriticalSectionRawMutex, ()>,
    pub(crate) interrupt: Signal<CriticalSectionRawMutex, ()>,
    link: Mutex<Box<dyn GattLink>>,
    sink: Mutex<Box<dyn EventSink>>,
    state: StateCell,
    disposed: AtomicBool,
    crashed: AtomicBool,
    dispatcher: OnceLock<ThreadId>,
}

impl Shared {
    pub(crate) fn new(link: Box<dyn GattLink>, sink: Box<dyn EventSink>) -> Self {
        Self {
            pending: Mutex::new(Deque::new()),
            work_ready: Signal::new(),
            events: Channel::new(),
            shutdown: Signal::new(),
            interrupt: Signal::new(),
            link: Mutex::new(link),
            sink: Mutex::new(sink),
            state: StateCell::new(),
            disposed: AtomicBool::new(false),
            crashed: AtomicBool::new(false),
            dispatcher: OnceLock::new(),
        }
    }

    // ── Lifecycle flags ──────────────────────────────────────

    pub(crate) fn is_disposed(&self) -> bool {
        self.disposed.load(Ordering::Acquire)
    }

    /// Mark disposed; returns `true` only for the first caller.
    pub(crate) fn mark_disposed(&self) -> bool {
        !self.disposed.swap(true, Ordering::AcqRel)
    }

    pub(crate) fn is_crashed(&self) -> bool {
        self.crashed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_crashed(&self) {
        self.crashed.store(true, Ordering::Release);
    }

    pub(crate) fn is_alive(&self) -> bool {
        !self.is_disposed() && !self.is_crashed()
    }

    pub(crate) fn register_dispatcher(&self) {
        let _ = self.dispatcher.set(std::thread::current().id());
    }

    pub(crate) fn on_dispatcher_thread(&self) -> bool {
        self.dispatcher.get() == Some(&std::thread::current().id())
    }

    fn check_open(&self) -> Result<(), QueueError> {
        if self.is_disposed() {
            Err(QueueError::Disposed)
        } else if self.is_crashed() {
            Err(QueueError::Crashed)
        } else {
            Ok(())
        }
    }

    // ── Pending transactions ─────────────────────────────────

    fn pending(&self) -> MutexGuard<'_, Deque<Transaction, QUEUE_DEPTH>> {
        self.pending.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub(crate) fn push_back(&self, tx: Transaction) -> Result<(), QueueError> {
        self.check_open()?;
        self.pending().push_back(tx).map_err(|_| QueueError::Full)?;
        self.work_ready.signal(());
        Ok(())
    }

    pub(crate) fn push_front(&self, tx: Transaction) -> Result<(), QueueError> {
        self.check_open()?;
        self.pending().push_front(tx).map_err(|_| QueueError::Full)?;
        self.work_ready.signal(());
        Ok(())
    }

    pub(crate) fn pop_front(&self) -> Option<Transaction> {
        self.pending().pop_front()
    }

    /// Drop every pending transaction; returns how many were dropped.
    pub(crate) fn clear_pending(&self) -> usize {
        let mut pending = self.pending();
        let dropped = pending.len();
        pending.clear();
        dropped
    }

    pub(crate) fn pending_len(&self) -> usize {
        self.pending().len()
    }

    // ── Link ─────────────────────────────────────────────────

    pub(crate) fn lock_link(&self) -> Result<LinkGuard<'_>, LinkError> {
        self.link
            .lock()
            .map_err(|_| LinkError::Rejected("link lock poisoned"))
    }

    /// Block the calling (non-dispatcher) thread until the event fits or
    /// the queue goes away.
    pub(crate) fn send_event_blocking(&self, event: LinkEvent) {
        let send = async {
            self.events.send(event).await;
        };
        let closed = async {
            while self.is_alive() {
                async_io_mini::Timer::after(Duration::from_millis(5)).await;
            }
            warn!("queue closed while delivering a link event");
        };
        futures_lite::future::block_on(send.or(closed));
    }

    // ── State & outward events ───────────────────────────────

    pub(crate) fn state(&self) -> ConnectionState {
        self.state.get()
    }

    pub(crate) fn set_state(&self, next: ConnectionState) {
        let prev = self.state.swap(next);
        if prev != next {
            self.emit(&EngineEvent::StateChanged {
                from: prev,
                to: next,
            });
        }
    }

    pub(crate) fn emit(&self, event: &EngineEvent) {
        self.sink
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .emit(event);
    }
}

// ── Tests ────────────────────────────────────────────────────
