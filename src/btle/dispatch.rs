//! Dispatcher worker: runs transactions one action at a time.
//!
//! Runs in a dedicated thread using `edge-executor`, driven by
//! `futures_lite::future::block_on`. Every suspension point races the same
//! wake sources, so link events keep flowing while the worker waits for
//! work, for a connection, for an action result, or for a `Wait` timer.
//!
//! ```text
//!  ┌──────────────────────────────────────────────────────────┐
//!  │  Dispatcher thread                                       │
//!  │                                                          │
//!  │   next_wake: shutdown ▸ interrupt ▸ event ▸ work ▸ timer │
//!  │        │                                                 │
//!  │        ▼                                                 │
//!  │   pop tx ─▶ await connection ─▶ action ─▶ await result ─┐│
//!  │      ▲                            ▲                     ││
//!  │      │                            └───── next action ◀──┘│
//!  │      └──────────── done / abort ◀────────────────────────│
//!  └──────────────────────────────────────────────────────────┘
//! ```

use core::time::Duration;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;

use async_io_mini::Timer;
use futures_lite::FutureExt;
use log::{debug, error, info, warn};
use uuid::Uuid;

use super::action::Action;
use super::channels::Shared;
use super::link::{GattStatus, LinkEvent, LinkEventSender, LinkState};
use super::queue::QueueHandle;
use super::state::ConnectionState;
use super::transaction::Transaction;
use crate::app::events::EngineEvent;
use crate::app::ports::GattCallback;

// ── Wake sources ─────────────────────────────────────────────

enum Wake {
    Shutdown,
    Interrupt,
    Event(LinkEvent),
    Work,
    Timer,
}

/// Wait for the next thing the dispatcher must react to. Earlier sources
/// win when several are ready.
async fn next_wake(shared: &Shared, want_work: bool, timer: Option<&mut Timer>) -> Wake {
    let shutdown = async {
        shared.shutdown.wait().await;
        Wake::Shutdown
    };
    let interrupt = async {
        shared.interrupt.wait().await;
        Wake::Interrupt
    };
    let event = async { Wake::Event(shared.events.receive().await) };
    let work = async {
        if want_work {
            shared.work_ready.wait().await;
            Wake::Work
        } else {
            core::future::pending().await
        }
    };
    let timer = async move {
        match timer {
            Some(t) => {
                t.await;
                Wake::Timer
            }
            None => core::future::pending().await,
        }
    };
    shutdown.or(interrupt).or(event).or(work).or(timer).await
}

// ── Dispatcher ───────────────────────────────────────────────

pub(crate) struct Dispatcher {
    shared: Arc<Shared>,
    handle: QueueHandle,
    external: Option<Arc<dyn GattCallback>>,
    /// Callback of the most recent transaction; overrides `external`.
    scoped: Option<Arc<dyn GattCallback>>,
    wait_target: Option<Uuid>,
    /// The awaited action also finishes on a characteristic change.
    wait_on_change: bool,
    released: bool,
    abort: bool,
    auto_reconnect: bool,
}

impl Dispatcher {
    pub(crate) fn new(
        handle: QueueHandle,
        external: Option<Arc<dyn GattCallback>>,
        auto_reconnect: bool,
    ) -> Self {
        Self {
            shared: handle.shared().clone(),
            handle,
            external,
            scoped: None,
            wait_target: None,
            wait_on_change: false,
            released: false,
            abort: false,
            auto_reconnect,
        }
    }

    /// Thread entry point. Any error or panic marks the queue crashed.
    pub(crate) fn run_thread(self) {
        let shared = self.shared.clone();
        shared.register_dispatcher();

        let outcome = std::panic::catch_unwind(AssertUnwindSafe(move || {
            let executor: edge_executor::LocalExecutor<'_, 4> = edge_executor::LocalExecutor::new();
            futures_lite::future::block_on(executor.run(self.run()))
        }));

        let crashed = match outcome {
            Ok(Ok(())) => false,
            Ok(Err(e)) => {
                error!("dispatcher failed: {:#}", e);
                true
            }
            Err(_) => {
                error!("dispatcher panicked");
                true
            }
        };
        if crashed {
            shared.mark_crashed();
            let dropped = shared.clear_pending();
            if dropped > 0 {
                shared.emit(&EngineEvent::QueueCleared { dropped });
            }
        }
        shared.emit(&EngineEvent::WorkerStopped { crashed });
    }

    async fn run(mut self) -> anyhow::Result<()> {
        info!("dispatcher running");
        while let Some(tx) = self.next_transaction().await? {
            let (name, actions, callback) = tx.into_parts();

            if !self.shared.state().is_connected() {
                debug!("'{}' waits for a connection", name);
                self.scoped = None;
                if !self.wait_for_connection().await? {
                    if let Some(cb) = &callback {
                        cb.on_transaction_aborted(&self.handle, &name);
                    }
                    if self.shared.is_disposed() {
                        break;
                    }
                    warn!("dropping '{}': not connected", name);
                    self.shared
                        .emit(&EngineEvent::TransactionAborted { name });
                    continue;
                }
            }

            self.run_transaction(name, actions, callback).await?;
        }
        info!("dispatcher stopping");
        Ok(())
    }

    // ── Waits ────────────────────────────────────────────────

    async fn next_transaction(&mut self) -> anyhow::Result<Option<Transaction>> {
        loop {
            if self.shared.is_disposed() {
                return Ok(None);
            }
            if let Some(tx) = self.shared.pop_front() {
                return Ok(Some(tx));
            }
            match next_wake(&self.shared, true, None).await {
                Wake::Shutdown => return Ok(None),
                Wake::Event(event) => self.handle_event(event)?,
                Wake::Interrupt | Wake::Work | Wake::Timer => {}
            }
        }
    }

    /// `Ok(false)` when the wait ended without a connection.
    async fn wait_for_connection(&mut self) -> anyhow::Result<bool> {
        loop {
            if self.shared.state().is_connected() {
                return Ok(true);
            }
            match next_wake(&self.shared, false, None).await {
                Wake::Shutdown => return Ok(false),
                Wake::Interrupt => {
                    info!("connection wait interrupted");
                    return Ok(self.shared.state().is_connected());
                }
                Wake::Event(event) => {
                    let down = matches!(
                        event,
                        LinkEvent::ConnectionStateChanged {
                            state: LinkState::Disconnected,
                            ..
                        }
                    );
                    self.handle_event(event)?;
                    if down {
                        return Ok(false);
                    }
                }
                Wake::Work | Wake::Timer => {}
            }
        }
    }

    /// `Ok(false)` when the action did not complete successfully.
    async fn wait_for_result(&mut self) -> anyhow::Result<bool> {
        loop {
            if self.released {
                return Ok(!self.abort);
            }
            match next_wake(&self.shared, false, None).await {
                Wake::Shutdown => return Ok(false),
                Wake::Interrupt => {
                    info!("result wait interrupted");
                    return Ok(false);
                }
                Wake::Event(event) => self.handle_event(event)?,
                Wake::Work | Wake::Timer => {}
            }
        }
    }

    async fn pause(&mut self, duration: Duration) -> anyhow::Result<bool> {
        let mut timer = Timer::after(duration);
        loop {
            match next_wake(&self.shared, false, Some(&mut timer)).await {
                Wake::Timer => return Ok(!self.abort),
                Wake::Shutdown | Wake::Interrupt => return Ok(false),
                Wake::Event(event) => {
                    self.handle_event(event)?;
                    if self.abort {
                        return Ok(false);
                    }
                }
                Wake::Work => {}
            }
        }
    }

    // ── Transaction execution ────────────────────────────────

    async fn run_transaction(
        &mut self,
        name: String,
        actions: Vec<Action>,
        callback: Option<Arc<dyn GattCallback>>,
    ) -> anyhow::Result<()> {
        self.abort = false;
        // `scoped` may be reset by a disconnect mid-transaction; the abort
        // notice still goes to the transaction's own callback.
        let owner = callback.clone();
        self.scoped = callback;
        let total = actions.len();
        debug!("start '{}' ({} actions)", name, total);

        for (index, mut action) in actions.into_iter().enumerate() {
            if self.abort || self.shared.is_disposed() {
                self.abort = true;
                break;
            }
            self.wait_target = action.characteristic();
            self.wait_on_change = action.completes_on_change();
            self.released = false;

            if let Some(duration) = action.wait_duration() {
                if !self.pause(duration).await? {
                    self.abort = true;
                }
                continue;
            }
            if let Action::SetState { state } = &action {
                self.shared.set_state(*state);
                continue;
            }

            let started = {
                let mut link = self.shared.lock_link()?;
                action.run(&mut **link)
            };
            if let Err(e) = started {
                error!(
                    "'{}' action {}/{} {:?} failed: {}",
                    name,
                    index + 1,
                    total,
                    action,
                    e
                );
                self.abort = true;
                break;
            }

            if action.expects_result() && !self.wait_for_result().await? {
                warn!(
                    "'{}' action {}/{} {:?} did not complete",
                    name,
                    index + 1,
                    total,
                    action
                );
                self.abort = true;
                break;
            }
        }

        self.wait_target = None;
        self.wait_on_change = false;
        if self.abort {
            if let Some(cb) = &owner {
                cb.on_transaction_aborted(&self.handle, &name);
            }
            self.shared
                .emit(&EngineEvent::TransactionAborted { name });
        } else {
            debug!("finished '{}'", name);
        }
        Ok(())
    }

    // ── Link events ──────────────────────────────────────────

    fn active_callback(&self) -> Option<Arc<dyn GattCallback>> {
        self.scoped.clone().or_else(|| self.external.clone())
    }

    /// A completion ends the current result wait only when it matches the
    /// awaited characteristic. Any failed completion marks the transaction
    /// aborted; the wait itself still ends on the matching event.
    fn check_waiting(&mut self, characteristic: Uuid, status: GattStatus) {
        if !status.is_success() {
            warn!("{} completed with status {}", characteristic, status);
            self.abort = true;
        }
        if self.wait_target == Some(characteristic) {
            self.released = true;
        }
    }

    fn handle_event(&mut self, event: LinkEvent) -> anyhow::Result<()> {
        match event {
            LinkEvent::ConnectionStateChanged { state, status } => {
                if let Some(cb) = self.active_callback() {
                    cb.on_connection_state_changed(&self.handle, state, status);
                }
                match state {
                    LinkState::Connecting => self.shared.set_state(ConnectionState::Connecting),
                    LinkState::Connected if status.is_success() => {
                        info!("link up");
                        self.shared.set_state(ConnectionState::Connected);
                        if let Err(e) = self.shared.lock_link()?.discover_services() {
                            warn!("service discovery not started: {}", e);
                        }
                    }
                    LinkState::Connected => {
                        warn!("connection failed with status {}", status);
                        self.handle_disconnected()?;
                    }
                    LinkState::Disconnected => self.handle_disconnected()?,
                }
            }
            LinkEvent::ServicesDiscovered { status } => {
                if status.is_success() {
                    if let Some(cb) = self.active_callback() {
                        cb.on_services_discovered(&self.handle);
                    }
                } else {
                    warn!("service discovery failed: {}", status);
                }
            }
            LinkEvent::CharacteristicRead {
                characteristic,
                value,
                status,
            } => {
                if let Some(cb) = self.active_callback() {
                    cb.on_characteristic_read(&self.handle, characteristic, &value, status);
                }
                self.check_waiting(characteristic, status);
            }
            LinkEvent::CharacteristicWrite {
                characteristic,
                status,
            } => {
                if let Some(cb) = self.active_callback() {
                    cb.on_characteristic_write(&self.handle, characteristic, status);
                }
                self.check_waiting(characteristic, status);
            }
            LinkEvent::DescriptorWrite {
                characteristic,
                status,
            } => {
                if let Some(cb) = self.active_callback() {
                    cb.on_descriptor_write(&self.handle, characteristic, status);
                }
                self.check_waiting(characteristic, status);
            }
            LinkEvent::CharacteristicChanged {
                characteristic,
                value,
            } => {
                let mut handled = self
                    .scoped
                    .as_ref()
                    .is_some_and(|cb| cb.on_characteristic_changed(&self.handle, characteristic, &value));
                if !handled {
                    handled = self
                        .external
                        .as_ref()
                        .is_some_and(|cb| cb.on_characteristic_changed(&self.handle, characteristic, &value));
                }
                if !handled {
                    debug!("unhandled change on {} ({} bytes)", characteristic, value.len());
                }
                if self.wait_on_change {
                    self.check_waiting(characteristic, GattStatus::SUCCESS);
                }
            }
            LinkEvent::RemoteRssi { rssi, status } => {
                if let Some(cb) = self.active_callback() {
                    cb.on_remote_rssi(&self.handle, rssi, status);
                }
            }
        }
        Ok(())
    }

    fn handle_disconnected(&mut self) -> anyhow::Result<()> {
        let was_initialized = self.shared.state() == ConnectionState::Initialized;
        info!("link down");

        self.scoped = None;
        let dropped = self.shared.clear_pending();
        if dropped > 0 {
            self.shared.emit(&EngineEvent::QueueCleared { dropped });
        }
        self.abort = true;
        self.released = true;
        self.shared.set_state(ConnectionState::NotConnected);

        let mut link = self.shared.lock_link()?;
        if self.auto_reconnect && was_initialized && !self.shared.is_disposed() {
            info!("reconnecting");
            let sender = LinkEventSender::new(Arc::downgrade(&self.shared));
            match link.connect(sender) {
                Ok(()) => self.shared.set_state(ConnectionState::WaitingForReconnect),
                Err(e) => {
                    warn!("reconnect refused: {}", e);
                    link.disconnect();
                }
            }
        } else {
            link.disconnect();
        }
        Ok(())
    }
}
