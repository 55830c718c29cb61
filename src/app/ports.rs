//! Port traits: the boundary between the engine and device drivers.
//!
//! ```text
//!   platform ──▶ GattLink/LinkEvent ──▶ BtleQueue ──▶ GattCallback ──▶ driver
//!                                          │
//!                                          └──▶ EventSink ──▶ adapter
//! ```
//!
//! Drivers implement [`GattCallback`] to see the link events no transaction
//! consumed, and [`DeviceInitializer`] to describe their initialization
//! sequence. Adapters implement [`EventSink`].

use uuid::Uuid;

use crate::btle::link::{GattStatus, LinkState};
use crate::btle::queue::QueueHandle;
use crate::btle::transaction::TransactionBuilder;

// ───────────────────────────────────────────────────────────────
// GATT callback port (driven: dispatcher → driver)
// ───────────────────────────────────────────────────────────────

/// Receives link events on the dispatcher thread.
///
/// Every method has a no-op default. The `queue` handle lets a callback
/// enqueue follow-up work; it must not block waiting for that work.
pub trait GattCallback: Send + Sync {
    fn on_connection_state_changed(
        &self,
        _queue: &QueueHandle,
        _state: LinkState,
        _status: GattStatus,
    ) {
    }

    fn on_services_discovered(&self, _queue: &QueueHandle) {}

    fn on_characteristic_read(
        &self,
        _queue: &QueueHandle,
        _characteristic: Uuid,
        _value: &[u8],
        _status: GattStatus,
    ) {
    }

    fn on_characteristic_write(
        &self,
        _queue: &QueueHandle,
        _characteristic: Uuid,
        _status: GattStatus,
    ) {
    }

    fn on_descriptor_write(
        &self,
        _queue: &QueueHandle,
        _characteristic: Uuid,
        _status: GattStatus,
    ) {
    }

    /// Returns `true` if the notification was consumed.
    fn on_characteristic_changed(
        &self,
        _queue: &QueueHandle,
        _characteristic: Uuid,
        _value: &[u8],
    ) -> bool {
        false
    }

    fn on_remote_rssi(&self, _queue: &QueueHandle, _rssi: i16, _status: GattStatus) {}

    /// A transaction carrying this callback stopped before its last action
    /// or was dropped unstarted while waiting for a connection. Only the
    /// transaction's own callback is told.
    fn on_transaction_aborted(&self, _queue: &QueueHandle, _name: &str) {}
}

// ───────────────────────────────────────────────────────────────
// Device initializer port (driver → queue)
// ───────────────────────────────────────────────────────────────

/// Describes the device-specific initialization sequence.
///
/// The returned builder normally ends with
/// `set_state(ConnectionState::Initialized)`.
pub trait DeviceInitializer {
    fn initialize(&mut self, builder: TransactionBuilder) -> TransactionBuilder;
}

// ───────────────────────────────────────────────────────────────
// Event sink port (driven: engine → logging / UI)
// ───────────────────────────────────────────────────────────────

/// The queue emits structured [`EngineEvent`](super::events::EngineEvent)s
/// through this port.
pub trait EventSink: Send {
    fn emit(&mut self, event: &super::events::EngineEvent);
}
