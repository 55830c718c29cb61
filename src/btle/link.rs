//! GATT link abstraction: the platform side of the queue.
//!
//! The platform Bluetooth stack is modelled only through its asynchronous
//! callback contract: the queue issues operations through [`GattLink`],
//! and the platform reports their completion (and every unsolicited
//! notification) by pushing [`LinkEvent`]s through a [`LinkEventSender`].
//!
//! ```text
//!  dispatcher ──GattLink::write_characteristic──▶ platform
//!  dispatcher ◀──LinkEvent::CharacteristicWrite── platform (any thread)
//! ```
//!
//! Adding a new platform binding requires zero changes to the queue.

use core::fmt;
use std::sync::Weak;

use embassy_sync::channel::TrySendError;
use log::{error, warn};
use uuid::Uuid;

use super::channels::Shared;
use crate::error::LinkError;

// ── Status ───────────────────────────────────────────────────

/// Status byte the platform attaches to a completed GATT operation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct GattStatus(pub u8);

impl GattStatus {
    pub const SUCCESS: Self = Self(0x00);
    /// Generic stack failure (`GATT_ERROR`).
    pub const ERROR: Self = Self(0x85);

    pub fn is_success(self) -> bool {
        self == Self::SUCCESS
    }
}

impl fmt::Display for GattStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:02x}", self.0)
    }
}

// ── Events ───────────────────────────────────────────────────

/// Physical link state as reported by the platform.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connecting,
    Connected,
    Disconnected,
}

/// Asynchronous notification from the platform GATT stack.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LinkEvent {
    ConnectionStateChanged {
        state: LinkState,
        status: GattStatus,
    },
    ServicesDiscovered {
        status: GattStatus,
    },
    CharacteristicRead {
        characteristic: Uuid,
        value: Vec<u8>,
        status: GattStatus,
    },
    CharacteristicWrite {
        characteristic: Uuid,
        status: GattStatus,
    },
    /// Completion of a notification-enable (CCCD) write on `characteristic`.
    DescriptorWrite {
        characteristic: Uuid,
        status: GattStatus,
    },
    CharacteristicChanged {
        characteristic: Uuid,
        value: Vec<u8>,
    },
    RemoteRssi {
        rssi: i16,
        status: GattStatus,
    },
}

/// Cloneable capability the platform uses to report [`LinkEvent`]s.
///
/// Holds only a weak reference to the queue: events delivered after the
/// queue is gone are dropped.
#[derive(Clone)]
pub struct LinkEventSender {
    shared: Weak<Shared>,
}

impl LinkEventSender {
    pub(crate) fn new(shared: Weak<Shared>) -> Self {
        Self { shared }
    }

    /// Hand an event to the dispatcher.
    ///
    /// Never blocks the dispatcher thread itself. From any other thread it
    /// blocks only while the event channel is full and the queue is alive.
    pub fn deliver(&self, event: LinkEvent) {
        let Some(shared) = self.shared.upgrade() else {
            warn!("link event after queue dropped: {:?}", event);
            return;
        };
        let event = match shared.events.try_send(event) {
            Ok(()) => return,
            Err(TrySendError::Full(event)) => event,
        };
        if shared.on_dispatcher_thread() || !shared.is_alive() {
            error!("link event channel full, dropping {:?}", event);
            return;
        }
        shared.send_event_blocking(event);
    }

    /// Whether the receiving queue still exists and accepts events.
    pub fn is_open(&self) -> bool {
        self.shared.upgrade().is_some_and(|s| s.is_alive())
    }
}

// ── Link trait ───────────────────────────────────────────────

/// Platform GATT client for one remote device.
///
/// Every operation only *starts* the work and returns immediately; its
/// completion arrives later as a [`LinkEvent`]. An `Err` means the
/// platform refused to start it.
pub trait GattLink: Send {
    /// Begin connecting. The link keeps `events` and reports everything
    /// through it until the next `connect`.
    fn connect(&mut self, events: LinkEventSender) -> Result<(), LinkError>;

    /// Close the connection. Idempotent.
    fn disconnect(&mut self);

    /// Start service discovery after a connection is up.
    fn discover_services(&mut self) -> Result<(), LinkError> {
        Ok(())
    }

    fn read_characteristic(&mut self, characteristic: Uuid) -> Result<(), LinkError>;

    fn write_characteristic(&mut self, characteristic: Uuid, value: &[u8])
    -> Result<(), LinkError>;

    /// Enable or disable notifications; completes with `DescriptorWrite`.
    fn set_notify(&mut self, characteristic: Uuid, enable: bool) -> Result<(), LinkError>;
}

/// A link that accepts every operation and never reports anything.
/// Useful as a placeholder before a platform binding is attached.
pub struct NullLink;

impl GattLink for NullLink {
    fn connect(&mut self, _events: LinkEventSender) -> Result<(), LinkError> {
        Ok(())
    }

    fn disconnect(&mut self) {}

    fn read_characteristic(&mut self, _characteristic: Uuid) -> Result<(), LinkError> {
        Ok(())
    }

    fn write_characteristic(
        &mut self,
        _characteristic: Uuid,
        _value: &[u8],
    ) -> Result<(), LinkError> {
        Ok(())
    }

    fn set_notify(&mut self, _characteristic: Uuid, _enable: bool) -> Result<(), LinkError> {
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────
