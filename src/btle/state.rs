//! Device connection state.

use core::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle of the connection to one remote device.
///
/// ```text
///  NotConnected ──connect()──▶ Connecting ──link up──▶ Connected
///        ▲                                                 │ driver init
///        │ disconnect / dispose                            ▼
///        └─────────────── link down ◀── Initialized ◀── Initializing
///                              │ auto-reconnect
///                              ▼
///                      WaitingForReconnect ──link up──▶ Connected
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u8)]
pub enum ConnectionState {
    NotConnected = 0,
    Connecting = 1,
    Connected = 2,
    Initializing = 3,
    Initialized = 4,
    WaitingForReconnect = 5,
}

impl ConnectionState {
    pub fn from_u8(v: u8) -> Option<Self> {
        match v {
            0 => Some(Self::NotConnected),
            1 => Some(Self::Connecting),
            2 => Some(Self::Connected),
            3 => Some(Self::Initializing),
            4 => Some(Self::Initialized),
            5 => Some(Self::WaitingForReconnect),
            _ => None,
        }
    }

    /// Whether GATT operations may be issued in this state.
    pub fn is_connected(self) -> bool {
        matches!(
            self,
            Self::Connected | Self::Initializing | Self::Initialized
        )
    }
}

/// Lock-free cell holding the current [`ConnectionState`].
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(ConnectionState::NotConnected as u8))
    }

    pub(crate) fn get(&self) -> ConnectionState {
        ConnectionState::from_u8(self.0.load(Ordering::Acquire))
            .unwrap_or(ConnectionState::NotConnected)
    }

    /// Store `next` and return the previous state.
    pub(crate) fn swap(&self, next: ConnectionState) -> ConnectionState {
        ConnectionState::from_u8(self.0.swap(next as u8, Ordering::AcqRel))
            .unwrap_or(ConnectionState::NotConnected)
    }
}
