//! Outbound engine events.
//!
//! The queue emits these through the [`EventSink`](super::ports::EventSink)
//! port. Adapters on the other side decide what to do with them.

use crate::btle::state::ConnectionState;

/// Structured events emitted by the transaction queue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineEvent {
    /// The device connection state changed.
    StateChanged {
        from: ConnectionState,
        to: ConnectionState,
    },

    /// A transaction stopped before its last action.
    TransactionAborted { name: String },

    /// Pending transactions were discarded (disconnect or `clear()`).
    QueueCleared { dropped: usize },

    /// The dispatcher worker exited.
    WorkerStopped { crashed: bool },
}
