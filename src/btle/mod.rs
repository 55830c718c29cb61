//! BLE command-execution engine.
//!
//! ```text
//!  ┌─────────────┐  Transaction   ┌────────────┐  GattLink  ┌──────────┐
//!  │   driver    │───────────────▶│ BtleQueue  │───────────▶│ platform │
//!  │             │◀───────────────│ dispatcher │◀───────────│   GATT   │
//!  └─────────────┘  GattCallback  └────────────┘  LinkEvent └──────────┘
//! ```
//!
//! Modules:
//! - [`action`]: atomic GATT operations
//! - [`transaction`]: ordered action lists and their builder
//! - [`link`]: platform link trait and event stream
//! - [`queue`]: queue API and cloneable handle
//! - [`dispatch`]: the single-threaded worker
//! - [`support`]: connect-on-demand helpers for drivers

pub mod action;
pub(crate) mod channels;
mod dispatch;
pub mod link;
pub mod queue;
pub mod state;
pub mod support;
pub mod transaction;

pub use action::Action;
pub use channels::{EVENT_DEPTH, QUEUE_DEPTH};
pub use link::{GattLink, GattStatus, LinkEvent, LinkEventSender, LinkState, NullLink};
pub use queue::{BtleQueue, QueueHandle};
pub use state::ConnectionState;
pub use transaction::{Transaction, TransactionBuilder};
