//! Transactions and their builder.
//!
//! A [`Transaction`] is an ordered, named list of [`Action`]s. Once built it
//! is immutable; the dispatcher consumes it exactly once.

use core::fmt;
use std::sync::Arc;

use uuid::Uuid;

use super::action::Action;
use super::queue::QueueHandle;
use super::state::ConnectionState;
use crate::app::ports::GattCallback;
use crate::error::QueueError;

pub struct Transaction {
    name: String,
    actions: Vec<Action>,
    callback: Option<Arc<dyn GattCallback>>,
}

impl Transaction {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn len(&self) -> usize {
        self.actions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.actions.is_empty()
    }

    pub fn actions(&self) -> &[Action] {
        &self.actions
    }

    pub fn has_callback(&self) -> bool {
        self.callback.is_some()
    }

    pub(crate) fn into_parts(self) -> (String, Vec<Action>, Option<Arc<dyn GattCallback>>) {
        (self.name, self.actions, self.callback)
    }
}

impl fmt::Debug for Transaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Transaction")
            .field("name", &self.name)
            .field("actions", &self.actions)
            .field("callback", &self.callback.is_some())
            .finish()
    }
}

/// Fluent constructor for [`Transaction`]s.
///
/// ```ignore
/// TransactionBuilder::new("enable heart rate")
///     .notify(HR_MEASUREMENT, true)
///     .write(HR_CONTROL, &[0x15, 0x01, 0x01])
///     .queue(&handle)?;
/// ```
#[derive(Debug)]
pub struct TransactionBuilder {
    transaction: Transaction,
}

impl TransactionBuilder {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            transaction: Transaction {
                name: name.into(),
                actions: Vec::new(),
                callback: None,
            },
        }
    }

    pub fn add(mut self, action: Action) -> Self {
        self.transaction.actions.push(action);
        self
    }

    pub fn read(self, characteristic: Uuid) -> Self {
        self.add(Action::Read { characteristic })
    }

    pub fn write(self, characteristic: Uuid, payload: &[u8]) -> Self {
        self.add(Action::Write {
            characteristic,
            payload: payload.to_vec(),
        })
    }

    pub fn notify(self, characteristic: Uuid, enable: bool) -> Self {
        self.add(Action::Notify {
            characteristic,
            enable,
        })
    }

    pub fn wait(self, duration_ms: u64) -> Self {
        self.add(Action::Wait { duration_ms })
    }

    pub fn plain(
        self,
        label: &'static str,
        effect: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        self.add(Action::Plain {
            label,
            effect: Box::new(effect),
            awaits: None,
        })
    }

    /// A plain action that completes only once `characteristic` reports.
    pub fn plain_awaiting(
        self,
        label: &'static str,
        characteristic: Uuid,
        effect: impl FnMut() -> bool + Send + 'static,
    ) -> Self {
        self.add(Action::Plain {
            label,
            effect: Box::new(effect),
            awaits: Some(characteristic),
        })
    }

    pub fn set_state(self, state: ConnectionState) -> Self {
        self.add(Action::SetState { state })
    }

    /// Route link events to `callback` instead of the queue's external
    /// callback while this transaction is the most recent one.
    pub fn callback(mut self, callback: Arc<dyn GattCallback>) -> Self {
        self.transaction.callback = Some(callback);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.transaction.is_empty()
    }

    pub fn build(self) -> Transaction {
        self.transaction
    }

    /// Build and enqueue. An empty builder queues nothing.
    pub fn queue(self, queue: &QueueHandle) -> Result<(), QueueError> {
        queue.enqueue(self.build())
    }
}

// ── Tests ────────────────────────────────────────────────────
