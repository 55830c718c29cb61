//! Connection-aware helpers for device drivers.
//!
//! Drivers rarely want to check the connection before every command; these
//! helpers connect on demand and make sure the device-specific
//! initialization sequence is queued ahead of regular work.

use log::debug;

use super::queue::{BtleQueue, QueueHandle};
use super::state::ConnectionState;
use super::transaction::{Transaction, TransactionBuilder};
use crate::app::ports::DeviceInitializer;
use crate::error::QueueError;

/// Name of the transaction queued by [`BtleQueue::perform_initialized`].
pub const INITIALIZE_TRANSACTION: &str = "initialize device";

/// Prefix `builder` with a plain action that aborts the transaction unless
/// the device is initialized by the time it runs.
pub fn check_initialized(builder: TransactionBuilder, queue: QueueHandle) -> TransactionBuilder {
    builder.plain("check initialized", move || queue.is_initialized())
}

impl BtleQueue {
    fn ensure_connecting(&self) {
        if !self.is_connected() && !self.connect() {
            debug!("connection already pending ({:?})", self.state());
        }
    }

    /// Connect if needed, then queue `transaction`.
    pub fn perform_connected(&self, transaction: Transaction) -> Result<(), QueueError> {
        self.ensure_connecting();
        self.enqueue(transaction)
    }

    /// Connect if needed, queue the device's initialization sequence if it
    /// has not completed yet, and return a builder for `name` guarded by an
    /// initialization check.
    pub fn perform_initialized(
        &self,
        name: &str,
        initializer: &mut dyn DeviceInitializer,
    ) -> Result<TransactionBuilder, QueueError> {
        self.ensure_connecting();
        if !matches!(
            self.state(),
            ConnectionState::Initializing | ConnectionState::Initialized
        ) {
            let init = initializer.initialize(
                TransactionBuilder::new(INITIALIZE_TRANSACTION)
                    .set_state(ConnectionState::Initializing),
            );
            self.enqueue(init.build())?;
        }
        Ok(check_initialized(TransactionBuilder::new(name), self.handle()))
    }
}
