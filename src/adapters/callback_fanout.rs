//! Fan-out callback adapter.
//!
//! A queue has one external [`GattCallback`]. Drivers that need several
//! (their own event handling plus a [`FileTransferService`], say) register
//! a [`CallbackFanout`] that forwards every event to each member in order.
//!
//! [`FileTransferService`]: crate::transfer::FileTransferService

use std::sync::Arc;

use uuid::Uuid;

use crate::app::ports::GattCallback;
use crate::btle::link::{GattStatus, LinkState};
use crate::btle::queue::QueueHandle;

#[derive(Default, Clone)]
pub struct CallbackFanout {
    members: Vec<Arc<dyn GattCallback>>,
}

impl CallbackFanout {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, callback: Arc<dyn GattCallback>) -> Self {
        self.members.push(callback);
        self
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }
}

impl GattCallback for CallbackFanout {
    fn on_connection_state_changed(
        &self,
        queue: &QueueHandle,
        state: LinkState,
        status: GattStatus,
    ) {
        for cb in &self.members {
            cb.on_connection_state_changed(queue, state, status);
        }
    }

    fn on_services_discovered(&self, queue: &QueueHandle) {
        for cb in &self.members {
            cb.on_services_discovered(queue);
        }
    }

    fn on_characteristic_read(
        &self,
        queue: &QueueHandle,
        characteristic: Uuid,
        value: &[u8],
        status: GattStatus,
    ) {
        for cb in &self.members {
            cb.on_characteristic_read(queue, characteristic, value, status);
        }
    }

    fn on_characteristic_write(&self, queue: &QueueHandle, characteristic: Uuid, status: GattStatus) {
        for cb in &self.members {
            cb.on_characteristic_write(queue, characteristic, status);
        }
    }

    fn on_descriptor_write(&self, queue: &QueueHandle, characteristic: Uuid, status: GattStatus) {
        for cb in &self.members {
            cb.on_descriptor_write(queue, characteristic, status);
        }
    }

    /// Stops at the first member that consumes the notification.
    fn on_characteristic_changed(
        &self,
        queue: &QueueHandle,
        characteristic: Uuid,
        value: &[u8],
    ) -> bool {
        self.members
            .iter()
            .any(|cb| cb.on_characteristic_changed(queue, characteristic, value))
    }

    fn on_remote_rssi(&self, queue: &QueueHandle, rssi: i16, status: GattStatus) {
        for cb in &self.members {
            cb.on_remote_rssi(queue, rssi, status);
        }
    }

    fn on_transaction_aborted(&self, queue: &QueueHandle, name: &str) {
        for cb in &self.members {
            cb.on_transaction_aborted(queue, name);
        }
    }
}
