//! Log-based event sink adapter.
//!
//! Implements [`EventSink`] by writing engine events through the `log`
//! facade. The host application decides where log records go.

use log::{error, info, warn};

use crate::app::events::EngineEvent;
use crate::app::ports::EventSink;

/// Adapter that logs every [`EngineEvent`].
pub struct LogEventSink {
    device: String,
}

impl LogEventSink {
    /// `device` tags every line (address or friendly name).
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
        }
    }
}

impl EventSink for LogEventSink {
    fn emit(&mut self, event: &EngineEvent) {
        match event {
            EngineEvent::StateChanged { from, to } => {
                info!("STATE | {} | {:?} -> {:?}", self.device, from, to);
            }
            EngineEvent::TransactionAborted { name } => {
                warn!("ABORT | {} | transaction '{}'", self.device, name);
            }
            EngineEvent::QueueCleared { dropped } => {
                info!("QUEUE | {} | dropped {} pending", self.device, dropped);
            }
            EngineEvent::WorkerStopped { crashed: true } => {
                error!("QUEUE | {} | dispatcher crashed", self.device);
            }
            EngineEvent::WorkerStopped { crashed: false } => {
                info!("QUEUE | {} | dispatcher stopped", self.device);
            }
        }
    }
}
