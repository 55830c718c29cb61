//! Atomic units of work against the GATT link.

use core::fmt;
use core::time::Duration;

use uuid::Uuid;

use super::link::GattLink;
use super::state::ConnectionState;
use crate::error::LinkError;

/// Side-effect of a [`Action::Plain`]; `false` means failure.
pub type PlainEffect = Box<dyn FnMut() -> bool + Send>;

/// One step of a [`Transaction`](super::transaction::Transaction).
pub enum Action {
    /// Read a characteristic; completes with `CharacteristicRead`.
    Read { characteristic: Uuid },
    /// Write a characteristic; completes with `CharacteristicWrite`.
    Write {
        characteristic: Uuid,
        payload: Vec<u8>,
    },
    /// Toggle notifications; completes with `DescriptorWrite`.
    Notify { characteristic: Uuid, enable: bool },
    /// Pause the transaction. Link events keep being processed.
    Wait { duration_ms: u64 },
    /// Arbitrary local effect. With `awaits` set, the dispatcher waits for
    /// a completion or change on that characteristic afterwards.
    Plain {
        label: &'static str,
        effect: PlainEffect,
        awaits: Option<Uuid>,
    },
    /// Move the queue's connection state (e.g. to `Initialized`).
    SetState { state: ConnectionState },
}

impl Action {
    /// Whether the dispatcher must wait for a completion event before
    /// running the next action.
    pub fn expects_result(&self) -> bool {
        match self {
            Self::Read { .. } | Self::Write { .. } | Self::Notify { .. } => true,
            Self::Plain { awaits, .. } => awaits.is_some(),
            Self::Wait { .. } | Self::SetState { .. } => false,
        }
    }

    /// The characteristic whose completion ends this action's result wait.
    pub fn characteristic(&self) -> Option<Uuid> {
        match self {
            Self::Read { characteristic }
            | Self::Write { characteristic, .. }
            | Self::Notify { characteristic, .. } => Some(*characteristic),
            Self::Plain { awaits, .. } => *awaits,
            Self::Wait { .. } | Self::SetState { .. } => None,
        }
    }

    /// Whether a characteristic change (not only a completion) ends the
    /// result wait. True only for an awaiting `Plain` action; GATT
    /// operations finish on their own completion event.
    pub(crate) fn completes_on_change(&self) -> bool {
        matches!(self, Self::Plain { awaits: Some(_), .. })
    }

    pub(crate) fn wait_duration(&self) -> Option<Duration> {
        match self {
            Self::Wait { duration_ms } => Some(Duration::from_millis(*duration_ms)),
            _ => None,
        }
    }

    /// Start the action. `Wait` and `SetState` are carried out by the
    /// dispatcher and are no-ops here.
    pub fn run(&mut self, link: &mut dyn GattLink) -> Result<(), LinkError> {
        match self {
            Self::Read { characteristic } => link.read_characteristic(*characteristic),
            Self::Write {
                characteristic,
                payload,
            } => link.write_characteristic(*characteristic, payload),
            Self::Notify {
                characteristic,
                enable,
            } => link.set_notify(*characteristic, *enable),
            Self::Plain { label, effect, .. } => {
                if effect() {
                    Ok(())
                } else {
                    Err(LinkError::Rejected(label))
                }
            }
            Self::Wait { .. } | Self::SetState { .. } => Ok(()),
        }
    }
}

impl fmt::Debug for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Read { characteristic } => write!(f, "Read({characteristic})"),
            Self::Write {
                characteristic,
                payload,
            } => write!(f, "Write({characteristic}, {} bytes)", payload.len()),
            Self::Notify {
                characteristic,
                enable,
            } => write!(f, "Notify({characteristic}, {enable})"),
            Self::Wait { duration_ms } => write!(f, "Wait({duration_ms}ms)"),
            Self::Plain { label, awaits, .. } => match awaits {
                Some(c) => write!(f, "Plain({label}, awaits {c})"),
                None => write!(f, "Plain({label})"),
            },
            Self::SetState { state } => write!(f, "SetState({state:?})"),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────
