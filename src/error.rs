//! Unified error types for the BLE engine.
//!
//! Every layer has its own small error enum; all of them convert into the
//! crate-wide [`Error`]. Variants are `Copy` wherever the payload allows so
//! they can be handed from the dispatcher thread to transfer tickets without
//! allocation.
//!
//! ```text
//!  LinkError ─────┐
//!  QueueError ────┤
//!  ProtocolError ─┼──▶ TransferError ──▶ Error
//!  ResultCode ────┘                  ▲
//!  ConfigError ──────────────────────┘
//! ```

use core::fmt;

use crate::btle::link::GattStatus;
use crate::transfer::status::{ResultCode, StatusOutcome};

// ---------------------------------------------------------------------------
// Error kind
// ---------------------------------------------------------------------------

/// Coarse classification callers use to decide whether to re-attempt a
/// whole operation from scratch.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// Retry later may succeed (busy remote, dropped link).
    Transient,
    /// Retrying the same request will fail the same way.
    Permanent,
}

// ---------------------------------------------------------------------------
// Link errors
// ---------------------------------------------------------------------------

/// Failures reported by (or about) the platform GATT link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkError {
    /// No connection to issue the operation on.
    NotConnected,
    /// The link dropped while work was pending.
    Disconnected,
    /// The platform refused to start the operation.
    Rejected(&'static str),
    /// The operation completed with a non-success GATT status.
    Status(GattStatus),
}

impl fmt::Display for LinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotConnected => write!(f, "not connected"),
            Self::Disconnected => write!(f, "link disconnected"),
            Self::Rejected(what) => write!(f, "platform rejected {what}"),
            Self::Status(status) => write!(f, "GATT status {status}"),
        }
    }
}

impl std::error::Error for LinkError {}

// ---------------------------------------------------------------------------
// Queue errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueueError {
    /// `dispose()` was already called.
    Disposed,
    /// The dispatcher worker died; a new queue is required.
    Crashed,
    /// The pending-transaction channel is at capacity.
    Full,
    /// The dispatcher thread could not be spawned.
    Spawn,
}

impl fmt::Display for QueueError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disposed => write!(f, "queue disposed"),
            Self::Crashed => write!(f, "dispatcher crashed"),
            Self::Full => write!(f, "transaction queue full"),
            Self::Spawn => write!(f, "failed to spawn dispatcher thread"),
        }
    }
}

impl std::error::Error for QueueError {}

// ---------------------------------------------------------------------------
// Protocol errors
// ---------------------------------------------------------------------------

/// The remote answered, but not in a way the transfer protocol allows.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProtocolError {
    /// A response echoed a different file handle.
    WrongHandle { expected: u16, actual: u16 },
    /// Whole-stream CRC32 differs from the remote's (or the end frame's).
    ChecksumMismatch { expected: u32, actual: u32 },
    /// CRC32C trailer does not match the reassembled payload.
    TrailerMismatch { expected: u32, actual: u32 },
    /// Response too short or with a length the response class forbids.
    Malformed { class: u8, len: usize },
    /// Response class not valid in the current transfer state.
    UnexpectedResponse { class: u8 },
    /// Data packet arrived out of order.
    SequenceGap { expected: u8, actual: u8 },
    /// More data than the declared length.
    Overflow,
    /// Fewer bytes received than declared.
    LengthMismatch { declared: u32, received: u32 },
    /// No IV offset in the configured window decrypted the first packet.
    CipherOffsetNotFound,
    /// The negotiated MTU leaves no room for packet payload.
    MtuTooSmall { mtu: u16 },
    /// Payload or declared length exceeds the configured maximum.
    PayloadTooLarge { len: usize },
    /// A packet or stream too short to carry its framing.
    Truncated { len: usize },
}

impl fmt::Display for ProtocolError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::WrongHandle { expected, actual } => {
                write!(f, "wrong handle 0x{actual:04x} (expected 0x{expected:04x})")
            }
            Self::ChecksumMismatch { expected, actual } => {
                write!(f, "crc32 mismatch: 0x{actual:08x} != 0x{expected:08x}")
            }
            Self::TrailerMismatch { expected, actual } => {
                write!(f, "crc32c trailer mismatch: 0x{actual:08x} != 0x{expected:08x}")
            }
            Self::Malformed { class, len } => {
                write!(f, "malformed class {class} response ({len} bytes)")
            }
            Self::UnexpectedResponse { class } => write!(f, "unexpected class {class} response"),
            Self::SequenceGap { expected, actual } => {
                write!(f, "packet sequence {actual} (expected {expected})")
            }
            Self::Overflow => write!(f, "data exceeds declared length"),
            Self::LengthMismatch { declared, received } => {
                write!(f, "received {received} of {declared} declared bytes")
            }
            Self::CipherOffsetNotFound => write!(f, "no IV offset decrypts the first packet"),
            Self::MtuTooSmall { mtu } => write!(f, "MTU {mtu} too small for data packets"),
            Self::PayloadTooLarge { len } => write!(f, "payload of {len} bytes too large"),
            Self::Truncated { len } => write!(f, "truncated data ({len} bytes)"),
        }
    }
}

impl std::error::Error for ProtocolError {}

// ---------------------------------------------------------------------------
// Transfer errors
// ---------------------------------------------------------------------------

/// Typed failure of a single file transfer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransferError {
    Link(LinkError),
    Queue(QueueError),
    Protocol(ProtocolError),
    /// The remote answered with a non-success status.
    Remote(ResultCode),
    /// The remote signalled a transfer timeout.
    RemoteTimeout,
    /// Another transfer is already active on this service.
    Busy,
    /// The transfer was cancelled locally.
    Aborted,
}

impl TransferError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Link(_) | Self::RemoteTimeout | Self::Busy => ErrorKind::Transient,
            Self::Queue(QueueError::Full) => ErrorKind::Transient,
            Self::Queue(_) | Self::Protocol(_) | Self::Aborted => ErrorKind::Permanent,
            Self::Remote(code) => match code.outcome() {
                StatusOutcome::Busy => ErrorKind::Transient,
                StatusOutcome::Success | StatusOutcome::Permanent => ErrorKind::Permanent,
            },
        }
    }

    pub fn is_transient(&self) -> bool {
        self.kind() == ErrorKind::Transient
    }
}

impl fmt::Display for TransferError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Queue(e) => write!(f, "queue: {e}"),
            Self::Protocol(e) => write!(f, "protocol: {e}"),
            Self::Remote(code) => write!(f, "remote status: {code}"),
            Self::RemoteTimeout => write!(f, "remote reported transfer timeout"),
            Self::Busy => write!(f, "another transfer is active"),
            Self::Aborted => write!(f, "transfer aborted"),
        }
    }
}

impl std::error::Error for TransferError {}

impl From<LinkError> for TransferError {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<QueueError> for TransferError {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

impl From<ProtocolError> for TransferError {
    fn from(e: ProtocolError) -> Self {
        Self::Protocol(e)
    }
}

// ---------------------------------------------------------------------------
// Configuration errors
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConfigError {
    /// A field is out of its valid range.
    Invalid(&'static str),
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Invalid(field) => write!(f, "invalid config: {field}"),
        }
    }
}

impl std::error::Error for ConfigError {}

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

/// Every fallible public operation funnels into this type.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    Link(LinkError),
    Queue(QueueError),
    Transfer(TransferError),
    Config(ConfigError),
}

impl Error {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Link(_) | Self::Queue(QueueError::Full) => ErrorKind::Transient,
            Self::Queue(_) | Self::Config(_) => ErrorKind::Permanent,
            Self::Transfer(e) => e.kind(),
        }
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Link(e) => write!(f, "link: {e}"),
            Self::Queue(e) => write!(f, "queue: {e}"),
            Self::Transfer(e) => write!(f, "transfer: {e}"),
            Self::Config(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<LinkError> for Error {
    fn from(e: LinkError) -> Self {
        Self::Link(e)
    }
}

impl From<QueueError> for Error {
    fn from(e: QueueError) -> Self {
        Self::Queue(e)
    }
}

impl From<TransferError> for Error {
    fn from(e: TransferError) -> Self {
        Self::Transfer(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
