//! Reliable chunked file transfer over a GATT control/data pair.
//!
//! ```text
//!  payload ─▶ + CRC-32C trailer ─▶ stream ─▶ packets (seq + chunk)
//!                                    │
//!                                    └─▶ CRC-32 ─▶ compared with remote
//! ```
//!
//! Modules:
//! - [`codec`]: request encoders and response parser
//! - [`status`]: remote result codes
//! - [`checksum`]: CRC-32 / CRC-32C helpers
//! - [`chunked`]: packetization and reassembly
//! - [`crypto`]: AES-128-CTR packet cipher
//! - [`upload`] / [`download`]: per-transfer state machines
//! - [`service`]: queue integration and completion tickets

use uuid::Uuid;

pub mod checksum;
pub mod chunked;
pub mod codec;
pub mod crypto;
pub mod download;
pub mod service;
pub mod status;
pub mod upload;

pub use codec::FileHandle;
pub use crypto::FileCipher;
pub use download::{DownloadState, FileGetRequest};
pub use service::{FileTransferService, TransferOutcome, TransferResult, TransferTicket};
pub use status::{ResultCode, StatusOutcome};
pub use upload::{FilePutRequest, UploadState};

/// Characteristic pair a transfer runs over: requests and responses on
/// `control`, packets on `data`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransferCharacteristics {
    pub control: Uuid,
    pub data: Uuid,
}
