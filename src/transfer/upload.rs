//! Upload state machine.
//!
//! Flow: Put → put ack → N × data packet → verify → Close → close ack
//!
//! ```text
//!  Initialized ──put ack──▶ Uploading ──verify──▶ Closing ──close ack──▶ Uploaded
//!       │                       │                    │
//!       └───────────────────────┴────────────────────┴──error──▶ Failed
//! ```
//!
//! Each step that needs traffic hands back a [`TransactionBuilder`]; the
//! caller attaches its callback and enqueues it.

extern crate alloc;
use alloc::vec::Vec;

use log::{info, warn};

use super::TransferCharacteristics;
use super::checksum::{crc32, with_trailer};
use super::chunked::{Packet, packetize};
use super::codec::{self, FileHandle, Response};
use super::crypto::FileCipher;
use super::status::ResultCode;
use crate::btle::action::Action;
use crate::btle::transaction::TransactionBuilder;
use crate::config::TransferConfig;
use crate::error::{ProtocolError, TransferError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadState {
    Initialized,
    Uploading,
    Closing,
    Uploaded,
    Failed,
}

pub struct FilePutRequest {
    handle: FileHandle,
    characteristics: TransferCharacteristics,
    packets: Vec<Packet>,
    stream_len: u32,
    full_checksum: u32,
    state: UploadState,
    cipher: Option<(FileCipher, u8)>,
}

impl FilePutRequest {
    /// Build the stream (payload + CRC-32C trailer) and cut it into packets.
    pub fn new(
        handle: FileHandle,
        payload: &[u8],
        mtu: u16,
        characteristics: TransferCharacteristics,
        config: &TransferConfig,
    ) -> Result<Self, ProtocolError> {
        if payload.len() > config.max_file_size as usize {
            return Err(ProtocolError::PayloadTooLarge { len: payload.len() });
        }
        let stream = with_trailer(payload);
        let packets = packetize(&stream, mtu, config.packet_overhead)?;
        Ok(Self {
            handle,
            characteristics,
            packets,
            stream_len: stream.len() as u32,
            full_checksum: crc32(&stream),
            state: UploadState::Initialized,
            cipher: None,
        })
    }

    /// Encrypt every data packet with `cipher` at IV `offset`.
    #[must_use]
    pub fn with_cipher(mut self, cipher: FileCipher, offset: u8) -> Self {
        self.cipher = Some((cipher, offset));
        self
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    pub fn state(&self) -> UploadState {
        self.state
    }

    pub fn packets(&self) -> &[Packet] {
        &self.packets
    }

    /// Declared length: payload plus trailer.
    pub fn stream_len(&self) -> u32 {
        self.stream_len
    }

    /// CRC-32 over the whole stream.
    pub fn full_checksum(&self) -> u32 {
        self.full_checksum
    }

    pub fn is_encrypted(&self) -> bool {
        self.cipher.is_some()
    }

    pub fn open_transaction(&self) -> TransactionBuilder {
        TransactionBuilder::new(format!("file open {}", self.handle)).write(
            self.characteristics.control,
            &codec::encode_put(self.handle, self.stream_len),
        )
    }

    fn upload_transaction(&self) -> TransactionBuilder {
        self.packets
            .iter()
            .fold(TransactionBuilder::new("file upload"), |builder, packet| {
                let mut wire = packet.to_wire();
                if let Some((cipher, offset)) = &self.cipher {
                    cipher.apply(*offset, &mut wire);
                }
                builder.add(Action::Write {
                    characteristic: self.characteristics.data,
                    payload: wire,
                })
            })
    }

    fn close_transaction(&self) -> TransactionBuilder {
        TransactionBuilder::new("file close").write(
            self.characteristics.control,
            &codec::encode_close(self.handle),
        )
    }

    /// Advance on a control-characteristic response. Returns the next
    /// transaction to queue, if any. Any error leaves the request `Failed`.
    pub fn handle_response(
        &mut self,
        value: &[u8],
    ) -> Result<Option<TransactionBuilder>, TransferError> {
        if matches!(self.state, UploadState::Uploaded | UploadState::Failed) {
            return Ok(None);
        }
        self.advance(value).inspect_err(|e| {
            warn!("upload {} failed: {}", self.handle, e);
            self.state = UploadState::Failed;
        })
    }

    fn advance(&mut self, value: &[u8]) -> Result<Option<TransactionBuilder>, TransferError> {
        let response = codec::parse_response(value)?;
        match (self.state, response) {
            (_, Response::Timeout) => Err(TransferError::RemoteTimeout),
            (_, Response::Intermediate { .. }) => Ok(None),
            (UploadState::Initialized, Response::PutAck { handle, status }) => {
                self.check(handle, status)?;
                self.state = UploadState::Uploading;
                info!(
                    "upload {}: {} bytes in {} packets",
                    self.handle,
                    self.stream_len,
                    self.packets.len()
                );
                Ok(Some(self.upload_transaction()))
            }
            (UploadState::Uploading, Response::Verify {
                handle, status, crc, ..
            }) => {
                self.check(handle, status)?;
                if crc != self.full_checksum {
                    return Err(ProtocolError::ChecksumMismatch {
                        expected: self.full_checksum,
                        actual: crc,
                    }
                    .into());
                }
                self.state = UploadState::Closing;
                Ok(Some(self.close_transaction()))
            }
            (UploadState::Closing, Response::CloseAck { handle, status }) => {
                self.check(handle, status)?;
                self.state = UploadState::Uploaded;
                info!("upload {} complete", self.handle);
                Ok(None)
            }
            (_, other) => Err(ProtocolError::UnexpectedResponse {
                class: other.class(),
            }
            .into()),
        }
    }

    fn check(&self, handle: FileHandle, status: ResultCode) -> Result<(), TransferError> {
        if handle != self.handle {
            return Err(ProtocolError::WrongHandle {
                expected: self.handle.0,
                actual: handle.0,
            }
            .into());
        }
        if !status.is_success() {
            return Err(TransferError::Remote(status));
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────
