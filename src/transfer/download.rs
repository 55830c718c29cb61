//! Download state machine.
//!
//! Flow: Get → get ack (declared length) → N × data packet → end frame
//!
//! ```text
//!  Initialized ──get ack──▶ Downloading ──end frame + checks──▶ Downloaded
//!       └─────────────────────────┴──────────error──────────▶ Failed
//! ```
//!
//! Data packets arrive as notifications on the data characteristic and are
//! fed through [`FileGetRequest::handle_data`].

extern crate alloc;
use alloc::vec::Vec;
use core::ops::RangeInclusive;

use log::{info, warn};

use super::TransferCharacteristics;
use super::chunked::Reassembler;
use super::codec::{self, FileHandle, Response};
use super::crypto::FileCipher;
use super::status::ResultCode;
use crate::btle::transaction::TransactionBuilder;
use crate::config::TransferConfig;
use crate::error::{ProtocolError, TransferError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DownloadState {
    Initialized,
    Downloading,
    Downloaded,
    Failed,
}

pub struct FileGetRequest {
    handle: FileHandle,
    characteristics: TransferCharacteristics,
    state: DownloadState,
    max_file_size: u32,
    reassembler: Option<Reassembler>,
    cipher: Option<FileCipher>,
    search_window: RangeInclusive<u8>,
    marker: u8,
    offset: Option<u8>,
    payload: Option<Vec<u8>>,
}

impl FileGetRequest {
    pub fn new(
        handle: FileHandle,
        characteristics: TransferCharacteristics,
        config: &TransferConfig,
    ) -> Self {
        Self {
            handle,
            characteristics,
            state: DownloadState::Initialized,
            max_file_size: config.max_file_size,
            reassembler: None,
            cipher: None,
            search_window: config.iv_search_start..=config.iv_search_end,
            marker: config.expected_marker,
            offset: None,
            payload: None,
        }
    }

    /// Decrypt incoming packets with `cipher`.
    #[must_use]
    pub fn with_cipher(mut self, cipher: FileCipher) -> Self {
        self.cipher = Some(cipher);
        self
    }

    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    pub fn state(&self) -> DownloadState {
        self.state
    }

    /// IV offset adopted after the first encrypted packet.
    pub fn cipher_offset(&self) -> Option<u8> {
        self.offset
    }

    pub fn open_transaction(&self) -> TransactionBuilder {
        TransactionBuilder::new(format!("file get {}", self.handle))
            .write(self.characteristics.control, &codec::encode_get(self.handle))
    }

    /// The verified payload, once `Downloaded`.
    pub fn take_payload(&mut self) -> Option<Vec<u8>> {
        self.payload.take()
    }

    fn is_terminal(&self) -> bool {
        matches!(self.state, DownloadState::Downloaded | DownloadState::Failed)
    }

    fn fail(&mut self, e: TransferError) -> TransferError {
        warn!("download {} failed: {}", self.handle, e);
        self.state = DownloadState::Failed;
        self.reassembler = None;
        e
    }

    /// Advance on a control-characteristic response.
    pub fn handle_response(&mut self, value: &[u8]) -> Result<(), TransferError> {
        if self.is_terminal() {
            return Ok(());
        }
        self.advance(value).map_err(|e| self.fail(e))
    }

    fn advance(&mut self, value: &[u8]) -> Result<(), TransferError> {
        let response = codec::parse_response(value)?;
        match (self.state, response) {
            (_, Response::Timeout) => Err(TransferError::RemoteTimeout),
            (_, Response::Intermediate { .. }) => Ok(()),
            (DownloadState::Initialized, Response::GetAck {
                handle,
                status,
                length,
            }) => {
                self.check(handle, status)?;
                self.reassembler = Some(Reassembler::new(length, self.max_file_size)?);
                self.state = DownloadState::Downloading;
                info!("download {}: {} bytes declared", self.handle, length);
                Ok(())
            }
            (DownloadState::Downloading, Response::Verify {
                handle, status, crc, ..
            }) => {
                self.check(handle, status)?;
                let reassembler = self.reassembler.take().ok_or(
                    ProtocolError::UnexpectedResponse {
                        class: codec::CLASS_VERIFY,
                    },
                )?;
                let payload = reassembler.finish(crc)?;
                info!("download {} complete ({} bytes)", self.handle, payload.len());
                self.payload = Some(payload);
                self.state = DownloadState::Downloaded;
                Ok(())
            }
            (_, other) => Err(ProtocolError::UnexpectedResponse {
                class: other.class(),
            }
            .into()),
        }
    }

    /// Feed one packet received on the data characteristic.
    pub fn handle_data(&mut self, packet: &[u8]) -> Result<(), TransferError> {
        if self.state != DownloadState::Downloading {
            if !self.is_terminal() {
                warn!("download {}: data before get ack ignored", self.handle);
            }
            return Ok(());
        }
        self.accept(packet).map_err(|e| self.fail(e))
    }

    fn accept(&mut self, packet: &[u8]) -> Result<(), TransferError> {
        let mut wire = packet.to_vec();
        if let Some(cipher) = &self.cipher {
            let offset = match self.offset {
                Some(offset) => offset,
                None => {
                    let offset =
                        cipher.find_offset(&wire, self.search_window.clone(), self.marker)?;
                    self.offset = Some(offset);
                    offset
                }
            };
            cipher.apply(offset, &mut wire);
        }
        let reassembler = self.reassembler.as_mut().ok_or(ProtocolError::Overflow)?;
        reassembler.push(&wire)?;
        Ok(())
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
