//! File-transfer wire codec.
//!
//! Requests (all integers little-endian):
//!
//! ```text
//! Put   : 03 hh hh 00 00 00 00 LL LL LL LL LL LL LL LL   (15 bytes)
//! Get   : 01 hh hh 00 00 00 00 FF FF FF FF               (11 bytes)
//! Close : 04 hh hh                                       ( 3 bytes)
//! Data  : ss <chunk>                                     (≤ MTU)
//! ```
//!
//! Responses share a header: low nibble of byte 0 is the response class,
//! bytes 1-2 the handle, byte 3 the status.
//!
//! ```text
//! class 1  get ack   ≥ 8 bytes   + declared length u32 @4
//! class 3  put ack   = 5 bytes
//! class 4  close ack = 4 bytes   (9-byte frames are intermediate)
//! class 8  verify    ≥12 bytes   + length u32 @4, crc32 u32 @8
//!                                (4-byte frames are intermediate)
//! class 9  timeout   any length
//! ```

use core::fmt;

use super::status::ResultCode;
use crate::error::ProtocolError;

// ── Opcodes & classes ────────────────────────────────────────

pub const OP_GET: u8 = 0x01;
pub const OP_PUT: u8 = 0x03;
pub const OP_CLOSE: u8 = 0x04;

pub const CLASS_GET_ACK: u8 = 1;
pub const CLASS_PUT_ACK: u8 = 3;
pub const CLASS_CLOSE_ACK: u8 = 4;
pub const CLASS_VERIFY: u8 = 8;
pub const CLASS_TIMEOUT: u8 = 9;

pub const PUT_REQUEST_LEN: usize = 15;
pub const GET_REQUEST_LEN: usize = 11;
pub const CLOSE_REQUEST_LEN: usize = 3;

/// Response header length (class, handle, status).
pub const HEADER_LEN: usize = 4;

// ── Handle ───────────────────────────────────────────────────

/// 16-bit identifier of a file on the remote device.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct FileHandle(pub u16);

impl FileHandle {
    pub fn to_le_bytes(self) -> [u8; 2] {
        self.0.to_le_bytes()
    }
}

impl fmt::Display for FileHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "0x{:04x}", self.0)
    }
}

// ── Requests ─────────────────────────────────────────────────

/// Open `handle` for upload of a `declared_len`-byte stream.
pub fn encode_put(handle: FileHandle, declared_len: u32) -> [u8; PUT_REQUEST_LEN] {
    let mut out = [0u8; PUT_REQUEST_LEN];
    out[0] = OP_PUT;
    out[1..3].copy_from_slice(&handle.to_le_bytes());
    // 3..7: reserved, zero
    out[7..11].copy_from_slice(&declared_len.to_le_bytes());
    out[11..15].copy_from_slice(&declared_len.to_le_bytes());
    out
}

/// Open `handle` for download of the whole file.
pub fn encode_get(handle: FileHandle) -> [u8; GET_REQUEST_LEN] {
    let mut out = [0u8; GET_REQUEST_LEN];
    out[0] = OP_GET;
    out[1..3].copy_from_slice(&handle.to_le_bytes());
    // 3..7: range start 0
    out[7..11].copy_from_slice(&u32::MAX.to_le_bytes());
    out
}

pub fn encode_close(handle: FileHandle) -> [u8; CLOSE_REQUEST_LEN] {
    let h = handle.to_le_bytes();
    [OP_CLOSE, h[0], h[1]]
}

// ── Responses ────────────────────────────────────────────────

/// A decoded control-characteristic response.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Response {
    GetAck {
        handle: FileHandle,
        status: ResultCode,
        length: u32,
    },
    PutAck {
        handle: FileHandle,
        status: ResultCode,
    },
    CloseAck {
        handle: FileHandle,
        status: ResultCode,
    },
    Verify {
        handle: FileHandle,
        status: ResultCode,
        length: u32,
        crc: u32,
    },
    Timeout,
    /// Progress frame with no meaning for the state machine.
    Intermediate { class: u8 },
}

impl Response {
    pub fn class(&self) -> u8 {
        match self {
            Self::GetAck { .. } => CLASS_GET_ACK,
            Self::PutAck { .. } => CLASS_PUT_ACK,
            Self::CloseAck { .. } => CLASS_CLOSE_ACK,
            Self::Verify { .. } => CLASS_VERIFY,
            Self::Timeout => CLASS_TIMEOUT,
            Self::Intermediate { class } => *class,
        }
    }
}

fn read_u32(value: &[u8], at: usize) -> u32 {
    u32::from_le_bytes([value[at], value[at + 1], value[at + 2], value[at + 3]])
}

/// Decode a response frame.
pub fn parse_response(value: &[u8]) -> Result<Response, ProtocolError> {
    let Some(&first) = value.first() else {
        return Err(ProtocolError::Truncated { len: 0 });
    };
    let class = first & 0x0F;
    let len = value.len();

    if class == CLASS_TIMEOUT {
        return Ok(Response::Timeout);
    }

    let malformed = ProtocolError::Malformed { class, len };
    if len < HEADER_LEN {
        return match class {
            CLASS_GET_ACK | CLASS_PUT_ACK | CLASS_CLOSE_ACK | CLASS_VERIFY => Err(malformed),
            _ => Err(ProtocolError::UnexpectedResponse { class }),
        };
    }
    let handle = FileHandle(u16::from_le_bytes([value[1], value[2]]));
    let status = ResultCode::from_u8(value[3]);

    match class {
        CLASS_GET_ACK if len >= 8 => Ok(Response::GetAck {
            handle,
            status,
            length: read_u32(value, 4),
        }),
        CLASS_PUT_ACK if len == 5 => Ok(Response::PutAck { handle, status }),
        CLASS_CLOSE_ACK if len == 4 => Ok(Response::CloseAck { handle, status }),
        CLASS_CLOSE_ACK if len == 9 => Ok(Response::Intermediate { class }),
        CLASS_VERIFY if len == 4 => Ok(Response::Intermediate { class }),
        CLASS_VERIFY if len >= 12 => Ok(Response::Verify {
            handle,
            status,
            length: read_u32(value, 4),
            crc: read_u32(value, 8),
        }),
        CLASS_GET_ACK | CLASS_PUT_ACK | CLASS_CLOSE_ACK | CLASS_VERIFY => Err(malformed),
        _ => Err(ProtocolError::UnexpectedResponse { class }),
    }
}

// ── Tests ────────────────────────────────────────────────────
