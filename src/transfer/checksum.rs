//! Transfer checksums.
//!
//! - CRC-32 (ISO-HDLC) over the whole transfer stream, compared with the
//!   value the remote reports after the last packet.
//! - CRC-32C (Castagnoli) over the payload, appended to it as a 4-byte
//!   little-endian trailer to form the stream.

extern crate alloc;
use alloc::vec::Vec;

use crc::{CRC_32_ISCSI, CRC_32_ISO_HDLC, Crc};

use crate::error::ProtocolError;

const CRC32: Crc<u32> = Crc::<u32>::new(&CRC_32_ISO_HDLC);
const CRC32C: Crc<u32> = Crc::<u32>::new(&CRC_32_ISCSI);

pub const TRAILER_LEN: usize = 4;

pub fn crc32(data: &[u8]) -> u32 {
    CRC32.checksum(data)
}

pub fn crc32c(data: &[u8]) -> u32 {
    CRC32C.checksum(data)
}

/// Build the transfer stream: `payload ‖ crc32c(payload)`.
pub fn with_trailer(payload: &[u8]) -> Vec<u8> {
    let mut stream = Vec::with_capacity(payload.len() + TRAILER_LEN);
    stream.extend_from_slice(payload);
    stream.extend_from_slice(&crc32c(payload).to_le_bytes());
    stream
}

/// Verify a stream's trailer and return the payload part.
pub fn strip_trailer(stream: &[u8]) -> Result<&[u8], ProtocolError> {
    if stream.len() < TRAILER_LEN {
        return Err(ProtocolError::Truncated { len: stream.len() });
    }
    let (payload, trailer) = stream.split_at(stream.len() - TRAILER_LEN);
    let expected = u32::from_le_bytes([trailer[0], trailer[1], trailer[2], trailer[3]]);
    let actual = crc32c(payload);
    if actual != expected {
        return Err(ProtocolError::TrailerMismatch { expected, actual });
    }
    Ok(payload)
}
