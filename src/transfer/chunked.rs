//! Packetization of transfer streams.
//!
//! A stream is cut into chunks of `mtu - overhead` bytes; each chunk goes
//! out as one characteristic write prefixed with its sequence index.
//!
//! ```text
//! Packet 0: [00] stream[0 .. c]
//! Packet 1: [01] stream[c .. 2c]
//! Packet N: [NN] stream[Nc .. len]     (sequence wraps at 256)
//! ```
//!
//! The receiving side checks the sequence and refuses data beyond the
//! declared length.

extern crate alloc;
use alloc::vec::Vec;

use super::checksum::{self, crc32};
use crate::config::MAX_ATT_VALUE;
use crate::error::ProtocolError;

/// Largest chunk a packet can carry (one byte goes to the sequence index).
pub const MAX_CHUNK: usize = MAX_ATT_VALUE - 1;

/// One data packet: sequence index plus a chunk of the stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Packet {
    pub sequence: u8,
    pub bytes: heapless::Vec<u8, MAX_CHUNK>,
}

impl Packet {
    /// Bytes as written to the data characteristic.
    pub fn to_wire(&self) -> Vec<u8> {
        let mut wire = Vec::with_capacity(self.bytes.len() + 1);
        wire.push(self.sequence);
        wire.extend_from_slice(&self.bytes);
        wire
    }
}

/// Usable chunk size for an MTU. The MTU is clamped to the largest ATT
/// value.
pub fn chunk_size(mtu: u16, overhead: u16) -> Result<usize, ProtocolError> {
    let mtu_usable = (mtu as usize).min(MAX_ATT_VALUE);
    let overhead = overhead.max(1) as usize;
    if mtu_usable <= overhead {
        return Err(ProtocolError::MtuTooSmall { mtu });
    }
    Ok((mtu_usable - overhead).min(MAX_CHUNK))
}

/// Split `stream` into sequenced packets.
pub fn packetize(stream: &[u8], mtu: u16, overhead: u16) -> Result<Vec<Packet>, ProtocolError> {
    let size = chunk_size(mtu, overhead)?;
    stream
        .chunks(size)
        .enumerate()
        .map(|(i, chunk)| {
            let bytes = heapless::Vec::from_slice(chunk)
                .map_err(|()| ProtocolError::PayloadTooLarge { len: chunk.len() })?;
            Ok(Packet {
                sequence: i as u8,
                bytes,
            })
        })
        .collect()
}

/// Download-side reassembly of a declared-length stream.
pub struct Reassembler {
    declared: u32,
    next_sequence: u8,
    buffer: Vec<u8>,
}

impl Reassembler {
    pub fn new(declared: u32, max_len: u32) -> Result<Self, ProtocolError> {
        if declared > max_len {
            return Err(ProtocolError::PayloadTooLarge {
                len: declared as usize,
            });
        }
        if (declared as usize) < checksum::TRAILER_LEN {
            return Err(ProtocolError::Truncated {
                len: declared as usize,
            });
        }
        Ok(Self {
            declared,
            next_sequence: 0,
            buffer: Vec::with_capacity(declared as usize),
        })
    }

    /// Feed one wire packet (sequence byte included).
    pub fn push(&mut self, wire: &[u8]) -> Result<(), ProtocolError> {
        let Some((&sequence, chunk)) = wire.split_first() else {
            return Err(ProtocolError::Truncated { len: 0 });
        };
        if sequence != self.next_sequence {
            return Err(ProtocolError::SequenceGap {
                expected: self.next_sequence,
                actual: sequence,
            });
        }
        if self.buffer.len() + chunk.len() > self.declared as usize {
            return Err(ProtocolError::Overflow);
        }
        self.buffer.extend_from_slice(chunk);
        self.next_sequence = self.next_sequence.wrapping_add(1);
        Ok(())
    }

    pub fn received(&self) -> u32 {
        self.buffer.len() as u32
    }

    pub fn is_complete(&self) -> bool {
        self.received() == self.declared
    }

    /// Check the whole-stream CRC-32 and the trailer; return the payload.
    pub fn finish(self, expected_crc: u32) -> Result<Vec<u8>, ProtocolError> {
        if !self.is_complete() {
            return Err(ProtocolError::LengthMismatch {
                declared: self.declared,
                received: self.received(),
            });
        }
        let actual = crc32(&self.buffer);
        if actual != expected_crc {
            return Err(ProtocolError::ChecksumMismatch {
                expected: expected_crc,
                actual,
            });
        }
        let payload_len = checksum::strip_trailer(&self.buffer)?.len();
        let mut stream = self.buffer;
        stream.truncate(payload_len);
        Ok(stream)
    }
}

// ── Tests ────────────────────────────────────────────────────
