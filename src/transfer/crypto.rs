//! AES-128-CTR packet cipher for encrypted file transfers.
//!
//! The key and both nonces come from the device driver's authentication
//! handshake. The IV is derived from the nonces plus a small counter offset:
//!
//! ```text
//! iv[0..2]  = 00 00
//! iv[2..8]  = phone_nonce[0..6]
//! iv[8]     = 00
//! iv[9..16] = watch_nonce[0..7]
//! iv[7]    += offset   (wrapping)
//! ```
//!
//! Every packet is processed with a fresh keystream starting at that IV.
//! Downloads do not announce their offset, so the first packet is
//! trial-decrypted over a bounded window of offsets.

use core::ops::RangeInclusive;

use aes::Aes128;
use ctr::cipher::{KeyIvInit, StreamCipher};
use log::debug;

use crate::error::ProtocolError;

type Aes128Ctr = ctr::Ctr128BE<Aes128>;

#[derive(Clone)]
pub struct FileCipher {
    key: [u8; 16],
    phone_nonce: [u8; 8],
    watch_nonce: [u8; 8],
}

impl FileCipher {
    pub fn new(key: [u8; 16], phone_nonce: [u8; 8], watch_nonce: [u8; 8]) -> Self {
        Self {
            key,
            phone_nonce,
            watch_nonce,
        }
    }

    pub fn iv(&self, offset: u8) -> [u8; 16] {
        let mut iv = [0u8; 16];
        iv[2..8].copy_from_slice(&self.phone_nonce[..6]);
        iv[9..16].copy_from_slice(&self.watch_nonce[..7]);
        iv[7] = iv[7].wrapping_add(offset);
        iv
    }

    /// Encrypt or decrypt `packet` in place.
    pub fn apply(&self, offset: u8, packet: &mut [u8]) {
        let mut cipher = Aes128Ctr::new(&self.key.into(), &self.iv(offset).into());
        cipher.apply_keystream(packet);
    }

    /// Find the IV offset whose keystream turns the first byte of
    /// `first_packet` into `marker`.
    pub fn find_offset(
        &self,
        first_packet: &[u8],
        window: RangeInclusive<u8>,
        marker: u8,
    ) -> Result<u8, ProtocolError> {
        let Some(&first) = first_packet.first() else {
            return Err(ProtocolError::Truncated { len: 0 });
        };
        for offset in window {
            let mut trial = [first];
            self.apply(offset, &mut trial);
            if trial[0] == marker {
                debug!("download keystream at IV offset {}", offset);
                return Ok(offset);
            }
        }
        Err(ProtocolError::CipherOffsetNotFound)
    }
}

impl core::fmt::Debug for FileCipher {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.write_str("FileCipher { .. }")
    }
}
