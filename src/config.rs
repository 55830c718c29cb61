//! Engine configuration parameters
//!
//! Tunables for the transaction queue and the file-transfer protocol.
//! Everything here is serde-serializable so a host application can keep it
//! next to its own settings.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

/// Largest characteristic value a GATT write can carry.
pub const MAX_ATT_VALUE: usize = 512;

/// Dispatcher worker settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueueConfig {
    /// Reconnect automatically when an initialized device drops
    pub auto_reconnect: bool,
    /// Name of the dispatcher thread
    pub thread_name: String,
    /// Dispatcher thread stack size (KiB)
    pub stack_kb: u32,
}

impl Default for QueueConfig {
    fn default() -> Self {
        Self {
            auto_reconnect: false,
            thread_name: "gatt-dispatch".into(),
            stack_kb: 64,
        }
    }
}

/// File-transfer protocol settings
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransferConfig {
    // --- Chunking ---
    /// Bytes of each ATT write not available for stream data (sequence byte)
    pub packet_overhead: u16,
    /// Upper bound on upload payloads and declared download lengths (bytes)
    pub max_file_size: u32,

    // --- Encryption ---
    /// IV counter offset used when encrypting uploads
    pub upload_iv_offset: u8,
    /// First IV offset tried when locating a download's keystream
    pub iv_search_start: u8,
    /// Last IV offset tried (inclusive)
    pub iv_search_end: u8,
    /// Leading plaintext byte that identifies a correct trial decryption
    pub expected_marker: u8,
}

impl Default for TransferConfig {
    fn default() -> Self {
        Self {
            // Chunking
            packet_overhead: 1,
            max_file_size: 4 * 1024 * 1024, // 4 MiB

            // Encryption
            upload_iv_offset: 1,
            iv_search_start: 15,
            iv_search_end: 30,
            expected_marker: 0x00,
        }
    }
}

/// Full engine configuration
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub queue: QueueConfig,
    pub transfer: TransferConfig,
}

impl EngineConfig {
    /// Reject values the engine cannot run with.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.queue.validate()?;
        self.transfer.validate()
    }
}

impl QueueConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.thread_name.is_empty() {
            return Err(ConfigError::Invalid("queue.thread_name"));
        }
        if self.stack_kb < 16 {
            return Err(ConfigError::Invalid("queue.stack_kb"));
        }
        Ok(())
    }
}

impl TransferConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.packet_overhead == 0 || self.packet_overhead as usize >= MAX_ATT_VALUE {
            return Err(ConfigError::Invalid("transfer.packet_overhead"));
        }
        if self.max_file_size == 0 {
            return Err(ConfigError::Invalid("transfer.max_file_size"));
        }
        if self.iv_search_start > self.iv_search_end {
            return Err(ConfigError::Invalid("transfer.iv_search_start"));
        }
        Ok(())
    }
}
