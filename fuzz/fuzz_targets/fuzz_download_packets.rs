//! Fuzz target: download reassembly
//!
//! Opens a download with a declared length taken from the input, then
//! feeds the rest of the input as data packets of varying size. Bad
//! sequences and overruns must surface as errors, never as panics.
//!
//! cargo fuzz run fuzz_download_packets

#![no_main]

use libfuzzer_sys::fuzz_target;
use uuid::Uuid;
use wearlink::config::TransferConfig;
use wearlink::transfer::{FileGetRequest, FileHandle, TransferCharacteristics};

const CHARS: TransferCharacteristics = TransferCharacteristics {
    control: Uuid::from_u128(1),
    data: Uuid::from_u128(2),
};

fuzz_target!(|data: &[u8]| {
    if data.len() < 3 {
        return;
    }
    let declared = u16::from_le_bytes([data[0], data[1]]) as u32;
    let step = usize::from(data[2] % 64) + 1;

    let config = TransferConfig::default();
    let mut get = FileGetRequest::new(FileHandle(7), CHARS, &config);
    let mut ack = vec![0x01, 0x07, 0x00, 0x00];
    ack.extend_from_slice(&declared.to_le_bytes());
    if get.handle_response(&ack).is_err() {
        return;
    }

    for packet in data[3..].chunks(step) {
        if get.handle_data(packet).is_err() {
            break;
        }
    }
});
