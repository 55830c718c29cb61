//! Fuzz target: `parse_response`
//!
//! Feeds arbitrary control-characteristic values to the response parser
//! and to both transfer state machines. None of them may panic, and a
//! decoded response must carry the class from the first nibble.
//!
//! cargo fuzz run fuzz_response_header

#![no_main]

use libfuzzer_sys::fuzz_target;
use uuid::Uuid;
use wearlink::config::TransferConfig;
use wearlink::transfer::codec::parse_response;
use wearlink::transfer::{FileGetRequest, FileHandle, FilePutRequest, TransferCharacteristics};

const CHARS: TransferCharacteristics = TransferCharacteristics {
    control: Uuid::from_u128(1),
    data: Uuid::from_u128(2),
};

fuzz_target!(|data: &[u8]| {
    if let Ok(response) = parse_response(data) {
        assert_eq!(response.class(), data[0] & 0x0F);
    }

    let config = TransferConfig::default();
    if let Ok(mut put) = FilePutRequest::new(FileHandle(0x42), b"fuzz", 23, CHARS, &config) {
        let _ = put.handle_response(data);
    }
    let mut get = FileGetRequest::new(FileHandle(0x42), CHARS, &config);
    let _ = get.handle_response(data);
});
