//! End-to-end file transfers through the queue against the simulated
//! remote endpoint in `mock_link`.

use std::sync::Arc;

use wearlink::btle::{BtleQueue, GattStatus};
use wearlink::config::{QueueConfig, TransferConfig};
use wearlink::error::{LinkError, ProtocolError, TransferError};
use wearlink::transfer::{
    FileCipher, FileHandle, FileTransferService, ResultCode, TransferOutcome,
};

use crate::mock_link::{
    CHARS, CONTROL, DATA, MockControl, MockLink, RecordingSink, TIMEOUT, wait_until,
};

fn setup() -> (BtleQueue, MockControl, FileTransferService) {
    let service = FileTransferService::new(CHARS, TransferConfig::default());
    let (link, control) = MockLink::new();
    let queue = BtleQueue::new(
        link,
        Some(Arc::new(service.clone())),
        RecordingSink::default(),
        &QueueConfig::default(),
    )
    .unwrap();
    assert!(queue.connect());
    assert!(wait_until(TIMEOUT, || queue.is_connected()));
    (queue, control, service)
}

fn payload(len: usize) -> Vec<u8> {
    (0..len).map(|i| (i * 7 + 3) as u8).collect()
}

fn cipher() -> FileCipher {
    FileCipher::new(
        *b"0123456789abcdef",
        [0x11, 0x22, 0x33, 0x44, 0x55, 0x66, 0x77, 0x88],
        [0x99, 0xaa, 0xbb, 0xcc, 0xdd, 0xee, 0xff, 0x01],
    )
}

// ── Upload ───────────────────────────────────────────────────

#[test]
fn upload_sends_two_packets_and_closes() {
    let (queue, link, service) = setup();
    let data = payload(37);

    let ticket = service
        .upload(&queue.handle(), FileHandle(0x0042), &data, 23, None)
        .unwrap();
    let outcome = ticket.wait_blocking(TIMEOUT).expect("upload timed out");
    assert_eq!(
        outcome,
        Ok(TransferOutcome::Uploaded {
            handle: FileHandle(0x0042)
        })
    );

    // 37 bytes + 4 byte trailer, 22 stream bytes per packet.
    let packets = link.writes_to(DATA);
    assert_eq!(packets.len(), 2);
    assert_eq!(packets[0][0], 0);
    assert_eq!(packets[0].len(), 23);
    assert_eq!(packets[1][0], 1);
    assert_eq!(packets[1].len(), 20);

    let control = link.writes_to(CONTROL);
    assert_eq!(control.len(), 2);
    assert_eq!(&control[0][..3], &[0x03, 0x42, 0x00]);
    assert_eq!(&control[0][7..11], &41u32.to_le_bytes());
    assert_eq!(control[1], vec![0x04, 0x42, 0x00]);

    assert_eq!(link.file(0x0042), Some(data));
    assert!(!service.is_busy());
}

#[test]
fn corrupted_upload_fails_verification() {
    let (queue, link, service) = setup();
    link.corrupt_uploads();

    let ticket = service
        .upload(&queue.handle(), FileHandle(5), &payload(64), 64, None)
        .unwrap();
    let outcome = ticket.wait_blocking(TIMEOUT).expect("upload timed out");
    assert!(matches!(
        outcome,
        Err(TransferError::Protocol(ProtocolError::ChecksumMismatch { .. }))
    ));
    // Never closed.
    assert_eq!(link.writes_to(CONTROL).len(), 1);
}

#[test]
fn busy_remote_reports_transient_error() {
    let (queue, link, service) = setup();
    link.set_put_status(4);

    let ticket = service
        .upload(&queue.handle(), FileHandle(5), &payload(10), 64, None)
        .unwrap();
    let err = ticket.wait_blocking(TIMEOUT).unwrap().unwrap_err();
    assert_eq!(err, TransferError::Remote(ResultCode::SocketBusy));
    assert!(err.is_transient());
    assert!(link.writes_to(DATA).is_empty());
}

#[test]
fn failed_control_write_fails_transfer() {
    let (queue, link, service) = setup();
    link.fail_with(CONTROL, GattStatus::ERROR);

    let ticket = service
        .upload(&queue.handle(), FileHandle(5), &payload(10), 64, None)
        .unwrap();
    assert_eq!(
        ticket.wait_blocking(TIMEOUT),
        Some(Err(TransferError::Link(LinkError::Status(GattStatus::ERROR))))
    );
}

// ── Download ─────────────────────────────────────────────────

#[test]
fn download_reassembles_remote_file() {
    let (queue, link, service) = setup();
    let data = payload(300);
    link.store_file(7, &data);

    let ticket = service
        .download(&queue.handle(), FileHandle(7), None)
        .unwrap();
    let outcome = ticket.wait_blocking(TIMEOUT).expect("download timed out");
    assert_eq!(
        outcome,
        Ok(TransferOutcome::Downloaded {
            handle: FileHandle(7),
            payload: data,
        })
    );

    let control = link.writes_to(CONTROL);
    assert_eq!(control.len(), 1);
    assert_eq!(&control[0][..3], &[0x01, 0x07, 0x00]);
    assert_eq!(&control[0][7..11], &[0xff; 4]);
}

#[test]
fn download_of_missing_file_reports_not_found() {
    let (queue, _link, service) = setup();

    let ticket = service
        .download(&queue.handle(), FileHandle(9), None)
        .unwrap();
    let err = ticket.wait_blocking(TIMEOUT).unwrap().unwrap_err();
    assert_eq!(err, TransferError::Remote(ResultCode::NotFound));
    assert!(!err.is_transient());
}

// ── Encryption ───────────────────────────────────────────────

#[test]
fn encrypted_round_trip() {
    let (queue, link, service) = setup();
    let config = TransferConfig::default();
    link.set_remote_cipher(cipher(), config.upload_iv_offset, config.iv_search_start);
    let data = payload(150);

    let up = service
        .upload(&queue.handle(), FileHandle(3), &data, 40, Some(cipher()))
        .unwrap();
    assert_eq!(
        up.wait_blocking(TIMEOUT),
        Some(Ok(TransferOutcome::Uploaded {
            handle: FileHandle(3)
        }))
    );
    assert_eq!(link.file(3).as_deref(), Some(&data[..]));
    // Packets on the air are not plaintext.
    assert!(!link.writes_to(DATA)[0][1..].starts_with(&data[..8]));

    let down = service
        .download(&queue.handle(), FileHandle(3), Some(cipher()))
        .unwrap();
    assert_eq!(
        down.wait_blocking(TIMEOUT),
        Some(Ok(TransferOutcome::Downloaded {
            handle: FileHandle(3),
            payload: data,
        }))
    );
}

// ── Concurrency & failures ───────────────────────────────────

#[test]
fn second_transfer_is_rejected_while_busy() {
    let service = FileTransferService::new(CHARS, TransferConfig::default());
    let (link, _control) = MockLink::new();
    let queue = BtleQueue::new(link, None, RecordingSink::default(), &QueueConfig::default())
        .unwrap();

    // Not connected: the open transaction parks in the queue.
    let first = service
        .upload(&queue.handle(), FileHandle(1), &payload(8), 64, None)
        .unwrap();
    assert!(service.is_busy());
    assert_eq!(
        service
            .download(&queue.handle(), FileHandle(2), None)
            .unwrap_err(),
        TransferError::Busy
    );

    service.cancel();
    assert_eq!(first.try_result(), Some(Err(TransferError::Aborted)));
    assert!(!service.is_busy());
}

#[test]
fn disconnect_fails_active_transfer() {
    let (queue, link, service) = setup();
    link.never_complete(DATA);

    let ticket = service
        .upload(&queue.handle(), FileHandle(4), &payload(100), 23, None)
        .unwrap();
    assert!(wait_until(TIMEOUT, || !link.writes_to(DATA).is_empty()));

    link.drop_link();
    assert_eq!(
        ticket.wait_blocking(TIMEOUT),
        Some(Err(TransferError::Link(LinkError::Disconnected)))
    );
    assert!(!service.is_busy());
    assert_eq!(link.writes_to(DATA).len(), 1);
}

#[test]
fn rejected_packet_write_fails_transfer() {
    let (queue, link, service) = setup();
    link.reject(DATA);

    let ticket = service
        .upload(&queue.handle(), FileHandle(0x0042), &payload(37), 23, None)
        .unwrap();
    assert_eq!(
        ticket.wait_blocking(TIMEOUT),
        Some(Err(TransferError::Aborted))
    );
    assert!(!service.is_busy());
    assert_eq!(link.writes_to(CONTROL).len(), 1);
}

#[test]
fn interrupted_transfer_frees_the_service() {
    let (queue, link, service) = setup();
    link.never_complete(DATA);

    let ticket = service
        .upload(&queue.handle(), FileHandle(4), &payload(100), 23, None)
        .unwrap();
    assert!(wait_until(TIMEOUT, || !link.writes_to(DATA).is_empty()));

    queue.interrupt();
    assert_eq!(
        ticket.wait_blocking(TIMEOUT),
        Some(Err(TransferError::Aborted))
    );
    assert!(!service.is_busy());
}

#[test]
fn transfer_dropped_before_connecting_is_aborted() {
    let service = FileTransferService::new(CHARS, TransferConfig::default());
    let (link, _control) = MockLink::new();
    let queue = BtleQueue::new(link, None, RecordingSink::default(), &QueueConfig::default())
        .unwrap();

    let ticket = service
        .download(&queue.handle(), FileHandle(2), None)
        .unwrap();
    // Taken by the dispatcher and parked on the connection wait.
    assert!(wait_until(TIMEOUT, || queue.is_empty()));

    queue.interrupt();
    assert_eq!(
        ticket.wait_blocking(TIMEOUT),
        Some(Err(TransferError::Aborted))
    );
    assert!(!service.is_busy());
    assert!(service
        .download(&queue.handle(), FileHandle(2), None)
        .is_ok());
}
