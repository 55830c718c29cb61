//! Mock GATT link and simulated remote file endpoint.
//!
//! Every operation is recorded. Completions and remote notifications are
//! delivered in order from a separate "platform" thread, like a real
//! Bluetooth stack would. The remote side speaks the file-transfer
//! protocol well enough to accept uploads and serve downloads.

#![allow(dead_code)]

use std::collections::{HashMap, HashSet};
use std::sync::mpsc::{self, Sender};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{Duration, Instant};

use uuid::Uuid;
use wearlink::app::events::EngineEvent;
use wearlink::app::ports::{EventSink, GattCallback};
use wearlink::btle::{GattLink, GattStatus, LinkEvent, LinkEventSender, LinkState, QueueHandle};
use wearlink::error::LinkError;
use wearlink::transfer::checksum::{crc32, with_trailer};
use wearlink::transfer::chunked::packetize;
use wearlink::transfer::{FileCipher, TransferCharacteristics};

pub const CONTROL: Uuid = Uuid::from_u128(0x3dda_0003_957f_7d4a_34a6_74696673_6d6a);
pub const DATA: Uuid = Uuid::from_u128(0x3dda_0004_957f_7d4a_34a6_74696673_6d6a);
pub const CHAR_A: Uuid = Uuid::from_u128(0xa0);
pub const CHAR_B: Uuid = Uuid::from_u128(0xb0);

pub const CHARS: TransferCharacteristics = TransferCharacteristics {
    control: CONTROL,
    data: DATA,
};

/// Poll `cond` until it holds or `timeout` expires.
pub fn wait_until(timeout: Duration, mut cond: impl FnMut() -> bool) -> bool {
    let deadline = Instant::now() + timeout;
    while Instant::now() < deadline {
        if cond() {
            return true;
        }
        std::thread::sleep(Duration::from_millis(2));
    }
    cond()
}

pub const TIMEOUT: Duration = Duration::from_secs(5);

// ── Recorded operations ──────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Op {
    Connect,
    Disconnect,
    DiscoverServices,
    Read(Uuid),
    Write(Uuid, Vec<u8>),
    Notify(Uuid, bool),
}

// ── Simulated remote ─────────────────────────────────────────

#[derive(Default)]
struct Remote {
    files: HashMap<u16, Vec<u8>>,
    /// Upload in progress: handle, declared length, received stream.
    receiving: Option<(u16, u32, Vec<u8>)>,
    put_status: u8,
    get_status: Option<u8>,
    corrupt_upload: bool,
    /// Cipher plus (upload offset, download offset).
    cipher: Option<(FileCipher, u8, u8)>,
    download_mtu: u16,
}

fn header(class: u8, handle: u16, status: u8) -> Vec<u8> {
    let h = handle.to_le_bytes();
    vec![class, h[0], h[1], status]
}

fn end_frame(handle: u16, length: u32, crc: u32) -> Vec<u8> {
    let mut v = header(0x08, handle, 0);
    v.extend_from_slice(&length.to_le_bytes());
    v.extend_from_slice(&crc.to_le_bytes());
    v
}

impl Remote {
    fn on_control(&mut self, value: &[u8]) -> Vec<LinkEvent> {
        let change = |value: Vec<u8>| LinkEvent::CharacteristicChanged {
            characteristic: CONTROL,
            value,
        };
        match value.first() {
            Some(0x03) if value.len() == 15 => {
                let handle = u16::from_le_bytes([value[1], value[2]]);
                let declared = u32::from_le_bytes([value[7], value[8], value[9], value[10]]);
                let mut ack = header(0x03, handle, self.put_status);
                ack.push(0);
                if self.put_status == 0 {
                    self.receiving = Some((handle, declared, Vec::new()));
                }
                vec![change(ack)]
            }
            Some(0x04) if value.len() == 3 => {
                let handle = u16::from_le_bytes([value[1], value[2]]);
                vec![change(header(0x04, handle, 0))]
            }
            Some(0x01) if value.len() == 11 => {
                let handle = u16::from_le_bytes([value[1], value[2]]);
                self.serve(handle)
            }
            _ => Vec::new(),
        }
    }

    fn serve(&mut self, handle: u16) -> Vec<LinkEvent> {
        let Some(payload) = self.files.get(&handle) else {
            let mut ack = header(0x01, handle, self.get_status.unwrap_or(131));
            ack.extend_from_slice(&0u32.to_le_bytes());
            return vec![LinkEvent::CharacteristicChanged {
                characteristic: CONTROL,
                value: ack,
            }];
        };
        let stream = with_trailer(payload);
        let mut ack = header(0x01, handle, self.get_status.unwrap_or(0));
        ack.extend_from_slice(&(stream.len() as u32).to_le_bytes());
        let mut events = vec![LinkEvent::CharacteristicChanged {
            characteristic: CONTROL,
            value: ack,
        }];
        for packet in packetize(&stream, self.download_mtu, 1).unwrap() {
            let mut wire = packet.to_wire();
            if let Some((cipher, _, offset)) = &self.cipher {
                cipher.apply(*offset, &mut wire);
            }
            events.push(LinkEvent::CharacteristicChanged {
                characteristic: DATA,
                value: wire,
            });
        }
        events.push(LinkEvent::CharacteristicChanged {
            characteristic: CONTROL,
            value: end_frame(handle, stream.len() as u32, crc32(&stream)),
        });
        events
    }

    fn on_data(&mut self, value: &[u8]) -> Vec<LinkEvent> {
        let Some((handle, declared, received)) = self.receiving.as_mut() else {
            return Vec::new();
        };
        let mut wire = value.to_vec();
        if let Some((cipher, offset, _)) = &self.cipher {
            cipher.apply(*offset, &mut wire);
        }
        received.extend_from_slice(&wire[1..]);
        if received.len() as u32 != *declared {
            return Vec::new();
        }
        let (handle, declared) = (*handle, *declared);
        let mut stream = std::mem::take(received);
        self.receiving = None;
        if self.corrupt_upload {
            stream[0] ^= 0x01;
        }
        let crc = crc32(&stream);
        stream.truncate(stream.len() - 4);
        self.files.insert(handle, stream);
        vec![LinkEvent::CharacteristicChanged {
            characteristic: CONTROL,
            value: end_frame(handle, declared, crc),
        }]
    }
}

// ── Mock link ────────────────────────────────────────────────

struct State {
    ops: Vec<Op>,
    events: Option<LinkEventSender>,
    connected: bool,
    auto_connect: bool,
    reject: HashSet<Uuid>,
    silent: HashSet<Uuid>,
    fail_status: HashMap<Uuid, GattStatus>,
    remote: Remote,
}

/// Shared view used by tests to configure and inspect the link.
#[derive(Clone)]
pub struct MockControl {
    state: Arc<Mutex<State>>,
    platform: Sender<(LinkEventSender, LinkEvent)>,
}

pub struct MockLink {
    control: MockControl,
}

impl MockLink {
    pub fn new() -> (Self, MockControl) {
        let (platform, rx) = mpsc::channel::<(LinkEventSender, LinkEvent)>();
        std::thread::Builder::new()
            .name("mock-platform".into())
            .spawn(move || {
                while let Ok((sender, event)) = rx.recv() {
                    sender.deliver(event);
                }
            })
            .unwrap();
        let control = MockControl {
            state: Arc::new(Mutex::new(State {
                ops: Vec::new(),
                events: None,
                connected: false,
                auto_connect: true,
                reject: HashSet::new(),
                silent: HashSet::new(),
                fail_status: HashMap::new(),
                remote: Remote {
                    download_mtu: 20,
                    ..Remote::default()
                },
            })),
            platform,
        };
        (
            Self {
                control: control.clone(),
            },
            control,
        )
    }
}

impl MockControl {
    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap()
    }

    fn emit(&self, state: &State, events: Vec<LinkEvent>) {
        if let Some(sender) = &state.events {
            for event in events {
                let _ = self.platform.send((sender.clone(), event));
            }
        }
    }

    pub fn ops(&self) -> Vec<Op> {
        self.lock().ops.clone()
    }

    /// Operations other than connection management.
    pub fn gatt_ops(&self) -> Vec<Op> {
        self.ops()
            .into_iter()
            .filter(|op| !matches!(op, Op::Connect | Op::Disconnect | Op::DiscoverServices))
            .collect()
    }

    pub fn writes_to(&self, characteristic: Uuid) -> Vec<Vec<u8>> {
        self.ops()
            .into_iter()
            .filter_map(|op| match op {
                Op::Write(c, v) if c == characteristic => Some(v),
                _ => None,
            })
            .collect()
    }

    pub fn set_auto_connect(&self, on: bool) {
        self.lock().auto_connect = on;
    }

    pub fn reject(&self, characteristic: Uuid) {
        self.lock().reject.insert(characteristic);
    }

    pub fn never_complete(&self, characteristic: Uuid) {
        self.lock().silent.insert(characteristic);
    }

    pub fn fail_with(&self, characteristic: Uuid, status: GattStatus) {
        self.lock().fail_status.insert(characteristic, status);
    }

    pub fn set_put_status(&self, status: u8) {
        self.lock().remote.put_status = status;
    }

    pub fn set_get_status(&self, status: u8) {
        self.lock().remote.get_status = Some(status);
    }

    pub fn corrupt_uploads(&self) {
        self.lock().remote.corrupt_upload = true;
    }

    pub fn set_remote_cipher(&self, cipher: FileCipher, upload_offset: u8, download_offset: u8) {
        self.lock().remote.cipher = Some((cipher, upload_offset, download_offset));
    }

    pub fn store_file(&self, handle: u16, payload: &[u8]) {
        self.lock().remote.files.insert(handle, payload.to_vec());
    }

    pub fn file(&self, handle: u16) -> Option<Vec<u8>> {
        self.lock().remote.files.get(&handle).cloned()
    }

    /// Deliver an arbitrary event through the platform thread.
    pub fn inject(&self, event: LinkEvent) {
        let state = self.lock();
        self.emit(&state, vec![event]);
    }

    /// Drop the connection from the remote side.
    pub fn drop_link(&self) {
        let mut state = self.lock();
        state.connected = false;
        self.emit(
            &state,
            vec![LinkEvent::ConnectionStateChanged {
                state: LinkState::Disconnected,
                status: GattStatus::SUCCESS,
            }],
        );
    }

    fn operation(&self, op: Op, characteristic: Uuid) -> Result<(), LinkError> {
        let mut state = self.lock();
        state.ops.push(op.clone());
        if state.reject.contains(&characteristic) {
            return Err(LinkError::Rejected("mock reject"));
        }
        if !state.connected {
            return Err(LinkError::NotConnected);
        }
        if state.silent.contains(&characteristic) {
            return Ok(());
        }
        let status = state
            .fail_status
            .get(&characteristic)
            .copied()
            .unwrap_or(GattStatus::SUCCESS);
        let mut events = vec![match &op {
            Op::Read(c) => LinkEvent::CharacteristicRead {
                characteristic: *c,
                value: vec![0x2A],
                status,
            },
            Op::Notify(c, _) => LinkEvent::DescriptorWrite {
                characteristic: *c,
                status,
            },
            _ => LinkEvent::CharacteristicWrite {
                characteristic,
                status,
            },
        }];
        if let Op::Write(c, value) = &op {
            if status.is_success() {
                if *c == CONTROL {
                    events.extend(state.remote.on_control(value));
                } else if *c == DATA {
                    events.extend(state.remote.on_data(value));
                }
            }
        }
        self.emit(&state, events);
        Ok(())
    }
}

impl GattLink for MockLink {
    fn connect(&mut self, events: LinkEventSender) -> Result<(), LinkError> {
        let mut state = self.control.lock();
        state.ops.push(Op::Connect);
        state.events = Some(events);
        if state.auto_connect {
            state.connected = true;
            self.control.emit(
                &state,
                vec![LinkEvent::ConnectionStateChanged {
                    state: LinkState::Connected,
                    status: GattStatus::SUCCESS,
                }],
            );
        }
        Ok(())
    }

    fn disconnect(&mut self) {
        let mut state = self.control.lock();
        state.ops.push(Op::Disconnect);
        if state.connected {
            state.connected = false;
            self.control.emit(
                &state,
                vec![LinkEvent::ConnectionStateChanged {
                    state: LinkState::Disconnected,
                    status: GattStatus::SUCCESS,
                }],
            );
        }
    }

    fn discover_services(&mut self) -> Result<(), LinkError> {
        let state = &mut *self.control.lock();
        state.ops.push(Op::DiscoverServices);
        self.control.emit(
            state,
            vec![LinkEvent::ServicesDiscovered {
                status: GattStatus::SUCCESS,
            }],
        );
        Ok(())
    }

    fn read_characteristic(&mut self, characteristic: Uuid) -> Result<(), LinkError> {
        self.control.operation(Op::Read(characteristic), characteristic)
    }

    fn write_characteristic(&mut self, characteristic: Uuid, value: &[u8]) -> Result<(), LinkError> {
        self.control
            .operation(Op::Write(characteristic, value.to_vec()), characteristic)
    }

    fn set_notify(&mut self, characteristic: Uuid, enable: bool) -> Result<(), LinkError> {
        self.control.operation(Op::Notify(characteristic, enable), characteristic)
    }
}

// ── Recording sink & callback ────────────────────────────────

#[derive(Clone, Default)]
pub struct RecordingSink(pub Arc<Mutex<Vec<EngineEvent>>>);

impl RecordingSink {
    pub fn events(&self) -> Vec<EngineEvent> {
        self.0.lock().unwrap().clone()
    }
}

impl EventSink for RecordingSink {
    fn emit(&mut self, event: &EngineEvent) {
        self.0.lock().unwrap().push(event.clone());
    }
}

#[derive(Default)]
pub struct RecordingCallback {
    pub changes: Mutex<Vec<(Uuid, Vec<u8>)>>,
    pub reads: Mutex<Vec<(Uuid, Vec<u8>)>>,
    pub discovered: Mutex<usize>,
}

impl RecordingCallback {
    pub fn changes(&self) -> Vec<(Uuid, Vec<u8>)> {
        self.changes.lock().unwrap().clone()
    }
}

impl GattCallback for RecordingCallback {
    fn on_services_discovered(&self, _queue: &QueueHandle) {
        *self.discovered.lock().unwrap() += 1;
    }

    fn on_characteristic_read(
        &self,
        _queue: &QueueHandle,
        characteristic: Uuid,
        value: &[u8],
        _status: GattStatus,
    ) {
        self.reads.lock().unwrap().push((characteristic, value.to_vec()));
    }

    fn on_characteristic_changed(&self, _queue: &QueueHandle, characteristic: Uuid, value: &[u8]) -> bool {
        self.changes.lock().unwrap().push((characteristic, value.to_vec()));
        true
    }
}
