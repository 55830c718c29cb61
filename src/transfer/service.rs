//! Queue-integrated file transfer service.
//!
//! Owns at most one active transfer per remote device. Every transaction
//! it queues carries a callback bound to that transfer, so the dispatcher
//! routes control responses, data notifications and aborts straight back
//! here; the service advances the state machine and queues the follow-up
//! work.
//!
//! ```text
//!  upload() ──open tx──▶ queue ──▶ remote
//!                                    │ put ack / verify / close ack
//!  on_characteristic_changed ◀───────┘
//!        │ next tx (packets, close)          ticket ◀── outcome
//!        └──────────▶ queue
//! ```

extern crate alloc;
use alloc::vec::Vec;
use core::time::Duration;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use embassy_sync::blocking_mutex::raw::CriticalSectionRawMutex;
use embassy_sync::signal::Signal;
use futures_lite::FutureExt;
use log::{debug, info, warn};
use uuid::Uuid;

use super::TransferCharacteristics;
use super::codec::FileHandle;
use super::crypto::FileCipher;
use super::download::{DownloadState, FileGetRequest};
use super::upload::{FilePutRequest, UploadState};
use crate::app::ports::GattCallback;
use crate::btle::link::{GattStatus, LinkState};
use crate::btle::queue::QueueHandle;
use crate::btle::transaction::TransactionBuilder;
use crate::config::TransferConfig;
use crate::error::{LinkError, TransferError};

// ── Outcome & ticket ─────────────────────────────────────────

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransferOutcome {
    Uploaded { handle: FileHandle },
    Downloaded { handle: FileHandle, payload: Vec<u8> },
}

pub type TransferResult = Result<TransferOutcome, TransferError>;

struct TicketSlot {
    outcome: Mutex<Option<TransferResult>>,
    done: Signal<CriticalSectionRawMutex, ()>,
}

impl TicketSlot {
    fn new() -> Self {
        Self {
            outcome: Mutex::new(None),
            done: Signal::new(),
        }
    }

    fn complete(&self, result: TransferResult) {
        *self.outcome.lock().unwrap_or_else(PoisonError::into_inner) = Some(result);
        self.done.signal(());
    }

    fn take(&self) -> Option<TransferResult> {
        self.outcome
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take()
    }
}

/// Completion handle for one transfer.
pub struct TransferTicket {
    handle: FileHandle,
    slot: Arc<TicketSlot>,
}

impl core::fmt::Debug for TransferTicket {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("TransferTicket")
            .field("handle", &self.handle)
            .finish_non_exhaustive()
    }
}

impl TransferTicket {
    pub fn handle(&self) -> FileHandle {
        self.handle
    }

    /// Take the outcome if the transfer has finished.
    pub fn try_result(&self) -> Option<TransferResult> {
        self.slot.take()
    }

    pub async fn wait(&self) -> TransferResult {
        loop {
            if let Some(result) = self.slot.take() {
                return result;
            }
            self.slot.done.wait().await;
        }
    }

    /// Block the calling thread for at most `timeout`. `None` on timeout.
    pub fn wait_blocking(&self, timeout: Duration) -> Option<TransferResult> {
        let finished = async { Some(self.wait().await) };
        let expired = async {
            async_io_mini::Timer::after(timeout).await;
            None
        };
        futures_lite::future::block_on(finished.or(expired))
    }
}

// ── Service ──────────────────────────────────────────────────

enum Transfer {
    Upload(FilePutRequest),
    Download(FileGetRequest),
}

struct Active {
    handle: FileHandle,
    transfer: Transfer,
    slot: Arc<TicketSlot>,
}

enum Step {
    Continue,
    Queue(TransactionBuilder),
    Done(TransferResult),
}

struct Inner {
    characteristics: TransferCharacteristics,
    config: TransferConfig,
    active: Mutex<Option<Active>>,
}

/// File uploads and downloads over one control/data characteristic pair.
#[derive(Clone)]
pub struct FileTransferService {
    inner: Arc<Inner>,
}

impl FileTransferService {
    pub fn new(characteristics: TransferCharacteristics, config: TransferConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                characteristics,
                config,
                active: Mutex::new(None),
            }),
        }
    }

    pub fn characteristics(&self) -> TransferCharacteristics {
        self.inner.characteristics
    }

    pub fn is_busy(&self) -> bool {
        self.lock().is_some()
    }

    /// Upload `payload` to `handle`, encrypting packets when `cipher` is
    /// given.
    pub fn upload(
        &self,
        queue: &QueueHandle,
        handle: FileHandle,
        payload: &[u8],
        mtu: u16,
        cipher: Option<FileCipher>,
    ) -> Result<TransferTicket, TransferError> {
        let mut request = FilePutRequest::new(
            handle,
            payload,
            mtu,
            self.inner.characteristics,
            &self.inner.config,
        )?;
        if let Some(cipher) = cipher {
            request = request.with_cipher(cipher, self.inner.config.upload_iv_offset);
        }
        let open = request.open_transaction();
        self.start(queue, handle, Transfer::Upload(request), open)
    }

    /// Download the file at `handle`, decrypting packets when `cipher` is
    /// given.
    pub fn download(
        &self,
        queue: &QueueHandle,
        handle: FileHandle,
        cipher: Option<FileCipher>,
    ) -> Result<TransferTicket, TransferError> {
        let mut request =
            FileGetRequest::new(handle, self.inner.characteristics, &self.inner.config);
        if let Some(cipher) = cipher {
            request = request.with_cipher(cipher);
        }
        let open = request.open_transaction();
        self.start(queue, handle, Transfer::Download(request), open)
    }

    /// Fail the active transfer with `Aborted`.
    pub fn cancel(&self) {
        self.finish(&mut self.lock(), Err(TransferError::Aborted));
    }

    fn lock(&self) -> MutexGuard<'_, Option<Active>> {
        self.inner
            .active
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Callback for transactions queued on behalf of the transfer that
    /// owns `slot`.
    fn scope(&self, slot: &Arc<TicketSlot>) -> Arc<dyn GattCallback> {
        Arc::new(TransferScope {
            service: self.clone(),
            slot: slot.clone(),
        })
    }

    fn start(
        &self,
        queue: &QueueHandle,
        handle: FileHandle,
        transfer: Transfer,
        open: TransactionBuilder,
    ) -> Result<TransferTicket, TransferError> {
        let slot = Arc::new(TicketSlot::new());
        {
            let mut active = self.lock();
            if active.is_some() {
                return Err(TransferError::Busy);
            }
            *active = Some(Active {
                handle,
                transfer,
                slot: slot.clone(),
            });
        }
        if let Err(e) = queue.enqueue(open.callback(self.scope(&slot)).build()) {
            self.lock().take();
            return Err(e.into());
        }
        debug!("transfer {} queued", handle);
        Ok(TransferTicket { handle, slot })
    }

    fn finish(&self, active: &mut Option<Active>, result: TransferResult) {
        let Some(done) = active.take() else {
            return;
        };
        match &result {
            Ok(_) => info!("transfer {} finished", done.handle),
            Err(e) => warn!("transfer {} failed: {}", done.handle, e),
        }
        done.slot.complete(result);
    }

    fn on_control(&self, queue: &QueueHandle, value: &[u8]) {
        let mut guard = self.lock();
        let Some(active) = guard.as_mut() else {
            debug!("control response with no active transfer");
            return;
        };
        let handle = active.handle;
        let step = match &mut active.transfer {
            Transfer::Upload(request) => match request.handle_response(value) {
                Ok(Some(next)) => Step::Queue(next),
                Ok(None) if request.state() == UploadState::Uploaded => {
                    Step::Done(Ok(TransferOutcome::Uploaded { handle }))
                }
                Ok(None) => Step::Continue,
                Err(e) => Step::Done(Err(e)),
            },
            Transfer::Download(request) => match request.handle_response(value) {
                Ok(()) if request.state() == DownloadState::Downloaded => {
                    Step::Done(Ok(TransferOutcome::Downloaded {
                        handle,
                        payload: request.take_payload().unwrap_or_default(),
                    }))
                }
                Ok(()) => Step::Continue,
                Err(e) => Step::Done(Err(e)),
            },
        };
        match step {
            Step::Continue => {}
            Step::Queue(next) => {
                let scope = self.scope(&active.slot);
                if let Err(e) = queue.enqueue(next.callback(scope).build()) {
                    self.finish(&mut guard, Err(e.into()));
                }
            }
            Step::Done(result) => self.finish(&mut guard, result),
        }
    }

    fn on_data(&self, value: &[u8]) {
        let mut guard = self.lock();
        let result = match guard.as_mut().map(|a| &mut a.transfer) {
            Some(Transfer::Download(request)) => request.handle_data(value),
            Some(Transfer::Upload(_)) | None => {
                debug!("data notification ignored ({} bytes)", value.len());
                return;
            }
        };
        if let Err(e) = result {
            self.finish(&mut guard, Err(e));
        }
    }

    /// Fail the active transfer if it is still the one owning `slot`.
    fn abort_owned(&self, slot: &Arc<TicketSlot>, transaction: &str) {
        let mut guard = self.lock();
        if guard.as_ref().is_some_and(|a| Arc::ptr_eq(&a.slot, slot)) {
            debug!("transaction {} aborted under transfer", transaction);
            self.finish(&mut guard, Err(TransferError::Aborted));
        }
    }

    fn owns(&self, characteristic: Uuid) -> bool {
        let chars = self.inner.characteristics;
        characteristic == chars.control || characteristic == chars.data
    }
}

impl GattCallback for FileTransferService {
    fn on_connection_state_changed(
        &self,
        _queue: &QueueHandle,
        state: LinkState,
        _status: GattStatus,
    ) {
        if state == LinkState::Disconnected {
            self.finish(
                &mut self.lock(),
                Err(TransferError::Link(LinkError::Disconnected)),
            );
        }
    }

    fn on_characteristic_write(
        &self,
        _queue: &QueueHandle,
        characteristic: Uuid,
        status: GattStatus,
    ) {
        if self.owns(characteristic) && !status.is_success() {
            self.finish(
                &mut self.lock(),
                Err(TransferError::Link(LinkError::Status(status))),
            );
        }
    }

    fn on_characteristic_changed(
        &self,
        queue: &QueueHandle,
        characteristic: Uuid,
        value: &[u8],
    ) -> bool {
        let chars = self.inner.characteristics;
        if characteristic == chars.control {
            self.on_control(queue, value);
            true
        } else if characteristic == chars.data {
            self.on_data(value);
            true
        } else {
            false
        }
    }
}

/// Per-transfer callback. Routes events to the service and fails its own
/// transfer when one of its transactions is aborted.
struct TransferScope {
    service: FileTransferService,
    slot: Arc<TicketSlot>,
}

impl GattCallback for TransferScope {
    fn on_connection_state_changed(
        &self,
        queue: &QueueHandle,
        state: LinkState,
        status: GattStatus,
    ) {
        self.service
            .on_connection_state_changed(queue, state, status);
    }

    fn on_characteristic_write(
        &self,
        queue: &QueueHandle,
        characteristic: Uuid,
        status: GattStatus,
    ) {
        self.service
            .on_characteristic_write(queue, characteristic, status);
    }

    fn on_characteristic_changed(
        &self,
        queue: &QueueHandle,
        characteristic: Uuid,
        value: &[u8],
    ) -> bool {
        self.service
            .on_characteristic_changed(queue, characteristic, value)
    }

    fn on_transaction_aborted(&self, _queue: &QueueHandle, name: &str) {
        self.service.abort_owned(&self.slot, name);
    }
}

// ── Tests ────────────────────────────────────────────────────
