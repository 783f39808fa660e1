//! ATT transaction bearer
//!
//! The bearer owns one fixed-channel link and enforces the transaction rules
//! of the attribute protocol on it: at most one outbound request and one
//! outbound indication in flight, FIFO completion per category, one pending
//! inbound transaction per category, and a full bearer shutdown on any
//! sequencing violation or transaction timeout.
//!
//! [`Bearer`] is a cheap clone over shared state. Handlers and completion
//! callbacks are always invoked after the internal lock is released, so they
//! may call back into the bearer (to reply, or to start the next
//! transaction). Closures that the bearer itself ends up owning should
//! capture a [`WeakBearer`] to avoid keeping the state alive in a cycle.
use super::constants::*;
use super::error::AttErrorCode;
use super::pdu::{matching_transaction_opcode, method_type, Handle, MethodType, PacketReader};
use super::types::{AttPacket, ErrorResponse};
use log::{debug, warn};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, Weak};
use std::time::{Duration, Instant};

/// Identifies a pending inbound transaction across `reply` calls.
pub type TransactionId = u32;

/// Never identifies a real transaction. Commands and notifications are
/// delivered with this id since they cannot be replied to.
pub const INVALID_TRANSACTION_ID: TransactionId = 0;

/// Identifies a registered PDU handler.
pub type HandlerId = u32;

/// Reported to the error callback of a failed outbound transaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransactionError {
    /// True when the transaction died of the ATT transaction timeout.
    pub timeout: bool,
    /// Protocol error from a received Error Response, or `NoError` when the
    /// failure was local (shutdown, timeout).
    pub error_code: AttErrorCode,
    /// Attribute handle from a received Error Response, or the invalid
    /// handle.
    pub handle: Handle,
}

/// Completion callback of a successful outbound transaction; receives the
/// PDU that ended it.
pub type TransactionCallback = Box<dyn FnOnce(&PacketReader<'_>) + Send>;

/// Failure callback of an outbound transaction.
pub type ErrorCallback = Box<dyn FnOnce(TransactionError) + Send>;

/// Inbound PDU handler, registered per opcode.
pub type Handler = Arc<dyn Fn(TransactionId, &PacketReader<'_>) + Send + Sync>;

/// Invoked exactly once when the bearer shuts down.
pub type ClosedCallback = Box<dyn FnOnce() + Send>;

/// The link the bearer runs on. `send` must not call back into the bearer.
pub trait Channel: Send {
    fn send(&self, pdu: &[u8]);
    fn tx_mtu(&self) -> u16;
    fn rx_mtu(&self) -> u16;
}

struct PendingTransaction {
    opcode: u8,
    pdu: Vec<u8>,
    callback: TransactionCallback,
    error_callback: ErrorCallback,
}

/// FIFO of outbound transactions of one category (requests or indications).
struct TransactionQueue {
    queue: VecDeque<PendingTransaction>,
    current: Option<PendingTransaction>,
    deadline: Option<Instant>,
}

impl TransactionQueue {
    fn new() -> Self {
        Self {
            queue: VecDeque::new(),
            current: None,
            deadline: None,
        }
    }

    fn current_opcode(&self) -> Option<u8> {
        self.current.as_ref().map(|t| t.opcode)
    }

    fn enqueue(&mut self, transaction: PendingTransaction) {
        self.queue.push_back(transaction);
    }

    /// Sends the next queued transaction unless one is already in flight.
    fn try_send_next(&mut self, chan: &dyn Channel, timeout: Duration) {
        if self.current.is_some() {
            return;
        }
        if let Some(next) = self.queue.pop_front() {
            self.deadline = Some(Instant::now() + timeout);
            chan.send(&next.pdu);
            self.current = Some(next);
        }
    }

    fn clear_current(&mut self) -> Option<PendingTransaction> {
        self.deadline = None;
        self.current.take()
    }

    fn drain(&mut self) -> Vec<PendingTransaction> {
        self.deadline = None;
        let mut all: Vec<_> = self.current.take().into_iter().collect();
        all.extend(self.queue.drain(..));
        all
    }
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum QueueKind {
    Request,
    Indication,
}

struct RemoteTransaction {
    id: TransactionId,
    opcode: u8,
}

struct Inner {
    chan: Option<Box<dyn Channel>>,
    mtu: u16,
    preferred_mtu: u16,
    min_mtu: u16,
    transaction_timeout: Duration,
    request_queue: TransactionQueue,
    indication_queue: TransactionQueue,
    remote_request: Option<RemoteTransaction>,
    remote_indication: Option<RemoteTransaction>,
    handlers: HashMap<u8, (HandlerId, Handler)>,
    next_handler_id: HandlerId,
    next_transaction_id: TransactionId,
    closed_callback: Option<ClosedCallback>,
}

impl Inner {
    fn alloc_transaction_id(&mut self) -> TransactionId {
        let id = self.next_transaction_id;
        self.next_transaction_id = match self.next_transaction_id.wrapping_add(1) {
            INVALID_TRANSACTION_ID => 1,
            next => next,
        };
        id
    }

    fn queue_mut(&mut self, kind: QueueKind) -> &mut TransactionQueue {
        match kind {
            QueueKind::Request => &mut self.request_queue,
            QueueKind::Indication => &mut self.indication_queue,
        }
    }

    fn remote_mut(&mut self, kind: QueueKind) -> &mut Option<RemoteTransaction> {
        match kind {
            QueueKind::Request => &mut self.remote_request,
            QueueKind::Indication => &mut self.remote_indication,
        }
    }

    /// Drops the channel and collects the callbacks the caller must invoke
    /// once the lock is released.
    fn shut_down(&mut self) -> (Vec<ErrorCallback>, Option<ClosedCallback>) {
        self.chan = None;
        self.remote_request = None;
        self.remote_indication = None;

        let mut failed = Vec::new();
        for transaction in self.request_queue.drain() {
            failed.push(transaction.error_callback);
        }
        for transaction in self.indication_queue.drain() {
            failed.push(transaction.error_callback);
        }

        (failed, self.closed_callback.take())
    }
}

/// Work computed under the lock and performed after it is released.
enum RxAction {
    None,
    ShutDown {
        failed: Vec<ErrorCallback>,
        closed: Option<ClosedCallback>,
    },
    Dispatch {
        handler: Handler,
        id: TransactionId,
    },
    Complete {
        callback: TransactionCallback,
    },
    Fail {
        error_callback: ErrorCallback,
        error: TransactionError,
    },
}

/// Shared handle to an ATT bearer.
#[derive(Clone)]
pub struct Bearer {
    inner: Arc<Mutex<Inner>>,
}

/// Non-owning handle for closures held by the bearer or by attribute
/// handlers.
#[derive(Clone)]
pub struct WeakBearer {
    inner: Weak<Mutex<Inner>>,
}

impl WeakBearer {
    pub fn upgrade(&self) -> Option<Bearer> {
        self.inner.upgrade().map(|inner| Bearer { inner })
    }
}

impl Bearer {
    pub fn new(chan: Box<dyn Channel>) -> Self {
        Self::with_timeout(chan, Duration::from_secs(ATT_TRANSACTION_TIMEOUT_SECS))
    }

    pub fn with_timeout(chan: Box<dyn Channel>, transaction_timeout: Duration) -> Self {
        let min_mtu = ATT_LE_MIN_MTU;
        let preferred_mtu = min_mtu.max(chan.tx_mtu().min(chan.rx_mtu()));

        Bearer {
            inner: Arc::new(Mutex::new(Inner {
                chan: Some(chan),
                mtu: min_mtu,
                preferred_mtu,
                min_mtu,
                transaction_timeout,
                request_queue: TransactionQueue::new(),
                indication_queue: TransactionQueue::new(),
                remote_request: None,
                remote_indication: None,
                handlers: HashMap::new(),
                next_handler_id: 1,
                next_transaction_id: 1,
                closed_callback: None,
            })),
        }
    }

    pub fn downgrade(&self) -> WeakBearer {
        WeakBearer {
            inner: Arc::downgrade(&self.inner),
        }
    }

    pub fn is_open(&self) -> bool {
        self.inner.lock().unwrap().chan.is_some()
    }

    pub fn mtu(&self) -> u16 {
        self.inner.lock().unwrap().mtu
    }

    pub fn set_mtu(&self, mtu: u16) {
        debug!("att: bearer MTU set to {}", mtu);
        self.inner.lock().unwrap().mtu = mtu;
    }

    pub fn min_mtu(&self) -> u16 {
        self.inner.lock().unwrap().min_mtu
    }

    pub fn preferred_mtu(&self) -> u16 {
        self.inner.lock().unwrap().preferred_mtu
    }

    pub fn set_preferred_mtu(&self, preferred_mtu: u16) {
        let mut inner = self.inner.lock().unwrap();
        debug_assert!(preferred_mtu >= inner.min_mtu);
        inner.preferred_mtu = preferred_mtu;
    }

    pub fn set_closed_callback(&self, callback: ClosedCallback) {
        self.inner.lock().unwrap().closed_callback = Some(callback);
    }

    /// Shuts the bearer down. Every queued and in-flight outbound
    /// transaction fails with a local error, then the closed callback runs.
    /// Idempotent.
    pub fn shut_down(&self) {
        self.shut_down_impl(false);
    }

    /// The link layer closed underneath us.
    pub fn on_channel_closed(&self) {
        debug!("att: channel closed");
        self.shut_down_impl(false);
    }

    fn shut_down_impl(&self, due_to_timeout: bool) {
        let (failed, closed) = {
            let mut inner = self.inner.lock().unwrap();
            if inner.chan.is_none() {
                return;
            }
            inner.shut_down()
        };

        for error_callback in failed {
            error_callback(TransactionError {
                timeout: due_to_timeout,
                error_code: AttErrorCode::NoError,
                handle: ATT_HANDLE_INVALID,
            });
        }
        if let Some(closed) = closed {
            closed();
        }
    }

    /// Starts an outbound request or indication transaction. The PDU is
    /// queued behind other transactions of its category.
    pub fn start_transaction(
        &self,
        pdu: Vec<u8>,
        callback: TransactionCallback,
        error_callback: ErrorCallback,
    ) -> bool {
        self.send_internal(pdu, Some((callback, error_callback)))
    }

    /// Sends a command or notification. These carry no transaction.
    pub fn send_without_response(&self, pdu: Vec<u8>) -> bool {
        self.send_internal(pdu, None)
    }

    fn send_internal(
        &self,
        pdu: Vec<u8>,
        callbacks: Option<(TransactionCallback, ErrorCallback)>,
    ) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.chan.is_none() {
            debug!("att: cannot send, bearer closed");
            return false;
        }
        if pdu.is_empty() || pdu.len() > inner.mtu as usize {
            debug!("att: cannot send, invalid PDU length: {}", pdu.len());
            return false;
        }

        let opcode = pdu[0];
        let kind = match method_type(opcode) {
            MethodType::Command | MethodType::Notification => {
                if callbacks.is_some() {
                    return false;
                }
                inner.chan.as_deref().unwrap().send(&pdu);
                return true;
            }
            MethodType::Request => QueueKind::Request,
            MethodType::Indication => QueueKind::Indication,
            _ => return false,
        };

        let Some((callback, error_callback)) = callbacks else {
            return false;
        };

        let timeout = inner.transaction_timeout;
        let Inner {
            ref mut request_queue,
            ref mut indication_queue,
            ref chan,
            ..
        } = *inner;
        let queue = match kind {
            QueueKind::Request => request_queue,
            QueueKind::Indication => indication_queue,
        };
        queue.enqueue(PendingTransaction {
            opcode,
            pdu,
            callback,
            error_callback,
        });
        queue.try_send_next(chan.as_deref().unwrap(), timeout);
        true
    }

    /// Registers `handler` for an inbound opcode. At most one handler per
    /// opcode; returns `None` when the opcode is taken or the bearer is
    /// closed.
    pub fn register_handler(
        &self,
        opcode: u8,
        handler: impl Fn(TransactionId, &PacketReader<'_>) + Send + Sync + 'static,
    ) -> Option<HandlerId> {
        let mut inner = self.inner.lock().unwrap();
        if inner.chan.is_none() || inner.handlers.contains_key(&opcode) {
            return None;
        }

        let id = inner.next_handler_id;
        inner.next_handler_id += 1;
        inner.handlers.insert(opcode, (id, Arc::new(handler)));
        Some(id)
    }

    pub fn unregister_handler(&self, id: HandlerId) {
        self.inner
            .lock()
            .unwrap()
            .handlers
            .retain(|_, (handler_id, _)| *handler_id != id);
    }

    /// Ends the inbound transaction identified by `id` with a response or
    /// confirmation PDU. Returns false when the id is stale or the PDU does
    /// not end that transaction; the transaction stays pending in that case.
    pub fn reply(&self, id: TransactionId, pdu: Vec<u8>) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.chan.is_none() || id == INVALID_TRANSACTION_ID {
            return false;
        }
        if pdu.is_empty() || pdu.len() > inner.mtu as usize {
            return false;
        }

        let kind = match (&inner.remote_request, &inner.remote_indication) {
            (Some(remote), _) if remote.id == id => QueueKind::Request,
            (_, Some(remote)) if remote.id == id => QueueKind::Indication,
            _ => return false,
        };

        let pending_opcode = inner.remote_mut(kind).as_ref().unwrap().opcode;
        if matching_transaction_opcode(pdu[0]) != pending_opcode {
            return false;
        }

        *inner.remote_mut(kind) = None;
        inner.chan.as_deref().unwrap().send(&pdu);
        true
    }

    /// Ends a pending inbound request with an Error Response. Indications
    /// cannot carry an error, so their id is always rejected.
    pub fn reply_with_error(&self, id: TransactionId, handle: Handle, error_code: AttErrorCode) -> bool {
        let mut inner = self.inner.lock().unwrap();
        if inner.chan.is_none() || id == INVALID_TRANSACTION_ID {
            return false;
        }

        let request_opcode = match &inner.remote_request {
            Some(remote) if remote.id == id => remote.opcode,
            _ => return false,
        };

        inner.remote_request = None;
        let rsp = ErrorResponse {
            request_opcode,
            handle,
            error_code,
        }
        .serialize();
        inner.chan.as_deref().unwrap().send(&rsp);
        true
    }

    /// The earliest outbound transaction deadline, if any transaction is in
    /// flight. The embedder calls [`Bearer::handle_timeout`] at or after it.
    pub fn next_timeout(&self) -> Option<Instant> {
        let inner = self.inner.lock().unwrap();
        match (inner.request_queue.deadline, inner.indication_queue.deadline) {
            (Some(a), Some(b)) => Some(a.min(b)),
            (a, b) => a.or(b),
        }
    }

    /// Shuts the bearer down if an in-flight transaction has passed its
    /// deadline. The error callbacks observe `timeout == true`.
    pub fn handle_timeout(&self, now: Instant) {
        let expired = {
            let inner = self.inner.lock().unwrap();
            inner.chan.is_some()
                && [inner.request_queue.deadline, inner.indication_queue.deadline]
                    .iter()
                    .any(|deadline| deadline.is_some_and(|d| d <= now))
        };

        if expired {
            warn!("att: transaction timed out, shutting down bearer");
            self.shut_down_impl(true);
        }
    }

    /// Feeds one received PDU into the bearer.
    pub fn on_rx_pdu(&self, pdu: &[u8]) {
        let action = {
            let mut inner = self.inner.lock().unwrap();
            if inner.chan.is_none() {
                return;
            }

            let Some(packet) = PacketReader::new(pdu) else {
                warn!("att: received empty PDU");
                let (failed, closed) = inner.shut_down();
                return drop_lock_and_shut_down(inner, failed, closed);
            };
            if pdu.len() > inner.mtu as usize {
                warn!("att: received PDU exceeds MTU ({} > {})", pdu.len(), inner.mtu);
                let (failed, closed) = inner.shut_down();
                return drop_lock_and_shut_down(inner, failed, closed);
            }

            match method_type(packet.opcode()) {
                MethodType::Response => Self::end_transaction(&mut inner, QueueKind::Request, &packet),
                MethodType::Confirmation => {
                    Self::end_transaction(&mut inner, QueueKind::Indication, &packet)
                }
                MethodType::Request => {
                    Self::begin_remote_transaction(&mut inner, QueueKind::Request, &packet)
                }
                MethodType::Indication => {
                    Self::begin_remote_transaction(&mut inner, QueueKind::Indication, &packet)
                }
                MethodType::Command | MethodType::Notification => {
                    match inner.handlers.get(&packet.opcode()) {
                        Some((_, handler)) => RxAction::Dispatch {
                            handler: handler.clone(),
                            id: INVALID_TRANSACTION_ID,
                        },
                        None => {
                            // Neither carries a response; drop it.
                            debug!(
                                "att: dropping PDU without handler (opcode: {:#04x})",
                                packet.opcode()
                            );
                            RxAction::None
                        }
                    }
                }
                MethodType::Invalid => {
                    warn!("att: received PDU with invalid opcode");
                    let (failed, closed) = inner.shut_down();
                    RxAction::ShutDown { failed, closed }
                }
            }
        };

        match action {
            RxAction::None => {}
            RxAction::ShutDown { failed, closed } => {
                finish_shut_down(failed, closed, false);
            }
            RxAction::Dispatch { handler, id } => {
                let packet = PacketReader::new(pdu).unwrap();
                handler(id, &packet);
            }
            RxAction::Complete { callback } => {
                let packet = PacketReader::new(pdu).unwrap();
                callback(&packet);
            }
            RxAction::Fail {
                error_callback,
                error,
            } => {
                error_callback(error);
            }
        }
    }

    /// Resolves a Response or Confirmation against the in-flight transaction
    /// of `kind`. Any mismatch is fatal to the bearer.
    fn end_transaction(inner: &mut Inner, kind: QueueKind, packet: &PacketReader<'_>) -> RxAction {
        let opcode = packet.opcode();
        let mut protocol_error = None;

        let target_opcode = if opcode == ATT_ERROR_RSP {
            let payload = packet.payload();
            if payload.len() == 4 {
                let handle = u16::from_le_bytes([payload[1], payload[2]]);
                protocol_error = Some((AttErrorCode::from(payload[3]), handle));
                payload[0]
            } else {
                // A malformed Error Response matches nothing.
                ATT_INVALID_OPCODE
            }
        } else {
            matching_transaction_opcode(opcode)
        };

        let matches = inner.queue_mut(kind).current_opcode() == Some(target_opcode)
            && target_opcode != ATT_INVALID_OPCODE;
        if !matches {
            warn!(
                "att: received unexpected transaction PDU (opcode: {:#04x})",
                opcode
            );
            let (failed, closed) = inner.shut_down();
            return RxAction::ShutDown { failed, closed };
        }

        let transaction = inner.queue_mut(kind).clear_current().unwrap();

        // Pipeline the next queued transaction of this category.
        let timeout = inner.transaction_timeout;
        let Inner {
            ref mut request_queue,
            ref mut indication_queue,
            ref chan,
            ..
        } = *inner;
        let queue = match kind {
            QueueKind::Request => request_queue,
            QueueKind::Indication => indication_queue,
        };
        queue.try_send_next(chan.as_deref().unwrap(), timeout);

        match protocol_error {
            Some((error_code, handle)) => RxAction::Fail {
                error_callback: transaction.error_callback,
                error: TransactionError {
                    timeout: false,
                    error_code,
                    handle,
                },
            },
            None => RxAction::Complete {
                callback: transaction.callback,
            },
        }
    }

    /// Accepts an inbound request or indication. A second one of the same
    /// category before the reply is a protocol violation.
    fn begin_remote_transaction(
        inner: &mut Inner,
        kind: QueueKind,
        packet: &PacketReader<'_>,
    ) -> RxAction {
        let opcode = packet.opcode();

        if inner.remote_mut(kind).is_some() {
            warn!("att: received transaction while another is pending");
            let (failed, closed) = inner.shut_down();
            return RxAction::ShutDown { failed, closed };
        }

        match inner.handlers.get(&opcode) {
            Some((_, handler)) => {
                let handler = handler.clone();
                let id = inner.alloc_transaction_id();
                *inner.remote_mut(kind) = Some(RemoteTransaction { id, opcode });
                RxAction::Dispatch { handler, id }
            }
            None => {
                debug!("att: no handler for opcode {:#04x}", opcode);
                let rsp = ErrorResponse {
                    request_opcode: opcode,
                    handle: ATT_HANDLE_INVALID,
                    error_code: AttErrorCode::RequestNotSupported,
                }
                .serialize();
                inner.chan.as_deref().unwrap().send(&rsp);
                RxAction::None
            }
        }
    }
}

fn drop_lock_and_shut_down(
    inner: std::sync::MutexGuard<'_, Inner>,
    failed: Vec<ErrorCallback>,
    closed: Option<ClosedCallback>,
) {
    drop(inner);
    finish_shut_down(failed, closed, false);
}

fn finish_shut_down(failed: Vec<ErrorCallback>, closed: Option<ClosedCallback>, timeout: bool) {
    for error_callback in failed {
        error_callback(TransactionError {
            timeout,
            error_code: AttErrorCode::NoError,
            handle: ATT_HANDLE_INVALID,
        });
    }
    if let Some(closed) = closed {
        closed();
    }
}
