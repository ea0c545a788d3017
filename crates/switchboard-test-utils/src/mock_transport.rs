// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Scriptable transport for deterministic session tests.
//!
//! `MockTransport` hands out one [`MockHandle`] per `initialize` call. Tests
//! drive the session by emitting connection and message events on a handle
//! and assert on what the session sent back through it.

use std::sync::atomic::{AtomicBool, AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, watch, Mutex};

use switchboard_core::types::{
    CloseReason, ConnectionUpdate, Credentials, InboundEvent, OutboundContent, SendReceipt,
    TransportEvent,
};
use switchboard_core::{EventFanout, SessionId, SwitchboardError, Transport, TransportHandle};

/// A message captured by [`MockHandle::send`].
#[derive(Debug, Clone, PartialEq)]
pub struct SentMessage {
    pub jid: String,
    pub content: OutboundContent,
}

/// Mock protocol engine.
pub struct MockTransport {
    handles: Mutex<Vec<Arc<MockHandle>>>,
    init_credentials: Mutex<Vec<Option<Credentials>>>,
    init_failures: AtomicUsize,
    inits: watch::Sender<usize>,
}

impl MockTransport {
    pub fn new() -> Self {
        let (inits, _) = watch::channel(0);
        Self {
            handles: Mutex::new(Vec::new()),
            init_credentials: Mutex::new(Vec::new()),
            init_failures: AtomicUsize::new(0),
            inits,
        }
    }

    /// Makes the next `count` calls to `initialize` fail.
    pub fn fail_next_inits(&self, count: usize) {
        self.init_failures.store(count, Ordering::SeqCst);
    }

    /// Number of `initialize` calls so far, failed ones included.
    pub fn init_count(&self) -> usize {
        *self.inits.borrow()
    }

    /// Waits until at least `count` `initialize` calls have happened.
    pub async fn wait_for_inits(&self, count: usize) {
        let mut rx = self.inits.subscribe();
        let _ = rx.wait_for(|n| *n >= count).await;
    }

    /// Handle produced by the most recent successful `initialize`.
    pub async fn last_handle(&self) -> Option<Arc<MockHandle>> {
        self.handles.lock().await.last().cloned()
    }

    /// Every handle produced so far, oldest first.
    pub async fn handles(&self) -> Vec<Arc<MockHandle>> {
        self.handles.lock().await.clone()
    }

    /// Credentials passed to each `initialize` call, in call order.
    pub async fn init_credentials(&self) -> Vec<Option<Credentials>> {
        self.init_credentials.lock().await.clone()
    }
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Transport for MockTransport {
    fn name(&self) -> &str {
        "mock"
    }

    async fn initialize(
        &self,
        _session_id: &SessionId,
        credentials: Option<Credentials>,
    ) -> Result<Arc<dyn TransportHandle>, SwitchboardError> {
        self.init_credentials.lock().await.push(credentials);

        let failing = self
            .init_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        let result: Result<Arc<dyn TransportHandle>, SwitchboardError> = if failing {
            Err(SwitchboardError::transport("mock initialization failure"))
        } else {
            let handle = Arc::new(MockHandle::new());
            self.handles.lock().await.push(handle.clone());
            Ok(handle)
        };

        self.inits.send_modify(|n| *n += 1);
        result
    }
}

/// One mock connection.
pub struct MockHandle {
    fanout: EventFanout,
    sent: Mutex<Vec<SentMessage>>,
    sent_count: watch::Sender<usize>,
    send_failures: AtomicUsize,
    send_delay_ms: AtomicU64,
    media: Mutex<Option<Vec<u8>>>,
    next_id: AtomicU64,
    logged_out: AtomicBool,
    closed: AtomicBool,
}

impl MockHandle {
    pub fn new() -> Self {
        let (sent_count, _) = watch::channel(0);
        Self {
            fanout: EventFanout::new(),
            sent: Mutex::new(Vec::new()),
            sent_count,
            send_failures: AtomicUsize::new(0),
            send_delay_ms: AtomicU64::new(0),
            media: Mutex::new(None),
            next_id: AtomicU64::new(1),
            logged_out: AtomicBool::new(false),
            closed: AtomicBool::new(false),
        }
    }

    /// Publishes an arbitrary event to subscribers.
    pub fn emit(&self, event: TransportEvent) {
        self.fanout.publish(event);
    }

    pub fn emit_open(&self) {
        self.emit(TransportEvent::ConnectionUpdate(ConnectionUpdate::open()));
    }

    pub fn emit_qr(&self, code: &str) {
        self.emit(TransportEvent::ConnectionUpdate(ConnectionUpdate::qr(code)));
    }

    /// Emits a transient close.
    pub fn emit_lost(&self, status_code: Option<u16>) {
        self.emit(TransportEvent::ConnectionUpdate(ConnectionUpdate::closed(
            CloseReason::Lost { status_code },
        )));
    }

    /// Emits a permanent logout close.
    pub fn emit_logged_out(&self) {
        self.emit(TransportEvent::ConnectionUpdate(ConnectionUpdate::closed(
            CloseReason::LoggedOut,
        )));
    }

    pub fn emit_message(&self, event: InboundEvent) {
        self.emit(TransportEvent::Message(event));
    }

    pub fn emit_credentials(&self, credentials: Credentials) {
        self.emit(TransportEvent::CredentialsUpdated(credentials));
    }

    /// Makes the next `count` sends fail.
    pub fn fail_next_sends(&self, count: usize) {
        self.send_failures.store(count, Ordering::SeqCst);
    }

    /// Makes every send take `delay` before it resolves.
    pub fn set_send_delay(&self, delay: Duration) {
        let millis = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX);
        self.send_delay_ms.store(millis, Ordering::SeqCst);
    }

    /// Bytes returned by `fetch_media`. `None` makes it fail.
    pub async fn set_media(&self, bytes: Option<Vec<u8>>) {
        *self.media.lock().await = bytes;
    }

    pub async fn sent_messages(&self) -> Vec<SentMessage> {
        self.sent.lock().await.clone()
    }

    pub fn sent_count(&self) -> usize {
        *self.sent_count.borrow()
    }

    /// Waits until at least `count` messages were sent successfully.
    pub async fn wait_for_sent(&self, count: usize) {
        let mut rx = self.sent_count.subscribe();
        let _ = rx.wait_for(|n| *n >= count).await;
    }

    pub fn subscriber_count(&self) -> usize {
        self.fanout.subscriber_count()
    }

    pub fn is_logged_out(&self) -> bool {
        self.logged_out.load(Ordering::SeqCst)
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::SeqCst)
    }
}

impl Default for MockHandle {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl TransportHandle for MockHandle {
    fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent> {
        self.fanout.subscribe()
    }

    async fn send(
        &self,
        jid: &str,
        content: &OutboundContent,
    ) -> Result<SendReceipt, SwitchboardError> {
        let delay = self.send_delay_ms.load(Ordering::SeqCst);
        if delay > 0 {
            tokio::time::sleep(Duration::from_millis(delay)).await;
        }
        let failing = self
            .send_failures
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(SwitchboardError::transport("mock send failure"));
        }

        self.sent.lock().await.push(SentMessage {
            jid: jid.to_string(),
            content: content.clone(),
        });
        self.sent_count.send_modify(|n| *n += 1);
        let id = self.next_id.fetch_add(1, Ordering::SeqCst);
        Ok(SendReceipt {
            message_id: format!("MOCK{id:04}"),
        })
    }

    async fn fetch_media(&self, _event: &InboundEvent) -> Result<Vec<u8>, SwitchboardError> {
        self.media
            .lock()
            .await
            .clone()
            .ok_or_else(|| SwitchboardError::transport("mock media unavailable"))
    }

    /// Marks the handle logged out and confirms with a permanent close,
    /// the way a real engine does.
    async fn logout(&self) -> Result<(), SwitchboardError> {
        self.logged_out.store(true, Ordering::SeqCst);
        self.emit_logged_out();
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}
