// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Per-session connection state machine.
//!
//! A [`Session`] owns one transport handle at a time, reacts to the events
//! that handle emits, schedules reconnects with backoff after transient
//! disconnects, and buffers outbound sends in its [`OutboundQueue`] until the
//! connection is open.
//!
//! Every `init` bumps a generation counter and cancels the previous event
//! subscription, so events from a superseded handle are never processed.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, Weak};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, warn};

use switchboard_config::model::{RateLimitConfig, SwitchboardConfig};
use switchboard_core::types::{
    CloseReason, ConnectionState, ConnectionUpdate, Credentials, InboundEvent, OutboundContent,
    SendReceipt, TransportEvent,
};
use switchboard_core::{
    CredentialStore, MetadataStore, SessionId, SessionStatus, SwitchboardError, Transport,
    TransportHandle,
};

use crate::backoff::BackoffPolicy;
use crate::queue::{DrainOutcome, JobDispatcher, OutboundJob, OutboundQueue};
use crate::rate_limit::{RateLimitStatus, RateLimiter};
use crate::registry::SessionRegistry;
use crate::webhook::WebhookDispatcher;

/// Tunables shared by every session.
#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub max_retries: u32,
    pub backoff: BackoffPolicy,
    pub send_pacing: Duration,
    pub jid_domain: String,
    pub rate_limit: RateLimitConfig,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self::from_config(&SwitchboardConfig::default())
    }
}

impl SessionSettings {
    pub fn from_config(config: &SwitchboardConfig) -> Self {
        Self {
            max_retries: config.session.max_retries,
            backoff: BackoffPolicy::from_config(&config.session),
            send_pacing: config.session.send_pacing(),
            jid_domain: config.session.default_jid_domain.clone(),
            rate_limit: config.rate_limit.clone(),
        }
    }
}

/// Collaborators every session needs, shared through the registry.
pub struct SessionContext {
    pub settings: SessionSettings,
    pub transport: Arc<dyn Transport>,
    pub metadata: Arc<dyn MetadataStore>,
    pub credentials: Arc<dyn CredentialStore>,
    pub webhooks: WebhookDispatcher,
}

/// Result of a send request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum SendOutcome {
    /// Delivered to the transport right away.
    Sent {
        #[serde(rename = "messageId")]
        message_id: String,
    },
    /// Buffered; `position` is 1-based within the pending jobs.
    Queued { position: usize },
}

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSnapshot {
    pub session_id: SessionId,
    pub status: SessionStatus,
    pub qr_code: Option<String>,
    pub retry_count: u32,
    pub queued: usize,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

struct SessionState {
    status: SessionStatus,
    qr: Option<String>,
    retry_count: u32,
    handle: Option<Arc<dyn TransportHandle>>,
    generation: u64,
    subscription: Option<CancellationToken>,
    reconnect: Option<JoinHandle<()>>,
    reconnect_ticket: u64,
}

impl SessionState {
    /// Invalidates the current subscription and returns the old handle.
    fn detach(&mut self) -> Option<Arc<dyn TransportHandle>> {
        self.generation += 1;
        if let Some(token) = self.subscription.take() {
            token.cancel();
        }
        self.handle.take()
    }

    fn cancel_reconnect(&mut self) {
        if let Some(timer) = self.reconnect.take() {
            timer.abort();
        }
    }
}

/// One managed messaging-account connection.
pub struct Session {
    id: SessionId,
    webhook_url: Option<String>,
    created_at: DateTime<Utc>,
    ctx: Arc<SessionContext>,
    registry: Weak<SessionRegistry>,
    queue: OutboundQueue,
    rate_limiter: RateLimiter,
    state: Mutex<SessionState>,
}

impl Session {
    pub(crate) fn new(
        id: SessionId,
        webhook_url: Option<String>,
        created_at: DateTime<Utc>,
        ctx: Arc<SessionContext>,
        registry: Weak<SessionRegistry>,
    ) -> Arc<Self> {
        let pacing = ctx.settings.send_pacing;
        let rate_limiter = RateLimiter::new(&ctx.settings.rate_limit, pacing);
        Arc::new(Self {
            id,
            webhook_url,
            created_at,
            ctx,
            registry,
            queue: OutboundQueue::new(pacing),
            rate_limiter,
            state: Mutex::new(SessionState {
                status: SessionStatus::Starting,
                qr: None,
                retry_count: 0,
                handle: None,
                generation: 0,
                subscription: None,
                reconnect: None,
                reconnect_ticket: 0,
            }),
        })
    }

    fn state(&self) -> MutexGuard<'_, SessionState> {
        self.state.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn id(&self) -> &SessionId {
        &self.id
    }

    pub fn webhook_url(&self) -> Option<&str> {
        self.webhook_url.as_deref()
    }

    pub fn status(&self) -> SessionStatus {
        self.state().status
    }

    /// The pending QR challenge, present only while `qr_pending`.
    pub fn qr_code(&self) -> Option<String> {
        self.state().qr.clone()
    }

    pub fn retry_count(&self) -> u32 {
        self.state().retry_count
    }

    /// Whether a reconnect timer is outstanding.
    pub fn reconnect_pending(&self) -> bool {
        self.state().reconnect.is_some()
    }

    pub fn queued(&self) -> usize {
        self.queue.len()
    }

    pub fn pending_jobs(&self) -> Vec<OutboundJob> {
        self.queue.pending()
    }

    pub fn rate_limit_status(&self) -> RateLimitStatus {
        self.rate_limiter.status()
    }

    pub fn snapshot(&self) -> SessionSnapshot {
        let state = self.state();
        SessionSnapshot {
            session_id: self.id.clone(),
            status: state.status,
            qr_code: state.qr.clone(),
            retry_count: state.retry_count,
            queued: self.queue.len(),
            webhook_url: self.webhook_url.clone(),
            created_at: self.created_at,
        }
    }

    fn handle(&self) -> Option<Arc<dyn TransportHandle>> {
        self.state().handle.clone()
    }

    fn is_current(&self, generation: u64) -> bool {
        self.state().generation == generation
    }

    fn set_status(&self, status: SessionStatus) {
        let mut state = self.state();
        if state.status != status {
            debug!(session_id = %self.id, from = %state.status, to = %status, "status change");
            state.status = status;
        }
    }

    // --- lifecycle ---

    /// Opens a fresh transport connection, replacing any previous one.
    ///
    /// Initialization failures leave the session in `error`; they are not
    /// retried automatically.
    pub async fn init(self: &Arc<Self>) {
        let (generation, previous) = {
            let mut state = self.state();
            let previous = state.detach();
            (state.generation, previous)
        };
        if let Some(previous) = previous {
            previous.close().await;
        }

        let credentials = match self.ctx.credentials.load(&self.id).await {
            Ok(credentials) => credentials,
            Err(e) => {
                warn!(session_id = %self.id, error = %e, "stored credentials unreadable, pairing afresh");
                None
            }
        };
        let fresh = credentials.is_none();

        let handle = match self.ctx.transport.initialize(&self.id, credentials).await {
            Ok(handle) => handle,
            Err(e) => {
                error!(session_id = %self.id, error = %e, "transport initialization failed");
                let mut state = self.state();
                if state.generation == generation {
                    state.status = SessionStatus::Error;
                }
                return;
            }
        };

        let superseded = {
            let mut state = self.state();
            if state.generation != generation {
                true
            } else {
                let token = CancellationToken::new();
                let events = handle.subscribe();
                state.handle = Some(handle.clone());
                state.subscription = Some(token.clone());
                tokio::spawn(pump_events(
                    Arc::downgrade(self),
                    generation,
                    events,
                    token,
                ));
                false
            }
        };

        if superseded {
            debug!(session_id = %self.id, "initialization superseded, closing new handle");
            handle.close().await;
        } else {
            info!(
                session_id = %self.id,
                transport = self.ctx.transport.name(),
                fresh,
                "transport initialized"
            );
        }
    }

    /// Resets the retry budget and reinitializes in place.
    pub async fn restart(self: &Arc<Self>) {
        {
            let mut state = self.state();
            state.cancel_reconnect();
            state.retry_count = 0;
            state.qr = None;
            state.status = SessionStatus::Starting;
        }
        info!(session_id = %self.id, "session restarting");
        self.init().await;
    }

    /// Requests a logout from the transport if a connection exists.
    ///
    /// Cleanup follows from the permanent-logout close event the transport
    /// emits in response.
    pub async fn terminate(&self) -> Result<(), SwitchboardError> {
        let (handle, previous) = {
            let mut state = self.state();
            let Some(handle) = state.handle.clone() else {
                debug!(session_id = %self.id, "terminate without a live handle");
                return Ok(());
            };
            let previous = state.status;
            state.status = SessionStatus::Closing;
            (handle, previous)
        };

        info!(session_id = %self.id, "logout requested");
        if let Err(e) = handle.logout().await {
            warn!(session_id = %self.id, error = %e, "logout failed");
            let mut state = self.state();
            if state.status == SessionStatus::Closing {
                state.status = previous;
            }
            return Err(e);
        }
        Ok(())
    }

    /// Stops timers and the event subscription without touching persisted
    /// state, so the session is restored on the next start.
    pub async fn shutdown(&self) {
        let handle = {
            let mut state = self.state();
            state.cancel_reconnect();
            state.detach()
        };
        if let Some(handle) = handle {
            handle.close().await;
        }
        debug!(session_id = %self.id, queued = self.queue.len(), "session shut down");
    }

    // --- transport events ---

    async fn handle_event(self: &Arc<Self>, event: TransportEvent) {
        match event {
            TransportEvent::ConnectionUpdate(update) => self.on_connection_update(update).await,
            TransportEvent::Message(message) => self.on_message(message),
            TransportEvent::CredentialsUpdated(credentials) => {
                self.on_credentials(credentials).await
            }
        }
    }

    async fn on_connection_update(self: &Arc<Self>, update: ConnectionUpdate) {
        if self.status().is_terminal() {
            debug!(session_id = %self.id, "connection update after terminal status ignored");
            return;
        }

        if let Some(qr) = update.qr {
            let mut state = self.state();
            if accepts_qr(state.status) {
                state.qr = Some(qr);
                state.status = SessionStatus::QrPending;
                info!(session_id = %self.id, "QR challenge received");
            } else {
                debug!(session_id = %self.id, status = %state.status, "QR challenge ignored");
            }
        }

        match update.state {
            Some(ConnectionState::Open) => self.on_open(),
            Some(ConnectionState::Close) => {
                let reason = update
                    .close_reason
                    .unwrap_or(CloseReason::Lost { status_code: None });
                if reason.is_permanent() {
                    warn!(session_id = %self.id, "logged out permanently, cleaning up");
                    self.cleanup().await;
                } else {
                    warn!(session_id = %self.id, reason = ?reason, "connection closed");
                    self.set_status(SessionStatus::Starting);
                    self.start_reconnecting();
                }
            }
            Some(ConnectionState::Connecting) => {
                let mut state = self.state();
                if state.status != SessionStatus::QrPending {
                    state.status = SessionStatus::Starting;
                }
            }
            None => {}
        }
    }

    fn on_open(self: &Arc<Self>) {
        {
            let mut state = self.state();
            state.status = SessionStatus::Open;
            state.retry_count = 0;
            state.qr = None;
            state.cancel_reconnect();
        }
        info!(session_id = %self.id, queued = self.queue.len(), "connection open");
        self.trigger_drain();
    }

    fn on_message(self: &Arc<Self>, message: InboundEvent) {
        let Some(url) = self.webhook_url.clone() else {
            debug!(session_id = %self.id, message_id = %message.id, "no webhook configured");
            return;
        };
        let Some(handle) = self.handle() else {
            return;
        };
        let session = self.clone();
        tokio::spawn(async move {
            session
                .ctx
                .webhooks
                .dispatch(&session.id, &url, &message, handle.as_ref())
                .await;
        });
    }

    async fn on_credentials(&self, credentials: Credentials) {
        match self.ctx.credentials.save(&self.id, &credentials).await {
            Ok(()) => debug!(session_id = %self.id, "credentials persisted"),
            Err(e) => error!(session_id = %self.id, error = %e, "failed to persist credentials"),
        }
    }

    /// Counts a transient disconnect and schedules the next attempt, or
    /// gives up once the budget is spent.
    fn start_reconnecting(self: &Arc<Self>) {
        let mut state = self.state();
        state.retry_count += 1;
        let attempt = state.retry_count;
        let max_retries = self.ctx.settings.max_retries;

        if attempt > max_retries {
            state.status = SessionStatus::MaxRetriesReached;
            state.qr = None;
            state.cancel_reconnect();
            let stale = state.detach();
            drop(state);
            error!(session_id = %self.id, max_retries, "retry budget exhausted");
            if let Some(stale) = stale {
                tokio::spawn(async move { stale.close().await });
            }
            return;
        }

        let delay = self.ctx.settings.backoff.delay(attempt);
        warn!(
            session_id = %self.id,
            attempt,
            delay_ms = delay.as_millis() as u64,
            "scheduling reconnect"
        );

        state.reconnect_ticket += 1;
        let ticket = state.reconnect_ticket;
        let weak = Arc::downgrade(self);
        let timer = tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            let Some(session) = weak.upgrade() else {
                return;
            };
            if session.claim_reconnect(ticket) {
                session.init().await;
            }
        });
        if let Some(previous) = state.reconnect.replace(timer) {
            previous.abort();
        }
    }

    /// Releases the timer slot if `ticket` is still the scheduled one.
    fn claim_reconnect(&self, ticket: u64) -> bool {
        let mut state = self.state();
        if state.reconnect_ticket != ticket || state.reconnect.is_none() {
            return false;
        }
        state.reconnect = None;
        true
    }

    /// Deletes persisted state and removes the session from the registry.
    async fn cleanup(self: &Arc<Self>) {
        let handle = {
            let mut state = self.state();
            state.status = SessionStatus::Closed;
            state.qr = None;
            state.cancel_reconnect();
            state.detach()
        };
        if let Some(handle) = handle {
            handle.close().await;
        }

        if let Err(e) = self.ctx.credentials.delete(&self.id).await {
            error!(session_id = %self.id, error = %e, "failed to delete credentials");
        }
        if let Err(e) = self.ctx.metadata.delete(&self.id).await {
            error!(session_id = %self.id, error = %e, "failed to delete session metadata");
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_entry(self);
        }

        let dropped = self.queue.len();
        if dropped > 0 {
            warn!(session_id = %self.id, dropped, "pending messages discarded on logout");
        }
        info!(session_id = %self.id, "session files removed");
    }

    // --- outbound ---

    /// Sends a text message, or queues it when the connection is not open.
    pub async fn send_message(
        self: &Arc<Self>,
        recipient: &str,
        text: &str,
    ) -> Result<SendOutcome, SwitchboardError> {
        self.submit(recipient, OutboundContent::text(text)).await
    }

    /// Sends an image stored at `path`.
    pub async fn send_image(
        self: &Arc<Self>,
        recipient: &str,
        path: PathBuf,
        caption: Option<String>,
    ) -> Result<SendOutcome, SwitchboardError> {
        self.submit(recipient, OutboundContent::Image { path, caption })
            .await
    }

    /// Sends a document stored at `path`.
    pub async fn send_document(
        self: &Arc<Self>,
        recipient: &str,
        path: PathBuf,
        file_name: String,
        mimetype: String,
        caption: Option<String>,
    ) -> Result<SendOutcome, SwitchboardError> {
        self.submit(
            recipient,
            OutboundContent::Document {
                path,
                file_name,
                mimetype,
                caption,
            },
        )
        .await
    }

    async fn submit(
        self: &Arc<Self>,
        recipient: &str,
        content: OutboundContent,
    ) -> Result<SendOutcome, SwitchboardError> {
        let jid = normalize_jid(recipient, &self.ctx.settings.jid_domain)?;
        if let Some(path) = content.media_path() {
            if !tokio::fs::try_exists(path).await.unwrap_or(false) {
                return Err(SwitchboardError::InvalidInput(format!(
                    "media file not found: {}",
                    path.display()
                )));
            }
        }

        let job = OutboundJob::new(jid, content);
        let immediate = if self.status() == SessionStatus::Open && self.queue.is_idle() {
            self.handle()
        } else {
            None
        };

        let Some(handle) = immediate else {
            // Queued jobs take their slot when the drain sends them.
            self.rate_limiter.check()?;
            let position = self.queue.push_back(job);
            debug!(session_id = %self.id, position, "message queued");
            if self.status() == SessionStatus::Open {
                self.trigger_drain();
            }
            return Ok(SendOutcome::Queued { position });
        };

        self.rate_limiter.try_acquire()?;
        match handle.send(&job.recipient, &job.content).await {
            Ok(receipt) => {
                debug!(session_id = %self.id, to = %job.recipient, "message sent");
                Ok(SendOutcome::Sent {
                    message_id: receipt.message_id,
                })
            }
            Err(e) => {
                self.rate_limiter.release();
                warn!(session_id = %self.id, error = %e, "send failed, message queued at head");
                self.queue.push_front(job);
                Ok(SendOutcome::Queued { position: 1 })
            }
        }
    }

    /// Spawns a drain unless one is running or nothing is queued.
    fn trigger_drain(self: &Arc<Self>) {
        if self.queue.is_empty() || self.queue.is_draining() {
            return;
        }
        let session = self.clone();
        tokio::spawn(async move {
            match session.queue.drain(session.as_ref()).await {
                DrainOutcome::Drained { sent } => {
                    info!(session_id = %session.id, sent, "outbound queue drained")
                }
                DrainOutcome::Halted { sent, error } => warn!(
                    session_id = %session.id,
                    sent,
                    remaining = session.queue.len(),
                    error = %error,
                    "outbound queue halted"
                ),
                DrainOutcome::NotReady { sent } => {
                    debug!(session_id = %session.id, sent, "connection left open state mid-drain")
                }
                DrainOutcome::AlreadyDraining => {}
            }
        });
    }
}

#[async_trait]
impl JobDispatcher for Session {
    fn is_ready(&self) -> bool {
        let state = self.state();
        state.status == SessionStatus::Open && state.handle.is_some()
    }

    async fn dispatch(&self, job: &OutboundJob) -> Result<SendReceipt, SwitchboardError> {
        let handle = self
            .handle()
            .ok_or_else(|| SwitchboardError::transport("no live connection"))?;
        self.rate_limiter.try_acquire()?;
        handle
            .send(&job.recipient, &job.content)
            .await
            .inspect_err(|_| self.rate_limiter.release())
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("id", &self.id)
            .field("status", &self.status())
            .field("queued", &self.queue.len())
            .finish()
    }
}

/// Forwards events from one handle until the subscription is cancelled or
/// the session reinitializes.
async fn pump_events(
    session: Weak<Session>,
    generation: u64,
    mut events: mpsc::UnboundedReceiver<TransportEvent>,
    token: CancellationToken,
) {
    loop {
        let event = tokio::select! {
            _ = token.cancelled() => break,
            event = events.recv() => match event {
                Some(event) => event,
                None => break,
            },
        };
        let Some(session) = session.upgrade() else {
            break;
        };
        if !session.is_current(generation) {
            break;
        }
        session.handle_event(event).await;
    }
}

/// Appends `@<domain>` to a bare number.
/// Whether a QR challenge may move a session in `status` to `qr_pending`.
fn accepts_qr(status: SessionStatus) -> bool {
    matches!(status, SessionStatus::Starting | SessionStatus::QrPending)
}

pub fn normalize_jid(recipient: &str, domain: &str) -> Result<String, SwitchboardError> {
    let recipient = recipient.trim();
    if recipient.is_empty() {
        return Err(SwitchboardError::InvalidInput(
            "recipient must not be empty".to_string(),
        ));
    }
    if recipient.contains('@') {
        Ok(recipient.to_string())
    } else {
        Ok(format!("{recipient}@{domain}"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_numbers_get_default_domain() {
        assert_eq!(
            normalize_jid("5215512345678", "s.whatsapp.net").unwrap(),
            "5215512345678@s.whatsapp.net"
        );
    }

    #[test]
    fn qualified_addresses_pass_through() {
        assert_eq!(
            normalize_jid("12345-678@g.us", "s.whatsapp.net").unwrap(),
            "12345-678@g.us"
        );
        assert_eq!(
            normalize_jid(" 1@s.whatsapp.net ", "s.whatsapp.net").unwrap(),
            "1@s.whatsapp.net"
        );
    }

    #[test]
    fn empty_recipient_rejected() {
        assert!(matches!(
            normalize_jid("   ", "s.whatsapp.net"),
            Err(SwitchboardError::InvalidInput(_))
        ));
    }

    #[test]
    fn send_outcome_json_shape() {
        let sent = serde_json::to_value(SendOutcome::Sent {
            message_id: "ABC".into(),
        })
        .unwrap();
        assert_eq!(sent["status"], "sent");
        assert_eq!(sent["messageId"], "ABC");

        let queued = serde_json::to_value(SendOutcome::Queued { position: 2 }).unwrap();
        assert_eq!(queued["status"], "queued");
        assert_eq!(queued["position"], 2);
    }

    #[test]
    fn settings_follow_config() {
        let mut config = SwitchboardConfig::default();
        config.session.max_retries = 2;
        config.session.send_pacing_ms = 50;
        let settings = SessionSettings::from_config(&config);
        assert_eq!(settings.max_retries, 2);
        assert_eq!(settings.send_pacing, Duration::from_millis(50));
        assert_eq!(settings.jid_domain, "s.whatsapp.net");
    }
}
