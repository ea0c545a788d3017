// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Transport trait for the external protocol engine.
//!
//! The transport performs the wire-level handshake, encryption, and framing.
//! Sessions only see connection updates, inbound messages, and credential
//! updates arriving through a subscription, plus a handful of operations.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::SwitchboardError;
use crate::types::{
    Credentials, InboundEvent, OutboundContent, SendReceipt, SessionId, TransportEvent,
};

/// Factory for live connections.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    /// Human-readable name of this transport.
    fn name(&self) -> &str;

    /// Opens a connection for `session_id` using previously persisted
    /// credentials, or starts a fresh pairing when `credentials` is `None`.
    ///
    /// Errors returned here are initialization failures; everything that
    /// happens after the handle exists is reported as events.
    async fn initialize(
        &self,
        session_id: &SessionId,
        credentials: Option<Credentials>,
    ) -> Result<Arc<dyn TransportHandle>, SwitchboardError>;
}

/// One live connection produced by [`Transport::initialize`].
#[async_trait]
pub trait TransportHandle: Send + Sync + 'static {
    /// Registers a new event subscriber.
    ///
    /// Events emitted before the first subscription are buffered and
    /// delivered to it.
    fn subscribe(&self) -> mpsc::UnboundedReceiver<TransportEvent>;

    /// Sends a message to `jid`.
    async fn send(
        &self,
        jid: &str,
        content: &OutboundContent,
    ) -> Result<SendReceipt, SwitchboardError>;

    /// Downloads the raw bytes of a media message.
    async fn fetch_media(&self, event: &InboundEvent) -> Result<Vec<u8>, SwitchboardError>;

    /// Logs the account out. The transport follows up with a
    /// permanent-logout close event.
    async fn logout(&self) -> Result<(), SwitchboardError>;

    /// Releases the connection without logging out.
    async fn close(&self);
}
