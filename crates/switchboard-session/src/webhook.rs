// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Inbound-message webhook delivery.
//!
//! Each inbound event from another party becomes one JSON POST to the
//! session's webhook URL. Media is fetched through the transport and
//! inlined as base64. Delivery is attempted once; failures are logged.

use std::time::Duration;

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::{debug, info, warn};

use switchboard_config::model::WebhookConfig;
use switchboard_core::types::{InboundEvent, InboundPayload};
use switchboard_core::{SessionId, SwitchboardError, TransportHandle};

/// Classification of an inbound message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum MessageKind {
    Text,
    Image,
    Video,
    Audio,
    Document,
    Sticker,
    Unsupported,
}

impl MessageKind {
    pub fn is_media(&self) -> bool {
        !matches!(self, MessageKind::Text | MessageKind::Unsupported)
    }
}

/// Body POSTed to the webhook URL.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookPayload {
    pub session_id: String,
    pub timestamp: DateTime<Utc>,
    pub message: WebhookMessage,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMessage {
    pub id: String,
    pub from: String,
    pub sender_name: Option<String>,
    #[serde(rename = "type")]
    pub kind: MessageKind,
    /// Message text or media caption; empty when neither exists.
    pub text: String,
    /// Base64 of the media bytes, `null` for text or when the fetch failed.
    pub media: Option<String>,
    pub mimetype: Option<String>,
    pub file_name: Option<String>,
}

struct Classified {
    kind: MessageKind,
    text: Option<String>,
    mimetype: Option<String>,
    file_name: Option<String>,
}

fn classify(payload: &InboundPayload) -> Classified {
    let plain = |kind, text: &Option<String>, mimetype: &Option<String>| Classified {
        kind,
        text: text.clone(),
        mimetype: mimetype.clone(),
        file_name: None,
    };
    match payload {
        InboundPayload::Text { text } => Classified {
            kind: MessageKind::Text,
            text: Some(text.clone()),
            mimetype: None,
            file_name: None,
        },
        InboundPayload::Image { caption, mimetype } => plain(MessageKind::Image, caption, mimetype),
        InboundPayload::Video { caption, mimetype } => plain(MessageKind::Video, caption, mimetype),
        InboundPayload::Audio { mimetype } => plain(MessageKind::Audio, &None, mimetype),
        InboundPayload::Sticker { mimetype } => plain(MessageKind::Sticker, &None, mimetype),
        InboundPayload::Document {
            file_name,
            mimetype,
            caption,
        } => Classified {
            kind: MessageKind::Document,
            text: caption.clone(),
            mimetype: mimetype.clone(),
            file_name: file_name.clone(),
        },
        InboundPayload::Unsupported => Classified {
            kind: MessageKind::Unsupported,
            text: None,
            mimetype: None,
            file_name: None,
        },
    }
}

/// Builds the webhook body for `event`, or `None` when the event is
/// self-authored or carries no payload.
pub async fn build_payload(
    session_id: &SessionId,
    event: &InboundEvent,
    handle: &dyn TransportHandle,
) -> Option<WebhookPayload> {
    if event.from_me {
        return None;
    }
    let payload = event.payload.as_ref()?;
    let classified = classify(payload);

    let media = if classified.kind.is_media() {
        match handle.fetch_media(event).await {
            Ok(bytes) => Some(STANDARD.encode(bytes)),
            Err(e) => {
                warn!(%session_id, message_id = %event.id, error = %e, "media download failed");
                None
            }
        }
    } else {
        None
    };

    Some(WebhookPayload {
        session_id: session_id.to_string(),
        timestamp: Utc::now(),
        message: WebhookMessage {
            id: event.id.clone(),
            from: event.remote_jid.clone(),
            sender_name: event.push_name.clone(),
            kind: classified.kind,
            text: classified.text.unwrap_or_default(),
            media,
            mimetype: classified.mimetype,
            file_name: classified.file_name,
        },
    })
}

/// Shared HTTP client for webhook POSTs.
#[derive(Debug, Clone)]
pub struct WebhookDispatcher {
    client: reqwest::Client,
}

impl WebhookDispatcher {
    pub fn new(config: &WebhookConfig) -> Result<Self, SwitchboardError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|e| SwitchboardError::Internal(format!("webhook client: {e}")))?;
        Ok(Self { client })
    }

    /// POSTs `payload` once.
    pub async fn deliver(&self, url: &str, payload: &WebhookPayload) -> Result<(), SwitchboardError> {
        let response = self
            .client
            .post(url)
            .json(payload)
            .send()
            .await
            .map_err(|e| SwitchboardError::Transport {
                message: format!("webhook POST to {url} failed"),
                source: Some(Box::new(e)),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SwitchboardError::transport(format!(
                "webhook {url} answered {status}"
            )));
        }
        Ok(())
    }

    /// Classifies `event` and delivers it, logging every outcome.
    pub async fn dispatch(
        &self,
        session_id: &SessionId,
        url: &str,
        event: &InboundEvent,
        handle: &dyn TransportHandle,
    ) {
        let Some(payload) = build_payload(session_id, event, handle).await else {
            debug!(%session_id, message_id = %event.id, "inbound event not forwarded");
            return;
        };
        info!(
            %session_id,
            from = %payload.message.from,
            kind = ?payload.message.kind,
            "message received"
        );

        match self.deliver(url, &payload).await {
            Ok(()) => info!(%session_id, url, "webhook delivered"),
            Err(e) => warn!(%session_id, url, error = %e, "webhook delivery failed"),
        }
    }
}
