// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Common types shared by the session manager, its collaborators, and the gateway.

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum::{Display, EnumString};

use crate::error::SwitchboardError;

/// Maximum length of a session identifier.
pub const MAX_SESSION_ID_LEN: usize = 64;

/// Unique identifier for a managed messaging-account session.
///
/// Identifiers double as directory names in the durable store, so only
/// ASCII alphanumerics, `-` and `_` are accepted.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct SessionId(String);

impl SessionId {
    /// Validates and wraps a raw identifier.
    pub fn parse(raw: impl Into<String>) -> Result<Self, SwitchboardError> {
        let raw = raw.into();
        let valid = !raw.is_empty()
            && raw.len() <= MAX_SESSION_ID_LEN
            && raw
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_');
        if valid {
            Ok(Self(raw))
        } else {
            Err(SwitchboardError::InvalidSessionId(raw))
        }
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for SessionId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for SessionId {
    type Error = SwitchboardError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        SessionId::parse(value)
    }
}

impl From<SessionId> for String {
    fn from(id: SessionId) -> Self {
        id.0
    }
}

/// Lifecycle status of a session.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumString, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum SessionStatus {
    /// Transport is being initialized or a reconnect is pending.
    Starting,
    /// The transport issued a QR challenge that must be scanned.
    QrPending,
    /// Connected and able to send.
    Open,
    /// Logout requested, waiting for the transport to confirm.
    Closing,
    /// Permanently logged out. Terminal.
    Closed,
    /// Transport initialization failed. Not retried automatically.
    Error,
    /// Transient disconnects exhausted the retry budget.
    MaxRetriesReached,
}

impl SessionStatus {
    /// Whether `start` may reuse the session as-is.
    pub fn is_healthy(&self) -> bool {
        !matches!(self, SessionStatus::Error | SessionStatus::MaxRetriesReached)
    }

    /// Whether the session stopped reacting to its transport.
    pub fn is_terminal(&self) -> bool {
        matches!(self, SessionStatus::Closed | SessionStatus::MaxRetriesReached)
    }
}

/// Durable per-session record used to restore sessions at startup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMetadata {
    pub session_id: SessionId,
    pub webhook_url: Option<String>,
    pub created_at: DateTime<Utc>,
}

impl SessionMetadata {
    pub fn new(session_id: SessionId, webhook_url: Option<String>) -> Self {
        Self {
            session_id,
            webhook_url,
            created_at: Utc::now(),
        }
    }
}

/// Opaque credential material produced and consumed by the transport.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Credentials(pub serde_json::Value);

/// Content of an outbound message.
///
/// Media variants carry a filesystem reference; reading and uploading the
/// bytes is the transport's job.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OutboundContent {
    Text {
        text: String,
    },
    Image {
        path: PathBuf,
        caption: Option<String>,
    },
    Document {
        path: PathBuf,
        file_name: String,
        mimetype: String,
        caption: Option<String>,
    },
}

impl OutboundContent {
    pub fn text(text: impl Into<String>) -> Self {
        OutboundContent::Text { text: text.into() }
    }

    /// Path of the referenced media file, if any.
    pub fn media_path(&self) -> Option<&PathBuf> {
        match self {
            OutboundContent::Text { .. } => None,
            OutboundContent::Image { path, .. } | OutboundContent::Document { path, .. } => {
                Some(path)
            }
        }
    }
}

/// Transport acknowledgement for a delivered message.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SendReceipt {
    pub message_id: String,
}

/// Connection state reported by the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Connecting,
    Open,
    Close,
}

/// Why the transport closed a connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum CloseReason {
    /// The account was logged out; credentials are no longer valid.
    LoggedOut,
    /// Any other disconnect. Recoverable by reconnecting.
    Lost { status_code: Option<u16> },
}

impl CloseReason {
    pub fn is_permanent(&self) -> bool {
        matches!(self, CloseReason::LoggedOut)
    }
}

/// A connection-state notification from the transport.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionUpdate {
    pub state: Option<ConnectionState>,
    pub close_reason: Option<CloseReason>,
    pub qr: Option<String>,
}

impl ConnectionUpdate {
    pub fn open() -> Self {
        Self {
            state: Some(ConnectionState::Open),
            ..Self::default()
        }
    }

    pub fn closed(reason: CloseReason) -> Self {
        Self {
            state: Some(ConnectionState::Close),
            close_reason: Some(reason),
            qr: None,
        }
    }

    pub fn qr(code: impl Into<String>) -> Self {
        Self {
            qr: Some(code.into()),
            ..Self::default()
        }
    }
}

/// Payload of an inbound message as surfaced by the transport.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InboundPayload {
    Text {
        text: String,
    },
    Image {
        caption: Option<String>,
        mimetype: Option<String>,
    },
    Video {
        caption: Option<String>,
        mimetype: Option<String>,
    },
    Audio {
        mimetype: Option<String>,
    },
    Document {
        file_name: Option<String>,
        mimetype: Option<String>,
        caption: Option<String>,
    },
    Sticker {
        mimetype: Option<String>,
    },
    /// Anything the transport could not map onto a known kind.
    Unsupported,
}

/// An inbound message event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InboundEvent {
    pub id: String,
    pub remote_jid: String,
    pub from_me: bool,
    pub push_name: Option<String>,
    pub payload: Option<InboundPayload>,
}

/// Everything a transport handle can emit to its subscribers.
#[derive(Debug, Clone, PartialEq)]
pub enum TransportEvent {
    ConnectionUpdate(ConnectionUpdate),
    Message(InboundEvent),
    CredentialsUpdated(Credentials),
}
