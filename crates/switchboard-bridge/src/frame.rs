// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! JSON frames exchanged with the protocol engine.
//!
//! Every frame is a text message holding one object with a `type` tag.
//! Requests carry an `id`; the engine answers each with a `result` frame
//! echoing it.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};

use switchboard_core::SwitchboardError;
use switchboard_core::types::{ConnectionUpdate, Credentials, InboundEvent, OutboundContent};

/// Frames sent to the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientFrame {
    /// First frame on every socket.
    Init { credentials: Option<Credentials> },
    Send {
        id: u64,
        jid: String,
        content: WireContent,
    },
    FetchMedia { id: u64, message: InboundEvent },
    Logout { id: u64 },
}

/// Outbound content with media bytes inlined.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum WireContent {
    Text {
        text: String,
    },
    Image {
        data: String,
        caption: Option<String>,
    },
    Document {
        data: String,
        file_name: String,
        mimetype: String,
        caption: Option<String>,
    },
}

impl WireContent {
    /// Reads referenced media from disk and base64-encodes it.
    pub async fn from_outbound(content: &OutboundContent) -> Result<Self, SwitchboardError> {
        Ok(match content {
            OutboundContent::Text { text } => WireContent::Text { text: text.clone() },
            OutboundContent::Image { path, caption } => WireContent::Image {
                data: STANDARD.encode(read_media(path).await?),
                caption: caption.clone(),
            },
            OutboundContent::Document {
                path,
                file_name,
                mimetype,
                caption,
            } => WireContent::Document {
                data: STANDARD.encode(read_media(path).await?),
                file_name: file_name.clone(),
                mimetype: mimetype.clone(),
                caption: caption.clone(),
            },
        })
    }
}

async fn read_media(path: &std::path::Path) -> Result<Vec<u8>, SwitchboardError> {
    tokio::fs::read(path)
        .await
        .map_err(|e| SwitchboardError::InvalidInput(format!("cannot read {}: {e}", path.display())))
}

/// Frames received from the engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineFrame {
    ConnectionUpdate(ConnectionUpdate),
    Message(InboundEvent),
    CredsUpdate { credentials: Credentials },
    Result(RequestResult),
}

/// Answer to a request frame.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RequestResult {
    pub id: u64,
    pub ok: bool,
    #[serde(default)]
    pub message_id: Option<String>,
    /// Base64 payload of a media download.
    #[serde(default)]
    pub data: Option<String>,
    #[serde(default)]
    pub error: Option<String>,
}

impl RequestResult {
    pub fn into_result(self) -> Result<Self, SwitchboardError> {
        if self.ok {
            Ok(self)
        } else {
            Err(SwitchboardError::transport(
                self.error
                    .unwrap_or_else(|| "engine rejected the request".to_string()),
            ))
        }
    }

    pub fn decode_data(&self) -> Result<Vec<u8>, SwitchboardError> {
        let data = self
            .data
            .as_deref()
            .ok_or_else(|| SwitchboardError::transport("media result without data"))?;
        STANDARD.decode(data).map_err(|e| SwitchboardError::Transport {
            message: "media result is not valid base64".to_string(),
            source: Some(Box::new(e)),
        })
    }
}
