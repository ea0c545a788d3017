// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP request handlers for the session REST API.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};

use switchboard_core::{SessionId, SessionStatus, SwitchboardError};
use switchboard_session::{RateLimitStatus, SendOutcome, Session, SessionSnapshot};

use crate::server::GatewayState;

/// Request body for `POST /api/sessions/start`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartRequest {
    #[serde(default)]
    pub session_id: Option<String>,
    /// Endpoint that receives inbound messages.
    #[serde(default, alias = "webhookUrl")]
    pub webhook: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StartResponse {
    pub success: bool,
    pub message: String,
    pub session_id: SessionId,
    pub status: SessionStatus,
}

#[derive(Debug, Serialize)]
pub struct StatusResponse {
    pub success: bool,
    #[serde(flatten)]
    pub session: SessionSnapshot,
}

#[derive(Debug, Serialize)]
pub struct SessionListResponse {
    pub success: bool,
    pub sessions: Vec<SessionSnapshot>,
}

/// Request body for `POST /api/sessions/{id}/send-message`.
#[derive(Debug, Default, Deserialize)]
pub struct SendMessageRequest {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Request body for `POST /api/sessions/{id}/send-image`.
#[derive(Debug, Default, Deserialize)]
pub struct SendImageRequest {
    #[serde(default)]
    pub number: Option<String>,
    /// Path of the image on the server's filesystem.
    #[serde(default)]
    pub path: Option<PathBuf>,
    #[serde(default)]
    pub caption: Option<String>,
}

/// Request body for `POST /api/sessions/{id}/send-document`.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SendDocumentRequest {
    #[serde(default)]
    pub number: Option<String>,
    #[serde(default)]
    pub path: Option<PathBuf>,
    /// Defaults to the last component of `path`.
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default)]
    pub mimetype: Option<String>,
    #[serde(default)]
    pub caption: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SendResponse {
    pub success: bool,
    pub details: SendOutcome,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RateLimitResponse {
    pub success: bool,
    pub session_id: SessionId,
    pub rate_limit: RateLimitStatus,
}

#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub success: bool,
    pub message: String,
}

/// Response body for `GET /health`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HealthResponse {
    pub status: String,
    pub version: String,
    pub uptime_secs: u64,
    pub sessions: usize,
}

/// Error response body.
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    pub message: String,
}

/// A [`SwitchboardError`] rendered as an HTTP response.
#[derive(Debug)]
pub struct ApiError(pub SwitchboardError);

impl ApiError {
    fn status(&self) -> StatusCode {
        match &self.0 {
            SwitchboardError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            SwitchboardError::SessionNotFound(_) => StatusCode::NOT_FOUND,
            SwitchboardError::InvalidSessionId(_) | SwitchboardError::InvalidInput(_) => {
                StatusCode::BAD_REQUEST
            }
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl From<SwitchboardError> for ApiError {
    fn from(e: SwitchboardError) -> Self {
        ApiError(e)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            tracing::error!(error = %self.0, "request failed");
        }
        (
            status,
            Json(ErrorResponse {
                success: false,
                message: self.0.to_string(),
            }),
        )
            .into_response()
    }
}

fn required(value: Option<String>, field: &str) -> Result<String, ApiError> {
    match value {
        Some(v) if !v.trim().is_empty() => Ok(v),
        _ => Err(SwitchboardError::InvalidInput(format!("`{field}` is required")).into()),
    }
}

fn lookup(state: &GatewayState, raw: &str) -> Result<Arc<Session>, ApiError> {
    let id = SessionId::parse(raw)?;
    state
        .registry
        .get(&id)
        .ok_or_else(|| SwitchboardError::SessionNotFound(raw.to_string()).into())
}

fn send_response(outcome: SendOutcome) -> (StatusCode, Json<SendResponse>) {
    let status = match outcome {
        SendOutcome::Sent { .. } => StatusCode::OK,
        SendOutcome::Queued { .. } => StatusCode::ACCEPTED,
    };
    (
        status,
        Json(SendResponse {
            success: true,
            details: outcome,
        }),
    )
}

/// GET /health
pub async fn get_health(State(state): State<GatewayState>) -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
        uptime_secs: state.started.elapsed().as_secs(),
        sessions: state.registry.len(),
    })
}

/// POST /api/sessions/start
///
/// Starts (or revives) a session. The QR code, if one is needed, shows up on
/// the status endpoint once the transport produces it.
pub async fn start_session(
    State(state): State<GatewayState>,
    Json(body): Json<StartRequest>,
) -> Result<Json<StartResponse>, ApiError> {
    let id = SessionId::parse(required(body.session_id, "sessionId")?)?;
    let webhook = body.webhook.filter(|url| !url.trim().is_empty());
    if let Some(url) = &webhook {
        if !(url.starts_with("http://") || url.starts_with("https://")) {
            return Err(SwitchboardError::InvalidInput(format!(
                "webhook `{url}` must be an http(s) URL"
            ))
            .into());
        }
    }

    let session = state.registry.start(id, webhook).await?;
    Ok(Json(StartResponse {
        success: true,
        message: "session is starting; poll the status endpoint for the QR code".to_string(),
        session_id: session.id().clone(),
        status: session.status(),
    }))
}

/// GET /api/sessions
pub async fn list_sessions(State(state): State<GatewayState>) -> Json<SessionListResponse> {
    Json(SessionListResponse {
        success: true,
        sessions: state.registry.list(),
    })
}

/// GET /api/sessions/{id}/status
pub async fn get_status(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<StatusResponse>, ApiError> {
    let session = lookup(&state, &id)?;
    Ok(Json(StatusResponse {
        success: true,
        session: session.snapshot(),
    }))
}

/// POST /api/sessions/{id}/send-message
///
/// Answers 200 when the message went out, 202 when it was queued.
pub async fn send_message(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<SendMessageRequest>,
) -> Result<(StatusCode, Json<SendResponse>), ApiError> {
    let number = required(body.number, "number")?;
    let message = required(body.message, "message")?;
    let session = lookup(&state, &id)?;
    let outcome = session.send_message(&number, &message).await?;
    Ok(send_response(outcome))
}

/// POST /api/sessions/{id}/send-image
pub async fn send_image(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<SendImageRequest>,
) -> Result<(StatusCode, Json<SendResponse>), ApiError> {
    let number = required(body.number, "number")?;
    let path = body
        .path
        .ok_or_else(|| SwitchboardError::InvalidInput("`path` is required".to_string()))?;
    let session = lookup(&state, &id)?;
    let outcome = session.send_image(&number, path, body.caption).await?;
    Ok(send_response(outcome))
}

/// POST /api/sessions/{id}/send-document
pub async fn send_document(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
    Json(body): Json<SendDocumentRequest>,
) -> Result<(StatusCode, Json<SendResponse>), ApiError> {
    let number = required(body.number, "number")?;
    let path = body
        .path
        .ok_or_else(|| SwitchboardError::InvalidInput("`path` is required".to_string()))?;
    let file_name = body
        .file_name
        .or_else(|| {
            path.file_name()
                .map(|name| name.to_string_lossy().into_owned())
        })
        .unwrap_or_else(|| "document".to_string());
    let mimetype = body
        .mimetype
        .unwrap_or_else(|| "application/octet-stream".to_string());

    let session = lookup(&state, &id)?;
    let outcome = session
        .send_document(&number, path, file_name, mimetype, body.caption)
        .await?;
    Ok(send_response(outcome))
}

/// GET /api/sessions/{id}/rate-limit
pub async fn get_rate_limit(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<RateLimitResponse>, ApiError> {
    let session = lookup(&state, &id)?;
    Ok(Json(RateLimitResponse {
        success: true,
        session_id: session.id().clone(),
        rate_limit: session.rate_limit_status(),
    }))
}

/// DELETE /api/sessions/{id}/end
///
/// Requests logout. The session disappears from the registry once the
/// transport confirms the close.
pub async fn end_session(
    State(state): State<GatewayState>,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let session_id = SessionId::parse(id.as_str())?;
    if !state.registry.end(&session_id).await? {
        return Err(SwitchboardError::SessionNotFound(id).into());
    }
    Ok(Json(MessageResponse {
        success: true,
        message: "session closed".to_string(),
    }))
}
