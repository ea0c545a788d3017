// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Gateway HTTP server built on axum.
//!
//! Sets up routes, middleware, and shared state for the gateway.

use std::sync::Arc;
use std::time::Instant;

use axum::{
    Router, middleware as axum_middleware,
    routing::{delete, get, post},
};
use tokio_util::sync::CancellationToken;
use tower::ServiceBuilder;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use switchboard_config::model::ServerConfig;
use switchboard_core::SwitchboardError;
use switchboard_session::SessionRegistry;

use crate::auth::{AuthConfig, auth_middleware};
use crate::handlers;

/// Shared state for axum request handlers.
#[derive(Clone)]
pub struct GatewayState {
    pub registry: Arc<SessionRegistry>,
    /// Process start time for uptime reporting.
    pub started: Instant,
}

impl GatewayState {
    pub fn new(registry: Arc<SessionRegistry>) -> Self {
        Self {
            registry,
            started: Instant::now(),
        }
    }
}

/// Builds the application router.
///
/// - `GET /health` is public.
/// - Everything under `/api/sessions` goes through [`auth_middleware`].
pub fn router(state: GatewayState, auth: AuthConfig) -> Router {
    let public_routes = Router::new()
        .route("/health", get(handlers::get_health))
        .with_state(state.clone());

    let api_routes = Router::new()
        .route("/api/sessions", get(handlers::list_sessions))
        .route("/api/sessions/start", post(handlers::start_session))
        .route("/api/sessions/{id}/status", get(handlers::get_status))
        .route("/api/sessions/{id}/send-message", post(handlers::send_message))
        .route("/api/sessions/{id}/send-image", post(handlers::send_image))
        .route("/api/sessions/{id}/send-document", post(handlers::send_document))
        .route("/api/sessions/{id}/rate-limit", get(handlers::get_rate_limit))
        .route("/api/sessions/{id}/end", delete(handlers::end_session))
        .route_layer(axum_middleware::from_fn_with_state(auth, auth_middleware))
        .with_state(state);

    Router::new().merge(public_routes).merge(api_routes).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(CorsLayer::permissive()),
    )
}

/// Serves the gateway until `shutdown` is cancelled.
pub async fn serve(
    config: &ServerConfig,
    state: GatewayState,
    shutdown: CancellationToken,
) -> Result<(), SwitchboardError> {
    let auth = AuthConfig {
        bearer_token: config.bearer_token.clone(),
    };
    let app = router(state, auth);

    let addr = format!("{}:{}", config.host, config.port);
    let listener = tokio::net::TcpListener::bind(&addr)
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: format!("failed to bind gateway to {addr}: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!(%addr, auth = config.bearer_token.is_some(), "gateway listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown.cancelled_owned())
        .await
        .map_err(|e| SwitchboardError::Transport {
            message: format!("gateway server error: {e}"),
            source: Some(Box::new(e)),
        })?;

    tracing::info!("gateway stopped");
    Ok(())
}
