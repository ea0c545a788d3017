// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! `switchboard serve` command implementation.
//!
//! Opens the session store, connects the bridge transport, restores every
//! persisted session, and serves the HTTP API until a shutdown signal.

use std::sync::Arc;
use std::time::Duration;

use switchboard_bridge::BridgeTransport;
use switchboard_config::SwitchboardConfig;
use switchboard_core::{SwitchboardError, Transport};
use switchboard_gateway::GatewayState;
use switchboard_session::{SessionContext, SessionRegistry, SessionSettings, WebhookDispatcher};
use switchboard_storage::FsStore;
use tracing::{info, warn};

use crate::shutdown;

const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

/// Runs the `switchboard serve` command.
pub async fn run_serve(config: SwitchboardConfig) -> Result<(), SwitchboardError> {
    init_tracing(&config.service.log_level);
    info!(version = env!("CARGO_PKG_VERSION"), "starting switchboard serve");

    let transport = Arc::new(BridgeTransport::from_config(&config.transport));
    info!(bridge = %config.transport.bridge_url, "transport configured");
    let registry = build_registry(&config, transport).await?;

    let report = registry.restore_all().await?;
    for (id, reason) in &report.failed {
        warn!(session_id = %id, %reason, "session not restored");
    }
    info!(
        restored = report.restored.len(),
        failed = report.failed.len(),
        "restore complete"
    );

    let cancel = shutdown::install_signal_handler();
    let served = switchboard_gateway::serve(
        &config.server,
        GatewayState::new(registry.clone()),
        cancel.clone(),
    )
    .await;
    // A bind failure returns before any signal; stop the handler task too.
    cancel.cancel();

    shutdown::stop_sessions(&registry, SHUTDOWN_TIMEOUT).await;
    info!("switchboard stopped");
    served
}

/// Wires the filesystem store, webhook client, and `transport` into a registry.
pub async fn build_registry(
    config: &SwitchboardConfig,
    transport: Arc<dyn Transport>,
) -> Result<Arc<SessionRegistry>, SwitchboardError> {
    let store = Arc::new(FsStore::open(&config.storage).await?);
    info!(dir = %store.root().display(), "session store opened");

    Ok(SessionRegistry::new(SessionContext {
        settings: SessionSettings::from_config(config),
        transport,
        metadata: store.clone(),
        credentials: store,
        webhooks: WebhookDispatcher::new(&config.webhook)?,
    }))
}

/// Initializes the tracing subscriber. `RUST_LOG` takes precedence.
fn init_tracing(log_level: &str) {
    use tracing_subscriber::EnvFilter;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("switchboard={log_level},warn")));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .with_thread_names(false)
        .init();
}
