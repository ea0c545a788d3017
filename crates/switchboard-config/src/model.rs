// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Configuration model structs for the Switchboard session manager.
//!
//! All structs use `#[serde(deny_unknown_fields)]` to reject unrecognized
//! config keys at startup, providing actionable error messages.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Top-level Switchboard configuration.
///
/// Loaded from TOML files following XDG hierarchy, with environment variable overrides.
/// All sections are optional and default to sensible values.
#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SwitchboardConfig {
    /// Process-wide settings.
    #[serde(default)]
    pub service: ServiceConfig,

    /// HTTP surface settings.
    #[serde(default)]
    pub server: ServerConfig,

    /// Durable store settings.
    #[serde(default)]
    pub storage: StorageConfig,

    /// Session lifecycle settings (retries, backoff, queue pacing).
    #[serde(default)]
    pub session: SessionConfig,

    /// Per-session outbound send budgets.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,

    /// Inbound webhook delivery settings.
    #[serde(default)]
    pub webhook: WebhookConfig,

    /// Protocol engine bridge settings.
    #[serde(default)]
    pub transport: TransportConfig,
}

/// Process-wide settings.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServiceConfig {
    /// Logging level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

impl Default for ServiceConfig {
    fn default() -> Self {
        Self {
            log_level: default_log_level(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}

/// HTTP surface configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct ServerConfig {
    /// Host address to bind. Loopback by default.
    #[serde(default = "default_host")]
    pub host: String,

    /// Port to bind.
    #[serde(default = "default_port")]
    pub port: u16,

    /// Bearer token required on `/api` routes. `None` disables auth,
    /// which is only accepted on a loopback host.
    #[serde(default)]
    pub bearer_token: Option<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            bearer_token: None,
        }
    }
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    3000
}

/// Durable store configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct StorageConfig {
    /// Directory holding one subdirectory per session.
    #[serde(default = "default_sessions_dir")]
    pub sessions_dir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            sessions_dir: default_sessions_dir(),
        }
    }
}

fn default_sessions_dir() -> String {
    dirs::data_dir()
        .map(|p| p.join("switchboard").join("sessions"))
        .unwrap_or_else(|| std::path::PathBuf::from("./sessions"))
        .to_string_lossy()
        .into_owned()
}

/// Session lifecycle configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct SessionConfig {
    /// Transient disconnects tolerated before a session gives up.
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,

    /// First reconnect delay in milliseconds; doubles per attempt.
    #[serde(default = "default_backoff_base_ms")]
    pub backoff_base_ms: u64,

    /// Upper bound of the uniform random jitter added to each delay.
    #[serde(default = "default_backoff_jitter_ms")]
    pub backoff_jitter_ms: u64,

    /// Ceiling for any reconnect delay.
    #[serde(default = "default_backoff_cap_ms")]
    pub backoff_cap_ms: u64,

    /// Minimum gap between two queued sends.
    #[serde(default = "default_send_pacing_ms")]
    pub send_pacing_ms: u64,

    /// Domain appended to bare recipient numbers.
    #[serde(default = "default_jid_domain")]
    pub default_jid_domain: String,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            max_retries: default_max_retries(),
            backoff_base_ms: default_backoff_base_ms(),
            backoff_jitter_ms: default_backoff_jitter_ms(),
            backoff_cap_ms: default_backoff_cap_ms(),
            send_pacing_ms: default_send_pacing_ms(),
            default_jid_domain: default_jid_domain(),
        }
    }
}

impl SessionConfig {
    pub fn send_pacing(&self) -> Duration {
        Duration::from_millis(self.send_pacing_ms)
    }
}

fn default_max_retries() -> u32 {
    5
}

fn default_backoff_base_ms() -> u64 {
    5_000
}

fn default_backoff_jitter_ms() -> u64 {
    2_000
}

fn default_backoff_cap_ms() -> u64 {
    300_000
}

fn default_send_pacing_ms() -> u64 {
    1_000
}

fn default_jid_domain() -> String {
    "s.whatsapp.net".to_string()
}

/// Outbound send budgets, tracked per session.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct RateLimitConfig {
    /// Messages allowed per hour.
    #[serde(default = "default_hourly_limit")]
    pub hourly_limit: u32,

    /// Messages allowed per day.
    #[serde(default = "default_daily_limit")]
    pub daily_limit: u32,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            hourly_limit: default_hourly_limit(),
            daily_limit: default_daily_limit(),
        }
    }
}

fn default_hourly_limit() -> u32 {
    200
}

fn default_daily_limit() -> u32 {
    1_000
}

/// Inbound webhook delivery configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct WebhookConfig {
    /// Per-request timeout for webhook POSTs.
    #[serde(default = "default_webhook_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for WebhookConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_webhook_timeout_secs(),
        }
    }
}

fn default_webhook_timeout_secs() -> u64 {
    10
}

/// Protocol engine bridge configuration.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(deny_unknown_fields)]
pub struct TransportConfig {
    /// Base WebSocket URL of the protocol engine.
    #[serde(default = "default_bridge_url")]
    pub bridge_url: String,

    /// Timeout for a single request/response exchange with the engine.
    #[serde(default = "default_request_timeout_secs")]
    pub request_timeout_secs: u64,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            bridge_url: default_bridge_url(),
            request_timeout_secs: default_request_timeout_secs(),
        }
    }
}

fn default_bridge_url() -> String {
    "ws://127.0.0.1:8085".to_string()
}

fn default_request_timeout_secs() -> u64 {
    30
}
