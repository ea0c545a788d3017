// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Post-deserialization validation for configuration values.
//!
//! Checks the constraints serde attributes cannot express: retry and backoff
//! ordering, send budgets, URL schemes, and the auth requirement for
//! non-loopback binds.

use std::net::IpAddr;

use crate::diagnostic::ConfigError;
use crate::model::SwitchboardConfig;

/// Validate a deserialized configuration for semantic correctness.
///
/// Collects every violation instead of failing on the first one.
pub fn validate_config(config: &SwitchboardConfig) -> Result<(), Vec<ConfigError>> {
    let mut errors = Vec::new();

    let host = config.server.host.trim();
    if host.is_empty() {
        errors.push(ConfigError::validation("server.host must not be empty"));
    } else if !is_loopback(host) && !has_token(config.server.bearer_token.as_deref()) {
        errors.push(ConfigError::validation(format!(
            "server.bearer_token is required when binding to non-loopback host `{host}`"
        )));
    }

    if config.storage.sessions_dir.trim().is_empty() {
        errors.push(ConfigError::validation(
            "storage.sessions_dir must not be empty",
        ));
    }

    let session = &config.session;
    if session.max_retries == 0 {
        errors.push(ConfigError::validation(
            "session.max_retries must be at least 1",
        ));
    }
    if session.backoff_base_ms == 0 {
        errors.push(ConfigError::validation(
            "session.backoff_base_ms must be greater than 0",
        ));
    }
    if session.backoff_base_ms > session.backoff_cap_ms {
        errors.push(ConfigError::validation(format!(
            "session.backoff_base_ms ({}) must not exceed session.backoff_cap_ms ({})",
            session.backoff_base_ms, session.backoff_cap_ms
        )));
    }
    if session.default_jid_domain.trim().is_empty() || session.default_jid_domain.contains('@') {
        errors.push(ConfigError::validation(format!(
            "session.default_jid_domain `{}` must be a bare domain",
            session.default_jid_domain
        )));
    }

    let limits = &config.rate_limit;
    if limits.hourly_limit == 0 || limits.daily_limit == 0 {
        errors.push(ConfigError::validation(
            "rate_limit.hourly_limit and rate_limit.daily_limit must be greater than 0",
        ));
    } else if limits.daily_limit < limits.hourly_limit {
        errors.push(ConfigError::validation(format!(
            "rate_limit.daily_limit ({}) must be at least rate_limit.hourly_limit ({})",
            limits.daily_limit, limits.hourly_limit
        )));
    }

    if config.webhook.timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "webhook.timeout_secs must be greater than 0",
        ));
    }

    let bridge_url = config.transport.bridge_url.trim();
    if !(bridge_url.starts_with("ws://") || bridge_url.starts_with("wss://")) {
        errors.push(ConfigError::validation(format!(
            "transport.bridge_url `{bridge_url}` must use the ws:// or wss:// scheme"
        )));
    }
    if config.transport.request_timeout_secs == 0 {
        errors.push(ConfigError::validation(
            "transport.request_timeout_secs must be greater than 0",
        ));
    }

    if errors.is_empty() {
        Ok(())
    } else {
        Err(errors)
    }
}

fn is_loopback(host: &str) -> bool {
    if host.eq_ignore_ascii_case("localhost") {
        return true;
    }
    host.parse::<IpAddr>().map(|ip| ip.is_loopback()).unwrap_or(false)
}

fn has_token(token: Option<&str>) -> bool {
    token.is_some_and(|t| !t.trim().is_empty())
}
