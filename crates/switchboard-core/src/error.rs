// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Error types for the Switchboard session manager.

use thiserror::Error;

/// The primary error type used across all Switchboard crates.
#[derive(Debug, Error)]
pub enum SwitchboardError {
    /// Configuration errors (invalid TOML, missing required fields, bad values).
    #[error("configuration error: {0}")]
    Config(String),

    /// Durable store errors (metadata or credential I/O, serialization).
    #[error("storage error: {source}")]
    Storage {
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Transport collaborator errors (initialization, send, media fetch, logout).
    #[error("transport error: {message}")]
    Transport {
        message: String,
        source: Option<Box<dyn std::error::Error + Send + Sync>>,
    },

    /// A session identifier failed validation.
    #[error("invalid session id `{0}`")]
    InvalidSessionId(String),

    /// No session is registered under the given identifier.
    #[error("session not found: {0}")]
    SessionNotFound(String),

    /// The session's hourly or daily send budget is exhausted.
    #[error("rate limit exceeded: {window} limit of {limit} messages reached")]
    RateLimitExceeded { window: String, limit: u32 },

    /// A request carried an unusable value (missing file, empty recipient).
    #[error("invalid input: {0}")]
    InvalidInput(String),

    /// Operation timed out.
    #[error("operation timed out after {duration:?}")]
    Timeout { duration: std::time::Duration },

    /// Internal or unexpected errors.
    #[error("internal error: {0}")]
    Internal(String),
}

impl SwitchboardError {
    /// Shorthand for a transport error without an underlying source.
    pub fn transport(message: impl Into<String>) -> Self {
        SwitchboardError::Transport {
            message: message.into(),
            source: None,
        }
    }

    /// Returns `true` for the rate-limit rejection.
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, SwitchboardError::RateLimitExceeded { .. })
    }
}

impl From<std::io::Error> for SwitchboardError {
    fn from(e: std::io::Error) -> Self {
        SwitchboardError::Storage {
            source: Box::new(e),
        }
    }
}

impl From<serde_json::Error> for SwitchboardError {
    fn from(e: serde_json::Error) -> Self {
        SwitchboardError::Storage {
            source: Box::new(e),
        }
    }
}
