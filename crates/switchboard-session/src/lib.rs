// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Session lifecycle manager.
//!
//! - [`SessionRegistry`] creates, restores, and ends sessions.
//! - [`Session`] drives one connection's state machine from transport events.
//! - [`OutboundQueue`] buffers sends until the connection is open.
//! - [`WebhookDispatcher`] forwards inbound messages to an HTTP endpoint.
//! - [`BackoffPolicy`] and [`RateLimiter`] bound reconnects and sends.

pub mod backoff;
pub mod queue;
pub mod rate_limit;
pub mod registry;
pub mod session;
pub mod webhook;

pub use backoff::BackoffPolicy;
pub use queue::{DrainOutcome, JobDispatcher, OutboundJob, OutboundQueue};
pub use rate_limit::{RateLimitStatus, RateLimiter};
pub use registry::{RestoreReport, SessionRegistry};
pub use session::{SendOutcome, Session, SessionContext, SessionSettings, SessionSnapshot};
pub use webhook::{WebhookDispatcher, WebhookPayload};
