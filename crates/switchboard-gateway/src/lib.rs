// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! HTTP surface over the [`SessionRegistry`](switchboard_session::SessionRegistry).
//!
//! Errors from the session layer map onto status codes in one place,
//! [`handlers::ApiError`].

pub mod auth;
pub mod handlers;
pub mod server;

pub use auth::AuthConfig;
pub use server::{GatewayState, router, serve};
