// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Protocol engine bridge.
//!
//! The wire protocol itself (handshake, encryption, framing) lives in an
//! external engine process. This crate connects to it over WebSocket and
//! exposes it through the [`Transport`](switchboard_core::Transport) trait.

pub mod frame;
pub mod transport;

pub use frame::{ClientFrame, EngineFrame, RequestResult, WireContent};
pub use transport::{BridgeHandle, BridgeTransport};
