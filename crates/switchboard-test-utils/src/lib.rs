// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Test utilities for Switchboard integration tests.
//!
//! Deterministic doubles for the external collaborators so session and
//! gateway tests run without a protocol engine or a filesystem.
//!
//! # Components
//!
//! - [`MockTransport`] / [`MockHandle`] - scriptable protocol engine
//! - [`MemoryStore`] - in-memory metadata and credential store

pub mod memory_store;
pub mod mock_transport;

pub use memory_store::MemoryStore;
pub use mock_transport::{MockHandle, MockTransport, SentMessage};

use switchboard_core::types::{InboundEvent, InboundPayload};

/// Builds an inbound text message from `jid`.
pub fn inbound_text(id: &str, jid: &str, text: &str) -> InboundEvent {
    InboundEvent {
        id: id.to_string(),
        remote_jid: jid.to_string(),
        from_me: false,
        push_name: Some("Tester".to_string()),
        payload: Some(InboundPayload::Text {
            text: text.to_string(),
        }),
    }
}
