// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Core library for the Switchboard session manager.
//!
//! This crate provides the error type, the shared domain types, and the
//! traits through which the session manager consumes its external
//! collaborators: the transport engine and the durable stores.

pub mod error;
pub mod fanout;
pub mod traits;
pub mod types;

// Re-export key items at crate root for ergonomic imports.
pub use error::SwitchboardError;
pub use fanout::EventFanout;
pub use types::{SessionId, SessionMetadata, SessionStatus};

pub use traits::{CredentialStore, MetadataStore, Transport, TransportHandle};
