// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Collaborator traits consumed by the session manager.
//!
//! All traits use `#[async_trait]` for dynamic dispatch compatibility.

pub mod storage;
pub mod transport;

pub use storage::{CredentialStore, MetadataStore};
pub use transport::{Transport, TransportHandle};
