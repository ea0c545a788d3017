// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Durable key-value contracts for session metadata and transport credentials.

use async_trait::async_trait;

use crate::error::SwitchboardError;
use crate::types::{Credentials, SessionId, SessionMetadata};

/// Durable store of one [`SessionMetadata`] record per session.
#[async_trait]
pub trait MetadataStore: Send + Sync + 'static {
    /// Writes the record, replacing any previous one for the same session.
    async fn put(&self, metadata: &SessionMetadata) -> Result<(), SwitchboardError>;

    /// Returns every readable record. Unreadable records are skipped.
    async fn list(&self) -> Result<Vec<SessionMetadata>, SwitchboardError>;

    /// Removes the record. Removing a missing record is not an error.
    async fn delete(&self, session_id: &SessionId) -> Result<(), SwitchboardError>;
}

/// Durable store of transport credential material.
#[async_trait]
pub trait CredentialStore: Send + Sync + 'static {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Credentials>, SwitchboardError>;

    async fn save(
        &self,
        session_id: &SessionId,
        credentials: &Credentials,
    ) -> Result<(), SwitchboardError>;

    /// Deletes all credential material for the session.
    async fn delete(&self, session_id: &SessionId) -> Result<(), SwitchboardError>;
}
