// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! In-memory metadata and credential store.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::Mutex;

use switchboard_core::types::Credentials;
use switchboard_core::{
    CredentialStore, MetadataStore, SessionId, SessionMetadata, SwitchboardError,
};

/// Map-backed store implementing both storage traits.
#[derive(Default)]
pub struct MemoryStore {
    metadata: Mutex<HashMap<SessionId, SessionMetadata>>,
    credentials: Mutex<HashMap<SessionId, Credentials>>,
    fail_puts: AtomicBool,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every subsequent metadata `put` fail.
    pub fn fail_puts(&self, fail: bool) {
        self.fail_puts.store(fail, Ordering::SeqCst);
    }

    pub async fn metadata_for(&self, session_id: &SessionId) -> Option<SessionMetadata> {
        self.metadata.lock().await.get(session_id).cloned()
    }

    pub async fn credentials_for(&self, session_id: &SessionId) -> Option<Credentials> {
        self.credentials.lock().await.get(session_id).cloned()
    }

    pub async fn metadata_count(&self) -> usize {
        self.metadata.lock().await.len()
    }
}

#[async_trait]
impl MetadataStore for MemoryStore {
    async fn put(&self, metadata: &SessionMetadata) -> Result<(), SwitchboardError> {
        if self.fail_puts.load(Ordering::SeqCst) {
            return Err(SwitchboardError::Storage {
                source: "memory store rejecting writes".into(),
            });
        }
        self.metadata
            .lock()
            .await
            .insert(metadata.session_id.clone(), metadata.clone());
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionMetadata>, SwitchboardError> {
        let mut records: Vec<_> = self.metadata.lock().await.values().cloned().collect();
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), SwitchboardError> {
        self.metadata.lock().await.remove(session_id);
        Ok(())
    }
}

#[async_trait]
impl CredentialStore for MemoryStore {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Credentials>, SwitchboardError> {
        Ok(self.credentials.lock().await.get(session_id).cloned())
    }

    async fn save(
        &self,
        session_id: &SessionId,
        credentials: &Credentials,
    ) -> Result<(), SwitchboardError> {
        self.credentials
            .lock()
            .await
            .insert(session_id.clone(), credentials.clone());
        Ok(())
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), SwitchboardError> {
        self.credentials.lock().await.remove(session_id);
        Ok(())
    }
}
