// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Shared fixtures for session integration tests.

#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use switchboard_config::model::WebhookConfig;
use switchboard_core::SessionId;
use switchboard_session::{SessionContext, SessionRegistry, SessionSettings, WebhookDispatcher};
use switchboard_test_utils::{MemoryStore, MockHandle, MockTransport};

pub struct Harness {
    pub registry: Arc<SessionRegistry>,
    pub transport: Arc<MockTransport>,
    pub store: Arc<MemoryStore>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_settings(SessionSettings::default())
    }

    pub fn with_settings(settings: SessionSettings) -> Self {
        let transport = Arc::new(MockTransport::new());
        let store = Arc::new(MemoryStore::new());
        let webhooks = WebhookDispatcher::new(&WebhookConfig { timeout_secs: 5 }).unwrap();
        let registry = SessionRegistry::new(SessionContext {
            settings,
            transport: transport.clone(),
            metadata: store.clone(),
            credentials: store.clone(),
            webhooks,
        });
        Self {
            registry,
            transport,
            store,
        }
    }

    pub async fn handle(&self) -> Arc<MockHandle> {
        self.transport
            .last_handle()
            .await
            .expect("transport was initialized")
    }
}

pub fn sid(raw: &str) -> SessionId {
    SessionId::parse(raw).unwrap()
}

/// Lets spawned tasks run. Under a paused clock this advances by 1ms once
/// every task is idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// Polls `check` until it holds or two seconds pass (real clock).
pub async fn eventually<F: Fn() -> bool>(check: F) -> bool {
    for _ in 0..200 {
        if check() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    check()
}
