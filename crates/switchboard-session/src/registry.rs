// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Process-wide map of session id to [`Session`].
//!
//! Only the registry inserts (during `start`); only a session removes its own
//! entry (during logout cleanup).

use std::sync::{Arc, Weak};

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use tracing::{debug, error, info, warn};

use switchboard_core::{SessionId, SessionMetadata, SwitchboardError};

use crate::session::{Session, SessionContext, SessionSnapshot};

/// Summary of a startup restore pass.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct RestoreReport {
    pub restored: Vec<SessionId>,
    pub failed: Vec<(SessionId, String)>,
}

enum Admission {
    Existing(Arc<Session>),
    Created(Arc<Session>),
}

/// Owner of every live [`Session`].
pub struct SessionRegistry {
    sessions: DashMap<SessionId, Arc<Session>>,
    ctx: Arc<SessionContext>,
    this: Weak<SessionRegistry>,
}

impl SessionRegistry {
    pub fn new(ctx: SessionContext) -> Arc<Self> {
        let ctx = Arc::new(ctx);
        Arc::new_cyclic(|this| Self {
            sessions: DashMap::new(),
            ctx,
            this: this.clone(),
        })
    }

    /// Creates, reuses, or revives the session `id`.
    ///
    /// A healthy existing session is returned unchanged and `webhook_url` is
    /// ignored. A session stuck in `error` or `max_retries_reached` is reset
    /// and reinitialized in place. A new session has its metadata persisted
    /// before the transport is initialized.
    pub async fn start(
        &self,
        id: SessionId,
        webhook_url: Option<String>,
    ) -> Result<Arc<Session>, SwitchboardError> {
        let metadata = SessionMetadata::new(id, webhook_url);
        self.admit(metadata, true).await
    }

    async fn admit(
        &self,
        metadata: SessionMetadata,
        persist: bool,
    ) -> Result<Arc<Session>, SwitchboardError> {
        let admission = match self.sessions.entry(metadata.session_id.clone()) {
            Entry::Occupied(entry) => Admission::Existing(entry.get().clone()),
            Entry::Vacant(entry) => {
                let session = Session::new(
                    metadata.session_id.clone(),
                    metadata.webhook_url.clone(),
                    metadata.created_at,
                    self.ctx.clone(),
                    self.this.clone(),
                );
                entry.insert(session.clone());
                Admission::Created(session)
            }
        };

        match admission {
            Admission::Existing(session) => {
                let status = session.status();
                if status.is_healthy() {
                    debug!(session_id = %session.id(), %status, "session already running");
                } else {
                    info!(session_id = %session.id(), %status, "reviving session");
                    session.restart().await;
                }
                Ok(session)
            }
            Admission::Created(session) => {
                if persist {
                    if let Err(e) = self.ctx.metadata.put(&metadata).await {
                        error!(session_id = %metadata.session_id, error = %e, "failed to persist session metadata");
                        self.remove_entry(&session);
                        return Err(e);
                    }
                }
                info!(session_id = %metadata.session_id, "session created");
                session.init().await;
                Ok(session)
            }
        }
    }

    /// Looks up a live session.
    pub fn get(&self, id: &SessionId) -> Option<Arc<Session>> {
        self.sessions.get(id).map(|entry| entry.value().clone())
    }

    /// Requests logout of `id`. Returns whether the session existed.
    pub async fn end(&self, id: &SessionId) -> Result<bool, SwitchboardError> {
        let Some(session) = self.get(id) else {
            return Ok(false);
        };
        session.terminate().await?;
        Ok(true)
    }

    /// Starts every session with persisted metadata.
    pub async fn restore_all(&self) -> Result<RestoreReport, SwitchboardError> {
        let records = self.ctx.metadata.list().await?;
        info!(count = records.len(), "restoring sessions");

        let mut report = RestoreReport::default();
        for record in records {
            let id = record.session_id.clone();
            match self.admit(record, false).await {
                Ok(_) => report.restored.push(id),
                Err(e) => {
                    warn!(session_id = %id, error = %e, "session restore failed");
                    report.failed.push((id, e.to_string()));
                }
            }
        }
        Ok(report)
    }

    /// Snapshots of every live session, ordered by id.
    pub fn list(&self) -> Vec<SessionSnapshot> {
        let mut snapshots: Vec<_> = self
            .sessions
            .iter()
            .map(|entry| entry.value().snapshot())
            .collect();
        snapshots.sort_by(|a, b| a.session_id.as_str().cmp(b.session_id.as_str()));
        snapshots
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Stops every session without deleting persisted state.
    pub async fn shutdown(&self) {
        let sessions: Vec<Arc<Session>> = self
            .sessions
            .iter()
            .map(|entry| entry.value().clone())
            .collect();
        info!(count = sessions.len(), "shutting down sessions");
        for session in sessions {
            session.shutdown().await;
        }
    }

    /// Removes `session`'s entry if it is still the registered instance.
    pub(crate) fn remove_entry(&self, session: &Arc<Session>) {
        let removed = self
            .sessions
            .remove_if(session.id(), |_, current| Arc::ptr_eq(current, session))
            .is_some();
        if removed {
            debug!(session_id = %session.id(), "session removed from registry");
        }
    }
}
