// SPDX-FileCopyrightText: 2026 Switchboard Contributors
// SPDX-License-Identifier: MIT OR Apache-2.0

//! Directory-per-session store.
//!
//! Layout under the configured root:
//!
//! ```text
//! <root>/<session_id>/metadata.json
//! <root>/<session_id>/creds.json
//! ```

use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use async_trait::async_trait;
use tracing::{debug, warn};

use switchboard_config::model::StorageConfig;
use switchboard_core::types::Credentials;
use switchboard_core::{
    CredentialStore, MetadataStore, SessionId, SessionMetadata, SwitchboardError,
};

const METADATA_FILE: &str = "metadata.json";
const CREDENTIALS_FILE: &str = "creds.json";

/// Filesystem store implementing both [`MetadataStore`] and [`CredentialStore`].
#[derive(Debug, Clone)]
pub struct FsStore {
    root: PathBuf,
}

impl FsStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Creates the root directory if needed and returns the store.
    pub async fn open(config: &StorageConfig) -> Result<Self, SwitchboardError> {
        let store = Self::new(&config.sessions_dir);
        tokio::fs::create_dir_all(&store.root).await?;
        debug!(root = %store.root.display(), "session store opened");
        Ok(store)
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory holding everything persisted for `session_id`.
    pub fn session_dir(&self, session_id: &SessionId) -> PathBuf {
        self.root.join(session_id.as_str())
    }

    async fn write_json(&self, path: PathBuf, bytes: Vec<u8>) -> Result<(), SwitchboardError> {
        if let Some(parent) = path.parent() {
            tokio::fs::create_dir_all(parent).await?;
        }
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, bytes).await?;
        tokio::fs::rename(&tmp, &path).await?;
        Ok(())
    }

    async fn read_metadata(path: &Path) -> Result<Option<SessionMetadata>, SwitchboardError> {
        match tokio::fs::read(path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl MetadataStore for FsStore {
    async fn put(&self, metadata: &SessionMetadata) -> Result<(), SwitchboardError> {
        let path = self.session_dir(&metadata.session_id).join(METADATA_FILE);
        let bytes = serde_json::to_vec_pretty(metadata)?;
        self.write_json(path, bytes).await?;
        debug!(session_id = %metadata.session_id, "metadata saved");
        Ok(())
    }

    async fn list(&self) -> Result<Vec<SessionMetadata>, SwitchboardError> {
        let mut entries = match tokio::fs::read_dir(&self.root).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let mut records = Vec::new();
        while let Some(entry) = entries.next_entry().await? {
            if !entry.file_type().await?.is_dir() {
                continue;
            }
            let path = entry.path().join(METADATA_FILE);
            match Self::read_metadata(&path).await {
                Ok(Some(record)) => records.push(record),
                Ok(None) => {}
                Err(e) => warn!(path = %path.display(), error = %e, "skipping unreadable metadata"),
            }
        }
        records.sort_by(|a, b| a.created_at.cmp(&b.created_at));
        Ok(records)
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), SwitchboardError> {
        match tokio::fs::remove_dir_all(self.session_dir(session_id)).await {
            Ok(()) => {
                debug!(%session_id, "session directory removed");
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[async_trait]
impl CredentialStore for FsStore {
    async fn load(&self, session_id: &SessionId) -> Result<Option<Credentials>, SwitchboardError> {
        let path = self.session_dir(session_id).join(CREDENTIALS_FILE);
        match tokio::fs::read(&path).await {
            Ok(bytes) => Ok(Some(serde_json::from_slice(&bytes)?)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn save(
        &self,
        session_id: &SessionId,
        credentials: &Credentials,
    ) -> Result<(), SwitchboardError> {
        let path = self.session_dir(session_id).join(CREDENTIALS_FILE);
        self.write_json(path, serde_json::to_vec(credentials)?).await
    }

    async fn delete(&self, session_id: &SessionId) -> Result<(), SwitchboardError> {
        let path = self.session_dir(session_id).join(CREDENTIALS_FILE);
        match tokio::fs::remove_file(&path).await {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(raw: &str) -> SessionId {
        SessionId::parse(raw).unwrap()
    }

    #[tokio::test]
    async fn metadata_lands_in_session_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let meta = SessionMetadata::new(id("shop1"), Some("https://hook".into()));

        store.put(&meta).await.unwrap();

        let raw = std::fs::read_to_string(dir.path().join("shop1/metadata.json")).unwrap();
        let json: serde_json::Value = serde_json::from_str(&raw).unwrap();
        assert_eq!(json["sessionId"], "shop1");
        assert_eq!(json["webhookUrl"], "https://hook");
        assert!(json["createdAt"].is_string());
    }

    #[tokio::test]
    async fn put_overwrites_previous_record() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        store.put(&SessionMetadata::new(id("a"), None)).await.unwrap();
        store
            .put(&SessionMetadata::new(id("a"), Some("https://new".into())))
            .await
            .unwrap();

        let records = MetadataStore::list(&store).await.unwrap();
        assert_eq!(records.len(), 1);
        assert_eq!(records[0].webhook_url.as_deref(), Some("https://new"));
    }

    #[tokio::test]
    async fn list_on_missing_root_is_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path().join("absent"));
        assert!(MetadataStore::list(&store).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn credentials_round_trip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let sid = id("shop1");
        let creds = Credentials(serde_json::json!({"noiseKey": "abc"}));

        assert!(store.load(&sid).await.unwrap().is_none());
        store.save(&sid, &creds).await.unwrap();
        assert_eq!(store.load(&sid).await.unwrap(), Some(creds));

        CredentialStore::delete(&store, &sid).await.unwrap();
        assert!(store.load(&sid).await.unwrap().is_none());
        CredentialStore::delete(&store, &sid).await.unwrap();
    }

    #[tokio::test]
    async fn metadata_delete_removes_directory() {
        let dir = tempfile::tempdir().unwrap();
        let store = FsStore::new(dir.path());
        let sid = id("gone");
        store.put(&SessionMetadata::new(sid.clone(), None)).await.unwrap();
        store
            .save(&sid, &Credentials(serde_json::json!({})))
            .await
            .unwrap();

        MetadataStore::delete(&store, &sid).await.unwrap();
        assert!(!dir.path().join("gone").exists());
        MetadataStore::delete(&store, &sid).await.unwrap();
    }
}
