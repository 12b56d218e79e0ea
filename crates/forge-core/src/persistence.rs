//! Persistence contract and reference stores
//!
//! The orchestrator hands a [`SessionSnapshot`] to a [`SessionStore`] once
//! the session is finalized. A failed save never touches in-memory state;
//! the snapshot is returned to the caller for retry or manual export.

use crate::error::PersistenceError;
use crate::generation::Tier;
use crate::types::{InsightLogEntry, ReasoningStep, Session, SessionId, Task};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use forge_content::ParseOutcome;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Final state of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskRecord {
    /// Task state
    pub task: Task,
    /// Normalized content (empty if none was produced)
    pub clean_content: String,
    /// Revealed prefix at finalization
    pub revealed: String,
    /// Tier that supplied the content
    pub tier: Option<Tier>,
    /// Structured artifacts parsed from the clean content
    pub artifacts: Option<ParseOutcome>,
}

/// Everything the persistence collaborator receives
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SessionSnapshot {
    /// Session state (variant, timestamps, status, progress)
    pub session: Session,
    /// Tasks in ordinal order
    pub tasks: Vec<TaskRecord>,
    /// Reasoning steps
    pub reasoning: Vec<ReasoningStep>,
    /// Insight log
    pub insights: Vec<InsightLogEntry>,
    /// When the snapshot was taken
    pub taken_at: DateTime<Utc>,
}

impl SessionSnapshot {
    /// Session ID
    #[inline]
    #[must_use]
    pub fn id(&self) -> SessionId {
        self.session.id
    }
}

/// Persistence collaborator
#[async_trait]
pub trait SessionStore: Send + Sync {
    /// Save a finalized session
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError>;
}

/// In-memory store keyed by session ID
#[derive(Debug, Default)]
pub struct MemoryStore {
    snapshots: Mutex<HashMap<SessionId, SessionSnapshot>>,
}

impl MemoryStore {
    /// Create empty store
    #[inline]
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Saved snapshot for a session
    #[must_use]
    pub fn get(&self, id: SessionId) -> Option<SessionSnapshot> {
        self.snapshots.lock().get(&id).cloned()
    }

    /// Number of saved sessions
    #[must_use]
    pub fn len(&self) -> usize {
        self.snapshots.lock().len()
    }

    /// Whether nothing was saved
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.snapshots.lock().is_empty()
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        self.snapshots.lock().insert(snapshot.id(), snapshot.clone());
        Ok(())
    }
}

/// Store writing `<dir>/<session_id>.json`
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    dir: PathBuf,
}

impl JsonFileStore {
    /// Create store rooted at `dir` (created on first save)
    #[must_use]
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    /// Root directory
    #[inline]
    #[must_use]
    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Path a session is written to
    #[must_use]
    pub fn path_for(&self, id: SessionId) -> PathBuf {
        self.dir.join(format!("{id}.json"))
    }

    /// Read a saved session back
    pub async fn load(&self, id: SessionId) -> Result<SessionSnapshot, PersistenceError> {
        let bytes = tokio::fs::read(self.path_for(id)).await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl SessionStore for JsonFileStore {
    async fn save(&self, snapshot: &SessionSnapshot) -> Result<(), PersistenceError> {
        let json = serde_json::to_vec_pretty(snapshot)?;
        tokio::fs::create_dir_all(&self.dir).await?;

        let path = self.path_for(snapshot.id());
        let tmp = path.with_extension("json.tmp");
        tokio::fs::write(&tmp, json).await?;
        tokio::fs::rename(&tmp, &path).await?;

        tracing::debug!(path = %path.display(), "session saved");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use forge_content::ContentVariant;

    fn snapshot() -> SessionSnapshot {
        SessionSnapshot {
            session: Session::new("inventory tracker", ContentVariant::Document),
            tasks: Vec::new(),
            reasoning: Vec::new(),
            insights: Vec::new(),
            taken_at: Utc::now(),
        }
    }

    #[tokio::test]
    async fn memory_store_keeps_latest_snapshot() {
        let store = MemoryStore::new();
        assert!(store.is_empty());

        let mut snap = snapshot();
        store.save(&snap).await.unwrap();
        snap.session.progress = 100.0;
        store.save(&snap).await.unwrap();

        assert_eq!(store.len(), 1);
        assert_eq!(store.get(snap.id()).unwrap().session.progress, 100.0);
    }

    #[tokio::test]
    async fn json_store_round_trips_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path().join("sessions"));
        let snap = snapshot();

        store.save(&snap).await.unwrap();

        assert!(store.path_for(snap.id()).exists());
        assert_eq!(store.load(snap.id()).await.unwrap(), snap);
    }

    #[tokio::test]
    async fn json_store_reports_missing_session() {
        let dir = tempfile::tempdir().unwrap();
        let store = JsonFileStore::new(dir.path());
        let err = store.load(SessionId::new()).await.unwrap_err();
        assert!(matches!(err, PersistenceError::Io(_)));
    }
}
