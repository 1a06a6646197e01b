use std::sync::{Mutex, MutexGuard};

use anyhow::{anyhow, bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{Gap, WorkSession};

use super::SessionStore;

/// Process-local store. Nothing survives a restart.
#[derive(Default)]
pub struct MemoryStore {
    sessions: Mutex<Vec<WorkSession>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of every stored session, ordered by start.
    pub fn sessions(&self) -> Vec<WorkSession> {
        self.lock().map(|guard| guard.to_vec()).unwrap_or_default()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Vec<WorkSession>>> {
        self.sessions
            .lock()
            .map_err(|_| anyhow!("memory store lock poisoned"))
    }
}

#[async_trait]
impl SessionStore for MemoryStore {
    async fn insert_session(&self, session: &WorkSession) -> Result<()> {
        let mut sessions = self.lock()?;
        if sessions.iter().any(|existing| existing.id == session.id) {
            bail!("session {} already exists", session.id);
        }
        if session.is_open() && sessions.iter().any(WorkSession::is_open) {
            bail!("another session is already open");
        }
        sessions.push(session.clone());
        sessions.sort_by_key(|s| s.start);
        Ok(())
    }

    async fn save_session(&self, session: &WorkSession) -> Result<()> {
        let mut sessions = self.lock()?;
        let stored = sessions
            .iter_mut()
            .find(|existing| existing.id == session.id)
            .ok_or_else(|| anyhow!("session {} not found", session.id))?;
        stored.start = session.start;
        stored.end = session.end;
        sessions.sort_by_key(|s| s.start);
        Ok(())
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        self.lock()?.retain(|session| session.id != session_id);
        Ok(())
    }

    async fn insert_gap(&self, gap: &Gap) -> Result<()> {
        let mut sessions = self.lock()?;
        let session = sessions
            .iter_mut()
            .find(|session| session.id == gap.session_id)
            .ok_or_else(|| anyhow!("session {} not found for gap {}", gap.session_id, gap.id))?;
        session.gaps.push(gap.clone());
        session.sort_gaps();
        Ok(())
    }

    async fn save_gap(&self, gap: &Gap) -> Result<()> {
        let mut sessions = self.lock()?;
        let session = sessions
            .iter_mut()
            .find(|session| session.id == gap.session_id)
            .ok_or_else(|| anyhow!("session {} not found for gap {}", gap.session_id, gap.id))?;
        let stored = session
            .gap_mut(&gap.id)
            .ok_or_else(|| anyhow!("gap {} not found", gap.id))?;
        *stored = gap.clone();
        session.sort_gaps();
        Ok(())
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Option<WorkSession>> {
        Ok(self
            .lock()?
            .iter()
            .find(|session| session.id == session_id)
            .cloned())
    }

    async fn fetch_open_session(&self) -> Result<Option<WorkSession>> {
        Ok(self.lock()?.iter().find(|session| session.is_open()).cloned())
    }

    async fn fetch_latest_closed_session(&self) -> Result<Option<WorkSession>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|session| session.end.is_some())
            .max_by_key(|session| session.end)
            .cloned())
    }

    async fn fetch_sessions_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WorkSession>> {
        Ok(self
            .lock()?
            .iter()
            .filter(|session| session.start < end && session.end.map_or(true, |e| e > start))
            .cloned()
            .collect())
    }

    async fn fetch_gap(&self, gap_id: &str) -> Result<Option<Gap>> {
        Ok(self
            .lock()?
            .iter()
            .find_map(|session| session.gap(gap_id).cloned()))
    }
}
