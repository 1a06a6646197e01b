//! `SessionStore` over the SQLite worker.

mod gaps;
mod sessions;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::{
    models::{Gap, WorkSession},
    Database,
};
use crate::store::SessionStore;

#[async_trait]
impl SessionStore for Database {
    async fn insert_session(&self, session: &WorkSession) -> Result<()> {
        Database::insert_session(self, session).await
    }

    async fn save_session(&self, session: &WorkSession) -> Result<()> {
        self.update_session_bounds(session).await
    }

    async fn delete_session(&self, session_id: &str) -> Result<()> {
        Database::delete_session(self, session_id).await
    }

    async fn insert_gap(&self, gap: &Gap) -> Result<()> {
        Database::insert_gap(self, gap).await
    }

    async fn save_gap(&self, gap: &Gap) -> Result<()> {
        self.update_gap(gap).await
    }

    async fn fetch_session(&self, session_id: &str) -> Result<Option<WorkSession>> {
        self.get_session(session_id).await
    }

    async fn fetch_open_session(&self) -> Result<Option<WorkSession>> {
        self.get_open_session().await
    }

    async fn fetch_latest_closed_session(&self) -> Result<Option<WorkSession>> {
        self.get_latest_closed_session().await
    }

    async fn fetch_sessions_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WorkSession>> {
        self.list_sessions_overlapping(start, end).await
    }

    async fn fetch_gap(&self, gap_id: &str) -> Result<Option<Gap>> {
        self.get_gap(gap_id).await
    }
}
