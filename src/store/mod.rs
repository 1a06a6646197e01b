//! Repository interface the clock core and the reports read and write through.

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::db::models::{Gap, WorkSession};

mod memory;

pub use memory::MemoryStore;

/// Durable keyed storage for sessions and their gaps.
///
/// Sessions returned by the `fetch_*` methods carry their gaps ordered by exit time.
#[async_trait]
pub trait SessionStore: Send + Sync {
    async fn insert_session(&self, session: &WorkSession) -> Result<()>;

    /// Persists `start`/`end` only; gaps are written through the gap methods.
    async fn save_session(&self, session: &WorkSession) -> Result<()>;

    /// Removes a session together with its gaps.
    async fn delete_session(&self, session_id: &str) -> Result<()>;

    async fn insert_gap(&self, gap: &Gap) -> Result<()>;

    async fn save_gap(&self, gap: &Gap) -> Result<()>;

    async fn fetch_session(&self, session_id: &str) -> Result<Option<WorkSession>>;

    async fn fetch_open_session(&self) -> Result<Option<WorkSession>>;

    /// The closed session that ended last, if any.
    async fn fetch_latest_closed_session(&self) -> Result<Option<WorkSession>>;

    /// Sessions whose `[start, end ?? open)` span intersects `[start, end)`.
    async fn fetch_sessions_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WorkSession>>;

    async fn fetch_gap(&self, gap_id: &str) -> Result<Option<Gap>>;
}
