//! Gap data model: a committed departure inside a work session.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Whether a gap is subtracted from worked time. Deleting never drops the record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "camelCase")]
pub enum GapStatus {
    #[default]
    Active,
    Deleted,
}

impl GapStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            GapStatus::Active => "Active",
            GapStatus::Deleted => "Deleted",
        }
    }

    pub fn from_deleted(deleted: bool) -> Self {
        if deleted {
            GapStatus::Deleted
        } else {
            GapStatus::Active
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Gap {
    pub id: String,
    /// Owning session (non-owning back-reference).
    pub session_id: String,
    pub exit_time: DateTime<Utc>,
    /// `None` while still away.
    pub return_time: Option<DateTime<Utc>>,
    pub status: GapStatus,
}

impl Gap {
    pub fn open(id: String, session_id: String, exit_time: DateTime<Utc>) -> Self {
        Self {
            id,
            session_id,
            exit_time,
            return_time: None,
            status: GapStatus::Active,
        }
    }

    pub fn is_open(&self) -> bool {
        self.return_time.is_none()
    }

    pub fn is_deleted(&self) -> bool {
        self.status == GapStatus::Deleted
    }

    pub fn set_deleted(&mut self, deleted: bool) {
        self.status = GapStatus::from_deleted(deleted);
    }

    pub fn effective_return(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.return_time.unwrap_or(now)
    }

    pub fn duration(&self, now: DateTime<Utc>) -> Duration {
        (self.effective_return(now) - self.exit_time).max(Duration::zero())
    }
}
