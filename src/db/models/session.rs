//! Work session data model.
//!
//! A session spans one clock-in to clock-out. It owns its gaps, kept in
//! chronological order by exit time.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

use super::gap::Gap;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WorkSession {
    pub id: String,
    pub start: DateTime<Utc>,
    /// `None` while the session is still open.
    pub end: Option<DateTime<Utc>>,
    pub gaps: Vec<Gap>,
}

impl WorkSession {
    pub fn open(id: String, start: DateTime<Utc>) -> Self {
        Self {
            id,
            start,
            end: None,
            gaps: Vec::new(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.end.is_none()
    }

    /// End of the session, or `now` if it is still running.
    pub fn effective_end(&self, now: DateTime<Utc>) -> DateTime<Utc> {
        self.end.unwrap_or(now)
    }

    pub fn elapsed(&self, now: DateTime<Utc>) -> Duration {
        (self.effective_end(now) - self.start).max(Duration::zero())
    }

    /// Elapsed time minus every non-deleted gap, floored at zero.
    pub fn worked_duration(&self, now: DateTime<Utc>) -> Duration {
        let away = self
            .gaps
            .iter()
            .filter(|gap| !gap.is_deleted())
            .fold(Duration::zero(), |acc, gap| acc + gap.duration(now));
        (self.elapsed(now) - away).max(Duration::zero())
    }

    pub fn open_gap(&self) -> Option<&Gap> {
        self.gaps.iter().rev().find(|gap| gap.is_open())
    }

    pub fn open_gap_mut(&mut self) -> Option<&mut Gap> {
        self.gaps.iter_mut().rev().find(|gap| gap.is_open())
    }

    pub fn last_gap(&self) -> Option<&Gap> {
        self.gaps.last()
    }

    pub fn gap(&self, gap_id: &str) -> Option<&Gap> {
        self.gaps.iter().find(|gap| gap.id == gap_id)
    }

    pub fn gap_mut(&mut self, gap_id: &str) -> Option<&mut Gap> {
        self.gaps.iter_mut().find(|gap| gap.id == gap_id)
    }

    /// Keeps gaps ordered by exit time after an edit.
    pub fn sort_gaps(&mut self) {
        self.gaps.sort_by_key(|gap| gap.exit_time);
    }
}
