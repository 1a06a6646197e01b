//! Inputs consumed by the clock core and notices it emits.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::db::models::{Gap, WorkSession};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum TransitionKind {
    Enter,
    Exit,
}

/// Zone boundary crossing reported by the location monitor.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct GeofenceTransition {
    pub kind: TransitionKind,
    pub timestamp: DateTime<Utc>,
}

impl GeofenceTransition {
    pub fn enter(timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: TransitionKind::Enter,
            timestamp,
        }
    }

    pub fn exit(timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: TransitionKind::Exit,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ManualKind {
    In,
    Out,
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct ManualClockAction {
    pub kind: ManualKind,
    pub timestamp: DateTime<Utc>,
}

impl ManualClockAction {
    pub fn clock_in(timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: ManualKind::In,
            timestamp,
        }
    }

    pub fn clock_out(timestamp: DateTime<Utc>) -> Self {
        Self {
            kind: ManualKind::Out,
            timestamp,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClockEvent {
    Geofence(GeofenceTransition),
    Manual(ManualClockAction),
    /// Grace timer expiry, tagged with the generation it was armed under.
    GraceElapsed { generation: u64 },
}

/// Emitted after each committed transition.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum ClockNotice {
    /// First zone evaluation found the user inside; ask before clocking in.
    ConfirmClockIn { at: DateTime<Utc> },
    /// The one-shot first-evaluation flag has been consumed.
    InitialCheckDone,
    ClockedIn { session: WorkSession },
    ExitPending { exit_time: DateTime<Utc>, grace_seconds: u64 },
    /// Returned before the grace period ran out; no gap recorded.
    ExitAbsorbed { exit_time: DateTime<Utc>, returned_at: DateTime<Utc> },
    GapOpened { gap: Gap },
    GapClosed { gap: Gap },
    ClockedOut { session: WorkSession },
    SessionEdited { session: WorkSession },
    SessionDeleted { session_id: String },
}
