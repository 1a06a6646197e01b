//! Serialized decision core for clocking in and out.
//!
//! `ClockState` is pure: it consumes one event at a time and returns the
//! effects (store writes, grace timer changes, notices) the controller must
//! carry out. It holds the only in-memory copy of the open session.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::db::models::{Gap, WorkSession};

use super::events::{
    ClockEvent, ClockNotice, GeofenceTransition, ManualClockAction, ManualKind, TransitionKind,
};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum ClockStatus {
    ClockedOut,
    ClockedIn,
    /// Clocked in with the grace timer armed after an exit.
    PendingExit,
    /// Clocked in with a committed, still-open gap.
    Away,
}

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PendingExit {
    /// Departure instant captured when the timer was armed.
    pub exit_time: DateTime<Utc>,
    pub generation: u64,
}

/// Either an exit still inside its grace period or a committed open gap.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase", tag = "type")]
pub enum AwayState {
    Pending { exit_time: DateTime<Utc> },
    Open { gap: Gap },
}

/// Read-only view of the clock for queries.
#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ClockSnapshot {
    pub status: ClockStatus,
    pub active_session: Option<WorkSession>,
    pub pending_exit: Option<PendingExit>,
    pub initial_check_done: bool,
}

impl ClockSnapshot {
    pub fn is_clocked_in(&self) -> bool {
        self.active_session.is_some()
    }

    pub fn open_gap(&self) -> Option<&Gap> {
        self.active_session.as_ref().and_then(WorkSession::open_gap)
    }

    pub fn pending_or_open_gap(&self) -> Option<AwayState> {
        if let Some(pending) = self.pending_exit {
            return Some(AwayState::Pending {
                exit_time: pending.exit_time,
            });
        }
        self.open_gap().map(|gap| AwayState::Open { gap: gap.clone() })
    }
}

/// A write the controller must push through to the store.
#[derive(Debug, Clone, PartialEq)]
pub enum StoreWrite {
    InsertSession(WorkSession),
    SaveSession(WorkSession),
    DeleteSession(String),
    InsertGap(Gap),
    SaveGap(Gap),
}

#[derive(Debug, Clone, PartialEq)]
pub enum Effect {
    Store(StoreWrite),
    ArmGrace { generation: u64, delay: Duration },
    CancelGrace,
    Notify(ClockNotice),
}

/// Manual corrections to already recorded data.
#[derive(Debug, Clone, PartialEq)]
pub enum RecordEdit {
    SessionBounds {
        session_id: String,
        start: DateTime<Utc>,
        end: Option<DateTime<Utc>>,
    },
    GapTimes {
        gap_id: String,
        exit_time: DateTime<Utc>,
        return_time: Option<DateTime<Utc>>,
    },
    GapDeleted {
        gap_id: String,
        deleted: bool,
    },
    DeleteSession {
        session_id: String,
    },
}

#[derive(Debug, Clone)]
pub struct ClockState {
    active: Option<WorkSession>,
    pending_exit: Option<PendingExit>,
    initial_check_done: bool,
    next_generation: u64,
    grace: Duration,
}

impl ClockState {
    pub fn new(grace: Duration, initial_check_done: bool) -> Self {
        Self {
            active: None,
            pending_exit: None,
            initial_check_done,
            next_generation: 1,
            grace,
        }
    }

    /// Rebuilds state from the store after a restart. A pending exit that was
    /// armed before the restart is not recovered.
    pub fn restore(active: Option<WorkSession>, grace: Duration, initial_check_done: bool) -> Self {
        Self {
            active: active.filter(WorkSession::is_open),
            ..Self::new(grace, initial_check_done)
        }
    }

    pub fn status(&self) -> ClockStatus {
        match &self.active {
            None => ClockStatus::ClockedOut,
            Some(_) if self.pending_exit.is_some() => ClockStatus::PendingExit,
            Some(session) if session.open_gap().is_some() => ClockStatus::Away,
            Some(_) => ClockStatus::ClockedIn,
        }
    }

    pub fn active_session(&self) -> Option<&WorkSession> {
        self.active.as_ref()
    }

    pub fn pending_exit(&self) -> Option<PendingExit> {
        self.pending_exit
    }

    pub fn initial_check_done(&self) -> bool {
        self.initial_check_done
    }

    pub fn snapshot(&self) -> ClockSnapshot {
        ClockSnapshot {
            status: self.status(),
            active_session: self.active.clone(),
            pending_exit: self.pending_exit,
            initial_check_done: self.initial_check_done,
        }
    }

    pub fn apply(&mut self, event: ClockEvent) -> Vec<Effect> {
        match event {
            ClockEvent::Geofence(transition) => self.on_geofence(transition),
            ClockEvent::Manual(action) => self.on_manual(action),
            ClockEvent::GraceElapsed { generation } => self.on_grace_elapsed(generation),
        }
    }

    fn on_geofence(&mut self, transition: GeofenceTransition) -> Vec<Effect> {
        let mut effects = Vec::new();

        // The very first zone evaluation never clocks in by itself.
        if !self.initial_check_done {
            self.initial_check_done = true;
            effects.push(Effect::Notify(ClockNotice::InitialCheckDone));
            if transition.kind == TransitionKind::Enter && self.active.is_none() {
                effects.push(Effect::Notify(ClockNotice::ConfirmClockIn {
                    at: transition.timestamp,
                }));
                return effects;
            }
        }

        match transition.kind {
            TransitionKind::Enter => self.on_enter(transition.timestamp, &mut effects),
            TransitionKind::Exit => self.on_exit(transition.timestamp, &mut effects),
        }
        effects
    }

    fn on_enter(&mut self, at: DateTime<Utc>, effects: &mut Vec<Effect>) {
        match self.status() {
            ClockStatus::ClockedOut => self.open_session(at, effects),
            ClockStatus::PendingExit => {
                if let Some(pending) = self.pending_exit.take() {
                    effects.push(Effect::CancelGrace);
                    if self.outlasted_grace(pending.exit_time, at) {
                        self.commit_closed_gap(pending.exit_time, at, effects);
                    } else {
                        effects.push(Effect::Notify(ClockNotice::ExitAbsorbed {
                            exit_time: pending.exit_time,
                            returned_at: at,
                        }));
                    }
                }
            }
            ClockStatus::Away => {
                if let Some(gap) = self.active.as_mut().and_then(WorkSession::open_gap_mut) {
                    gap.return_time = Some(at.max(gap.exit_time));
                    let closed = gap.clone();
                    effects.push(Effect::Store(StoreWrite::SaveGap(closed.clone())));
                    effects.push(Effect::Notify(ClockNotice::GapClosed { gap: closed }));
                }
            }
            ClockStatus::ClockedIn => {}
        }
    }

    /// True when a return is stamped at or after the end of the grace period,
    /// however soon it was delivered.
    fn outlasted_grace(&self, exit_time: DateTime<Utc>, returned: DateTime<Utc>) -> bool {
        let grace_ms = i64::try_from(self.grace.as_millis()).unwrap_or(i64::MAX);
        (returned - exit_time).num_milliseconds() >= grace_ms
    }

    fn commit_closed_gap(
        &mut self,
        exit_time: DateTime<Utc>,
        returned: DateTime<Utc>,
        effects: &mut Vec<Effect>,
    ) {
        let Some(session) = self.active.as_mut() else {
            return;
        };
        let mut gap = Gap::open(Uuid::new_v4().to_string(), session.id.clone(), exit_time);
        effects.push(Effect::Notify(ClockNotice::GapOpened { gap: gap.clone() }));
        gap.return_time = Some(returned);
        session.gaps.push(gap.clone());
        effects.push(Effect::Store(StoreWrite::InsertGap(gap.clone())));
        effects.push(Effect::Notify(ClockNotice::GapClosed { gap }));
    }

    fn on_exit(&mut self, at: DateTime<Utc>, effects: &mut Vec<Effect>) {
        if self.status() != ClockStatus::ClockedIn {
            return;
        }
        let Some(session) = self.active.as_ref() else {
            return;
        };

        // A new gap may not start before the session or before the previous gap ended.
        let floor = session
            .last_gap()
            .map(|gap| gap.effective_return(at))
            .unwrap_or(session.start)
            .max(session.start);
        let exit_time = at.max(floor);

        let generation = self.next_generation;
        self.next_generation += 1;
        self.pending_exit = Some(PendingExit {
            exit_time,
            generation,
        });

        effects.push(Effect::ArmGrace {
            generation,
            delay: self.grace,
        });
        effects.push(Effect::Notify(ClockNotice::ExitPending {
            exit_time,
            grace_seconds: self.grace.as_secs(),
        }));
    }

    fn on_grace_elapsed(&mut self, generation: u64) -> Vec<Effect> {
        let mut effects = Vec::new();
        let pending = match self.pending_exit {
            Some(pending) if pending.generation == generation => pending,
            _ => return effects,
        };
        let Some(session) = self.active.as_mut() else {
            self.pending_exit = None;
            return effects;
        };

        self.pending_exit = None;
        let gap = Gap::open(
            Uuid::new_v4().to_string(),
            session.id.clone(),
            pending.exit_time,
        );
        session.gaps.push(gap.clone());

        effects.push(Effect::Store(StoreWrite::InsertGap(gap.clone())));
        effects.push(Effect::Notify(ClockNotice::GapOpened { gap }));
        effects
    }

    fn on_manual(&mut self, action: ManualClockAction) -> Vec<Effect> {
        let mut effects = Vec::new();
        match action.kind {
            ManualKind::In => {
                if self.active.is_none() {
                    self.open_session(action.timestamp, &mut effects);
                }
            }
            ManualKind::Out => self.close_session(action.timestamp, &mut effects),
        }
        effects
    }

    fn open_session(&mut self, at: DateTime<Utc>, effects: &mut Vec<Effect>) {
        let session = WorkSession::open(Uuid::new_v4().to_string(), at);
        self.active = Some(session.clone());
        effects.push(Effect::Store(StoreWrite::InsertSession(session.clone())));
        effects.push(Effect::Notify(ClockNotice::ClockedIn { session }));
    }

    /// Clock-out wins over a pending exit or an open gap.
    fn close_session(&mut self, at: DateTime<Utc>, effects: &mut Vec<Effect>) {
        let Some(mut session) = self.active.take() else {
            return;
        };

        if self.pending_exit.take().is_some() {
            effects.push(Effect::CancelGrace);
        }

        if let Some(gap) = session.open_gap_mut() {
            gap.return_time = Some(at.max(gap.exit_time));
            let closed = gap.clone();
            effects.push(Effect::Store(StoreWrite::SaveGap(closed.clone())));
            effects.push(Effect::Notify(ClockNotice::GapClosed { gap: closed }));
        }

        session.end = Some(at);
        effects.push(Effect::Store(StoreWrite::SaveSession(session.clone())));
        effects.push(Effect::Notify(ClockNotice::ClockedOut { session }));
    }

    /// Mirrors an already validated edit of the open session into memory.
    pub fn edit_active(&mut self, edit: &RecordEdit) -> Vec<Effect> {
        let mut effects = Vec::new();
        let Some(session) = self.active.as_mut() else {
            return effects;
        };

        if let RecordEdit::DeleteSession { session_id } = edit {
            if *session_id != session.id {
                return effects;
            }
            self.active = None;
            if self.pending_exit.take().is_some() {
                effects.push(Effect::CancelGrace);
            }
            effects.push(Effect::Store(StoreWrite::DeleteSession(session_id.clone())));
            effects.push(Effect::Notify(ClockNotice::SessionDeleted {
                session_id: session_id.clone(),
            }));
            return effects;
        }

        let writes = apply_edit(session, edit);
        if writes.is_empty() {
            return effects;
        }
        let edited = session.clone();
        effects.extend(writes.into_iter().map(Effect::Store));
        effects.push(Effect::Notify(ClockNotice::SessionEdited { session: edited }));
        effects
    }
}

/// Applies an edit to a session record and returns the writes that persist it.
pub fn apply_edit(session: &mut WorkSession, edit: &RecordEdit) -> Vec<StoreWrite> {
    match edit {
        RecordEdit::SessionBounds {
            session_id,
            start,
            end,
        } if *session_id == session.id => {
            session.start = *start;
            session.end = *end;
            vec![StoreWrite::SaveSession(session.clone())]
        }
        RecordEdit::GapTimes {
            gap_id,
            exit_time,
            return_time,
        } => {
            let Some(gap) = session.gap_mut(gap_id) else {
                return Vec::new();
            };
            gap.exit_time = *exit_time;
            gap.return_time = *return_time;
            let saved = gap.clone();
            session.sort_gaps();
            vec![StoreWrite::SaveGap(saved)]
        }
        RecordEdit::GapDeleted { gap_id, deleted } => match session.gap_mut(gap_id) {
            Some(gap) => {
                gap.set_deleted(*deleted);
                vec![StoreWrite::SaveGap(gap.clone())]
            }
            None => Vec::new(),
        },
        RecordEdit::DeleteSession { session_id } if *session_id == session.id => {
            vec![StoreWrite::DeleteSession(session_id.clone())]
        }
        _ => Vec::new(),
    }
}
