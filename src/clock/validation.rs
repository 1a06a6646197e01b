//! Checks applied at the input boundary, before anything reaches the clock core.
//!
//! The core never repairs bad input; these functions reject it instead.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::db::models::WorkSession;

use super::events::{ManualClockAction, ManualKind};
use super::state::{ClockSnapshot, RecordEdit};

#[derive(Debug, Error, PartialEq)]
pub enum EditError {
    #[error("no active session to clock out of")]
    NoActiveSession,

    #[error("already clocked in since {0}")]
    AlreadyClockedIn(DateTime<Utc>),

    #[error("clock-out time {end} must be after clock-in time {start}")]
    ClockOutBeforeClockIn {
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    },

    #[error("gap {0} would fall outside its session")]
    GapOutsideSession(String),

    #[error("gap return time {returned} must be after exit time {exited}")]
    GapReturnBeforeExit {
        exited: DateTime<Utc>,
        returned: DateTime<Utc>,
    },

    #[error("gap {0} would overlap another gap")]
    GapsOverlap(String),

    #[error("only the latest gap of an open session may stay open")]
    GapReopen,

    #[error("an open session can only be closed by clocking out")]
    OpenSessionEnd,

    #[error("a closed session needs an end time")]
    MissingEnd,

    #[error("{0} is in the future")]
    InFuture(DateTime<Utc>),

    #[error("session would overlap session {0}")]
    SessionsOverlap(String),

    #[error("session {0} not found")]
    SessionNotFound(String),

    #[error("gap {0} not found")]
    GapNotFound(String),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("clock controller is not running")]
    Unavailable,
}

pub fn validate_manual_action(
    snapshot: &ClockSnapshot,
    action: &ManualClockAction,
) -> Result<(), EditError> {
    match action.kind {
        ManualKind::In => match &snapshot.active_session {
            Some(session) => Err(EditError::AlreadyClockedIn(session.start)),
            None => Ok(()),
        },
        ManualKind::Out => {
            let session = snapshot
                .active_session
                .as_ref()
                .ok_or(EditError::NoActiveSession)?;
            if action.timestamp <= session.start {
                return Err(EditError::ClockOutBeforeClockIn {
                    start: session.start,
                    end: action.timestamp,
                });
            }
            if let Some(gap) = session
                .gaps
                .iter()
                .find(|gap| gap.return_time.unwrap_or(gap.exit_time) > action.timestamp)
            {
                return Err(EditError::GapOutsideSession(gap.id.clone()));
            }
            Ok(())
        }
    }
}

/// Checks an edit against its own session. Times of an open session are
/// bounded by `now`.
pub fn validate_edit(
    session: &WorkSession,
    edit: &RecordEdit,
    now: DateTime<Utc>,
) -> Result<(), EditError> {
    match edit {
        RecordEdit::SessionBounds { start, end, .. } => {
            validate_session_edit(session, *start, *end, now)
        }
        RecordEdit::GapTimes {
            gap_id,
            exit_time,
            return_time,
        } => validate_gap_edit(session, gap_id, *exit_time, *return_time, now),
        RecordEdit::GapDeleted { gap_id, .. } => session
            .gap(gap_id)
            .map(|_| ())
            .ok_or_else(|| EditError::GapNotFound(gap_id.clone())),
        RecordEdit::DeleteSession { .. } => Ok(()),
    }
}

pub fn validate_session_edit(
    session: &WorkSession,
    start: DateTime<Utc>,
    end: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), EditError> {
    match (session.is_open(), end) {
        (true, Some(_)) => return Err(EditError::OpenSessionEnd),
        (false, None) => return Err(EditError::MissingEnd),
        _ => {}
    }
    if let Some(end) = end {
        if end <= start {
            return Err(EditError::ClockOutBeforeClockIn { start, end });
        }
    }
    let upper = end.unwrap_or(now);
    if start > now || upper > now {
        return Err(EditError::InFuture(start.max(upper)));
    }

    for gap in &session.gaps {
        let last_instant = gap.return_time.unwrap_or(gap.exit_time);
        let before_start = gap.exit_time < start;
        let after_end = last_instant > upper;
        if before_start || after_end {
            return Err(EditError::GapOutsideSession(gap.id.clone()));
        }
    }
    Ok(())
}

pub fn validate_gap_edit(
    session: &WorkSession,
    gap_id: &str,
    exit_time: DateTime<Utc>,
    return_time: Option<DateTime<Utc>>,
    now: DateTime<Utc>,
) -> Result<(), EditError> {
    let gap = session
        .gap(gap_id)
        .ok_or_else(|| EditError::GapNotFound(gap_id.to_string()))?;

    match return_time {
        Some(returned) if returned <= exit_time => {
            return Err(EditError::GapReturnBeforeExit {
                exited: exit_time,
                returned,
            });
        }
        None => {
            let is_latest = session.last_gap().map(|last| last.id.as_str()) == Some(gap_id);
            if !(gap.is_open() && session.is_open() && is_latest) {
                return Err(EditError::GapReopen);
            }
        }
        _ => {}
    }

    let last_instant = return_time.unwrap_or(exit_time);
    let upper = session.end.unwrap_or(now);
    if exit_time < session.start || last_instant > upper {
        return Err(EditError::GapOutsideSession(gap_id.to_string()));
    }

    let overlaps = session.gaps.iter().filter(|other| other.id != gap_id).any(|other| {
        let other_end = other.return_time;
        let starts_before_other_ends = other_end.map_or(true, |end| exit_time < end);
        let ends_after_other_starts = return_time.map_or(true, |end| end > other.exit_time);
        starts_before_other_ends && ends_after_other_starts
    });
    if overlaps {
        return Err(EditError::GapsOverlap(gap_id.to_string()));
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::state::ClockStatus;
    use crate::db::models::Gap;
    use chrono::{Duration, TimeZone};

    fn at(minute: i64) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 3, 4, 9, 0, 0).unwrap() + Duration::minutes(minute)
    }

    fn now() -> DateTime<Utc> {
        at(1000)
    }

    fn closed_gap(id: &str, exit: i64, ret: i64) -> Gap {
        let mut gap = Gap::open(id.into(), "s".into(), at(exit));
        gap.return_time = Some(at(ret));
        gap
    }

    fn snapshot_with(session: Option<WorkSession>) -> ClockSnapshot {
        ClockSnapshot {
            status: if session.is_some() {
                ClockStatus::ClockedIn
            } else {
                ClockStatus::ClockedOut
            },
            active_session: session,
            pending_exit: None,
            initial_check_done: true,
        }
    }

    #[test]
    fn clock_out_must_follow_clock_in() {
        let snapshot = snapshot_with(Some(WorkSession::open("s".into(), at(0))));

        assert_eq!(
            validate_manual_action(&snapshot, &ManualClockAction::clock_out(at(0))),
            Err(EditError::ClockOutBeforeClockIn {
                start: at(0),
                end: at(0)
            })
        );
        assert!(validate_manual_action(&snapshot, &ManualClockAction::clock_out(at(1))).is_ok());
    }

    #[test]
    fn clock_out_without_session_is_rejected() {
        let snapshot = snapshot_with(None);
        assert_eq!(
            validate_manual_action(&snapshot, &ManualClockAction::clock_out(at(5))),
            Err(EditError::NoActiveSession)
        );
        assert!(validate_manual_action(&snapshot, &ManualClockAction::clock_in(at(5))).is_ok());
    }

    #[test]
    fn clock_out_may_not_cut_through_a_gap() {
        let mut session = WorkSession::open("s".into(), at(0));
        session.gaps.push(closed_gap("g", 30, 60));
        let snapshot = snapshot_with(Some(session));

        assert_eq!(
            validate_manual_action(&snapshot, &ManualClockAction::clock_out(at(45))),
            Err(EditError::GapOutsideSession("g".into()))
        );
        assert!(validate_manual_action(&snapshot, &ManualClockAction::clock_out(at(60))).is_ok());
    }

    #[test]
    fn session_edit_keeps_gaps_inside() {
        let mut session = WorkSession::open("s".into(), at(0));
        session.end = Some(at(120));
        session.gaps.push(closed_gap("g", 30, 60));

        assert!(validate_session_edit(&session, at(10), Some(at(100)), now()).is_ok());
        assert_eq!(
            validate_session_edit(&session, at(40), Some(at(100)), now()),
            Err(EditError::GapOutsideSession("g".into()))
        );
        assert_eq!(
            validate_session_edit(&session, at(10), Some(at(50)), now()),
            Err(EditError::GapOutsideSession("g".into()))
        );
        assert!(matches!(
            validate_session_edit(&session, at(10), Some(at(10)), now()),
            Err(EditError::ClockOutBeforeClockIn { .. })
        ));
        assert_eq!(
            validate_session_edit(&session, at(10), None, now()),
            Err(EditError::MissingEnd)
        );
    }

    #[test]
    fn gap_edit_rejects_overlap_and_inversion() {
        let mut session = WorkSession::open("s".into(), at(0));
        session.end = Some(at(300));
        session.gaps.push(closed_gap("a", 30, 60));
        session.gaps.push(closed_gap("b", 90, 120));

        assert!(validate_gap_edit(&session, "b", at(60), Some(at(130)), now()).is_ok());
        assert_eq!(
            validate_gap_edit(&session, "b", at(59), Some(at(130)), now()),
            Err(EditError::GapsOverlap("b".into()))
        );
        assert!(matches!(
            validate_gap_edit(&session, "b", at(100), Some(at(95)), now()),
            Err(EditError::GapReturnBeforeExit { .. })
        ));
        assert_eq!(
            validate_gap_edit(&session, "b", at(290), Some(at(310)), now()),
            Err(EditError::GapOutsideSession("b".into()))
        );
        assert_eq!(
            validate_gap_edit(&session, "b", at(100), None, now()),
            Err(EditError::GapReopen)
        );
        assert_eq!(
            validate_gap_edit(&session, "zzz", at(100), Some(at(110)), now()),
            Err(EditError::GapNotFound("zzz".into()))
        );
    }

    #[test]
    fn open_session_times_are_bounded_by_now() {
        let mut session = WorkSession::open("s".into(), at(0));
        session.gaps.push(closed_gap("a", 30, 60));
        session.gaps.push(Gap::open("b".into(), "s".into(), at(90)));
        let now = at(120);

        assert_eq!(
            validate_gap_edit(&session, "a", at(30), Some(at(121)), now),
            Err(EditError::GapOutsideSession("a".into()))
        );
        assert!(validate_gap_edit(&session, "a", at(30), Some(at(80)), now).is_ok());
        assert_eq!(
            validate_gap_edit(&session, "b", at(130), None, now),
            Err(EditError::GapOutsideSession("b".into()))
        );
        assert_eq!(
            validate_session_edit(&session, at(130), None, now),
            Err(EditError::InFuture(at(130)))
        );
        assert!(validate_session_edit(&session, at(10), None, now).is_ok());
    }

    #[test]
    fn closed_session_may_not_end_in_the_future() {
        let mut session = WorkSession::open("s".into(), at(0));
        session.end = Some(at(60));

        assert_eq!(
            validate_session_edit(&session, at(0), Some(at(200)), at(120)),
            Err(EditError::InFuture(at(200)))
        );
    }
}
