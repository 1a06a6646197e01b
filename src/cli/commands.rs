use std::sync::Arc;

use anyhow::{Context, Result};
use chrono::{DateTime, NaiveDate, Utc};
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::clock::{
    ClockController, ClockNotice, ControllerConfig, ManualClockAction, RecordEdit, SystemClock,
};
use crate::db::models::WorkSession;
use crate::report::{ms_to_hours, Calendar, ReportService};
use crate::settings::SettingsStore;
use crate::store::SessionStore;

use super::input::{
    parse_date, parse_optional_timestamp, parse_timestamp, parse_watch_line, WatchInput,
};
use super::parser::{ConfigAction, GapAction, SessionAction};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

const TIME_FORMAT: &str = "%Y-%m-%d %H:%M";

/// Everything a command needs: the store, settings and the derived calendar.
pub struct App {
    pub store: Arc<dyn SessionStore>,
    pub settings: Arc<SettingsStore>,
}

impl App {
    fn calendar(&self) -> Calendar {
        self.settings.calendar()
    }

    fn reports(&self) -> ReportService {
        ReportService::new(self.store.clone(), Arc::new(SystemClock), self.calendar())
    }

    fn controller_config(&self) -> ControllerConfig {
        ControllerConfig {
            grace: self.settings.grace(),
            initial_check_done: self.settings.initial_check_done(),
        }
    }

    async fn controller(&self) -> Result<ClockController> {
        let (controller, _notices) =
            ClockController::spawn(self.store.clone(), self.controller_config()).await?;
        Ok(controller)
    }

    fn fmt_time(&self, instant: DateTime<Utc>) -> String {
        self.calendar().to_local_string(instant, TIME_FORMAT)
    }

    fn date_or_today(&self, date: Option<&str>) -> Result<NaiveDate> {
        match date {
            Some(value) => parse_date(value),
            None => Ok(self.calendar().date_of(Utc::now())),
        }
    }
}

pub async fn handle_status(app: &App) -> Result<()> {
    let controller = app.controller().await?;
    let snapshot = controller.snapshot().await?;
    controller.shutdown().await?;

    match &snapshot.active_session {
        Some(session) => println!(
            "Clocked in since {} (session {})",
            app.fmt_time(session.start),
            session.id
        ),
        None => println!("Clocked out"),
    }
    if let Some(gap) = snapshot.open_gap() {
        println!("Away since {} (gap {})", app.fmt_time(gap.exit_time), gap.id);
    }

    let reports = app.reports();
    let today = reports.today();
    println!("Today: {:.2} h", reports.hours_for_date(today).await?);
    Ok(())
}

pub async fn handle_manual(app: &App, clock_in: bool, at: Option<&str>) -> Result<()> {
    let calendar = app.calendar();
    let timestamp = parse_optional_timestamp(at, &calendar, Utc::now())?;
    let action = if clock_in {
        ManualClockAction::clock_in(timestamp)
    } else {
        ManualClockAction::clock_out(timestamp)
    };

    let controller = app.controller().await?;
    let result = controller.manual(action).await;
    controller.shutdown().await?;
    result?;

    let verb = if clock_in { "Clocked in" } else { "Clocked out" };
    println!("{verb} at {}", app.fmt_time(timestamp));
    Ok(())
}

/// Streams stdin lines into the controller in order and prints each notice as JSON.
pub async fn handle_watch(app: &App) -> Result<()> {
    let calendar = app.calendar();
    let (controller, mut notices) =
        ClockController::spawn(app.store.clone(), app.controller_config()).await?;

    let settings = app.settings.clone();
    let printer = tokio::spawn(async move {
        while let Some(notice) = notices.recv().await {
            if matches!(notice, ClockNotice::InitialCheckDone) {
                if let Err(err) = settings.mark_initial_check_done() {
                    log_warn!("Failed to persist first evaluation flag: {err:#}");
                }
            }
            match serde_json::to_string(&notice) {
                Ok(line) => println!("{line}"),
                Err(err) => log_warn!("Failed to serialize notice: {err}"),
            }
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    while let Some(line) = lines.next_line().await.context("failed to read stdin")? {
        let input = match parse_watch_line(&line, &calendar, Utc::now()) {
            Ok(Some(input)) => input,
            Ok(None) => continue,
            Err(err) => {
                eprintln!("Error: {err:#}");
                continue;
            }
        };
        log_debug!("Watch input {input:?}");

        match input {
            WatchInput::Geofence(transition) => controller.geofence(transition).await?,
            WatchInput::Manual(action) => {
                if let Err(err) = controller.manual(action).await {
                    eprintln!("Error: {err}");
                }
            }
        }
    }

    if let Some(pending) = controller.snapshot().await?.pending_exit {
        log_warn!(
            "Input ended during the grace period of exit at {}; no gap recorded",
            pending.exit_time
        );
    }
    controller.shutdown().await?;
    drop(controller);
    printer.await.context("notice printer task failed")?;
    Ok(())
}

pub async fn handle_day(app: &App, date: Option<&str>) -> Result<()> {
    let date = app.date_or_today(date)?;
    let hours = app.reports().hours_for_date(date).await?;
    println!("{date}: {hours:.2} h");
    Ok(())
}

pub async fn handle_week(app: &App, date: Option<&str>, message: bool) -> Result<()> {
    let date = app.date_or_today(date)?;
    let reports = app.reports();

    if message {
        println!("{}", reports.weekly_text_message(date).await?);
        return Ok(());
    }

    let summary = reports.weekly_summary(date).await?;
    println!("Week of {}", summary.week_start);
    for day in &summary.daily_breakdown {
        println!("  {} {}  {:>6.2}", day.label, day.date, day.hours);
    }
    println!("  Total           {:>6.2}", summary.total_hours);
    Ok(())
}

pub async fn handle_sessions(app: &App, date: Option<&str>) -> Result<()> {
    let date = app.date_or_today(date)?;
    let reports = app.reports();
    let sessions = reports.sessions_for_date(date).await?;
    if sessions.is_empty() {
        println!("No sessions on {date}");
        return Ok(());
    }

    let now = reports.now();
    for session in &sessions {
        print_session(app, session, now);
    }
    Ok(())
}

fn print_session(app: &App, session: &WorkSession, now: DateTime<Utc>) {
    let end = session
        .end
        .map(|end| app.fmt_time(end))
        .unwrap_or_else(|| "open".to_string());
    let worked = ms_to_hours(session.worked_duration(now).num_milliseconds());
    println!(
        "{}  {} -> {}  {:.2} h",
        session.id,
        app.fmt_time(session.start),
        end,
        worked
    );

    for gap in &session.gaps {
        let returned = gap
            .return_time
            .map(|at| app.fmt_time(at))
            .unwrap_or_else(|| "open".to_string());
        let marker = if gap.is_deleted() { " [deleted]" } else { "" };
        println!(
            "    gap {}  {} -> {}{}",
            gap.id,
            app.fmt_time(gap.exit_time),
            returned,
            marker
        );
    }
}

pub async fn handle_gap(app: &App, action: GapAction) -> Result<()> {
    let calendar = app.calendar();
    let (edit, done) = match action {
        GapAction::Delete { id } => (
            RecordEdit::GapDeleted {
                gap_id: id.clone(),
                deleted: true,
            },
            format!("Gap {id} deleted"),
        ),
        GapAction::Restore { id } => (
            RecordEdit::GapDeleted {
                gap_id: id.clone(),
                deleted: false,
            },
            format!("Gap {id} restored"),
        ),
        GapAction::Edit {
            id,
            exit_time,
            return_time,
        } => (
            RecordEdit::GapTimes {
                gap_id: id.clone(),
                exit_time: parse_timestamp(&exit_time, &calendar)?,
                return_time: return_time
                    .as_deref()
                    .map(|value| parse_timestamp(value, &calendar))
                    .transpose()?,
            },
            format!("Gap {id} updated"),
        ),
    };

    apply_edit(app, edit).await?;
    println!("{done}");
    Ok(())
}

pub async fn handle_session(app: &App, action: SessionAction) -> Result<()> {
    let calendar = app.calendar();
    let (edit, done) = match action {
        SessionAction::Edit { id, start, end } => (
            RecordEdit::SessionBounds {
                session_id: id.clone(),
                start: parse_timestamp(&start, &calendar)?,
                end: end
                    .as_deref()
                    .map(|value| parse_timestamp(value, &calendar))
                    .transpose()?,
            },
            format!("Session {id} updated"),
        ),
        SessionAction::Delete { id } => (
            RecordEdit::DeleteSession {
                session_id: id.clone(),
            },
            format!("Session {id} deleted"),
        ),
    };

    apply_edit(app, edit).await?;
    println!("{done}");
    Ok(())
}

async fn apply_edit(app: &App, edit: RecordEdit) -> Result<()> {
    let controller = app.controller().await?;
    let result = controller.edit(edit).await;
    controller.shutdown().await?;
    Ok(result?)
}

pub fn handle_config(settings: &SettingsStore, action: ConfigAction) -> Result<()> {
    match action {
        ConfigAction::Show => {
            let current = settings.current();
            println!("Settings file: {}", settings.path().display());
            println!("{}", serde_json::to_string_pretty(&current)?);
        }
        ConfigAction::Grace { seconds } => {
            let stored = settings.set_grace_seconds(seconds)?;
            println!("Grace period set to {stored} seconds");
        }
        ConfigAction::Timezone { timezone } => {
            let calendar: Calendar = timezone.parse()?;
            settings.set_timezone(calendar)?;
            println!("Timezone set to {calendar}");
        }
    }
    Ok(())
}

