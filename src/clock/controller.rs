use std::{collections::VecDeque, sync::Arc, time::Duration};

use anyhow::{anyhow, Context, Result};
use chrono::{DateTime, Utc};
use tokio::sync::{mpsc, oneshot};

use crate::store::SessionStore;

use super::{
    events::{ClockEvent, ClockNotice, GeofenceTransition, ManualClockAction, ManualKind},
    grace::GraceTimer,
    source::{Clock, SystemClock},
    state::{apply_edit, ClockSnapshot, ClockState, Effect, RecordEdit, StoreWrite},
    validation::{validate_edit, validate_manual_action, EditError},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

const COMMAND_BUFFER: usize = 64;

#[derive(Debug, Clone, Copy)]
pub struct ControllerConfig {
    pub grace: Duration,
    pub initial_check_done: bool,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            grace: Duration::from_secs(300),
            initial_check_done: false,
        }
    }
}

pub type NoticeReceiver = mpsc::UnboundedReceiver<ClockNotice>;

enum Command {
    Event(ClockEvent),
    Manual {
        action: ManualClockAction,
        reply: oneshot::Sender<Result<(), EditError>>,
    },
    Edit {
        edit: RecordEdit,
        reply: oneshot::Sender<Result<(), EditError>>,
    },
    Snapshot(oneshot::Sender<ClockSnapshot>),
    Shutdown(oneshot::Sender<()>),
}

/// Handle to the clock worker. Every event, timer expiry and edit is
/// processed one at a time, in arrival order, by a single task.
#[derive(Clone)]
pub struct ClockController {
    sender: mpsc::Sender<Command>,
}

impl ClockController {
    /// Restores any open session from `store` and starts the worker task.
    pub async fn spawn(
        store: Arc<dyn SessionStore>,
        config: ControllerConfig,
    ) -> Result<(Self, NoticeReceiver)> {
        Self::spawn_with_clock(store, config, Arc::new(SystemClock)).await
    }

    /// Like [`ClockController::spawn`], reading "now" for edit checks from `clock`.
    pub async fn spawn_with_clock(
        store: Arc<dyn SessionStore>,
        config: ControllerConfig,
        clock: Arc<dyn Clock>,
    ) -> Result<(Self, NoticeReceiver)> {
        let active = store
            .fetch_open_session()
            .await
            .context("failed to restore open session")?;
        if let Some(session) = &active {
            log_info!(
                "Restored open session {} started at {} ({} gaps)",
                session.id,
                session.start,
                session.gaps.len()
            );
        }

        let state = ClockState::restore(active, config.grace, config.initial_check_done);
        let (command_tx, command_rx) = mpsc::channel(COMMAND_BUFFER);
        let (notice_tx, notice_rx) = mpsc::unbounded_channel();

        let worker = ClockWorker {
            state,
            store,
            clock,
            grace: GraceTimer::new(),
            backlog: VecDeque::new(),
            commands: command_tx.downgrade(),
            notices: notice_tx,
        };
        tokio::spawn(worker.run(command_rx));

        Ok((Self { sender: command_tx }, notice_rx))
    }

    pub async fn geofence(&self, transition: GeofenceTransition) -> Result<()> {
        self.send(Command::Event(ClockEvent::Geofence(transition)))
            .await
    }

    /// Clocks in or out by hand. The action is checked against the state the
    /// worker holds when it gets to it, so a concurrent geofence signal cannot
    /// slip in between validation and commit.
    pub async fn manual(&self, action: ManualClockAction) -> Result<(), EditError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Manual {
            action,
            reply: reply_tx,
        })
        .await
        .map_err(|_| EditError::Unavailable)?;
        reply_rx.await.map_err(|_| EditError::Unavailable)?
    }

    pub async fn edit(&self, edit: RecordEdit) -> Result<(), EditError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Edit {
            edit,
            reply: reply_tx,
        })
        .await
        .map_err(|_| EditError::Unavailable)?;
        reply_rx.await.map_err(|_| EditError::Unavailable)?
    }

    pub async fn snapshot(&self) -> Result<ClockSnapshot> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Snapshot(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| anyhow!("clock worker dropped snapshot request"))
    }

    /// Cancels any armed timer, flushes pending writes and stops the worker.
    pub async fn shutdown(&self) -> Result<()> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(Command::Shutdown(reply_tx)).await?;
        reply_rx
            .await
            .map_err(|_| anyhow!("clock worker stopped before acknowledging shutdown"))
    }

    async fn send(&self, command: Command) -> Result<()> {
        self.sender
            .send(command)
            .await
            .map_err(|_| anyhow!("clock worker is not running"))
    }
}

struct ClockWorker {
    state: ClockState,
    store: Arc<dyn SessionStore>,
    clock: Arc<dyn Clock>,
    grace: GraceTimer,
    /// Writes not yet confirmed by the store, oldest first.
    backlog: VecDeque<StoreWrite>,
    commands: mpsc::WeakSender<Command>,
    notices: mpsc::UnboundedSender<ClockNotice>,
}

impl ClockWorker {
    async fn run(mut self, mut commands: mpsc::Receiver<Command>) {
        while let Some(command) = commands.recv().await {
            match command {
                Command::Event(event) => self.handle_event(event).await,
                Command::Manual { action, reply } => {
                    let result = self.handle_manual(action).await;
                    let _ = reply.send(result);
                }
                Command::Edit { edit, reply } => {
                    let result = self.handle_edit(edit).await;
                    let _ = reply.send(result);
                }
                Command::Snapshot(reply) => {
                    let _ = reply.send(self.state.snapshot());
                }
                Command::Shutdown(reply) => {
                    self.grace.cancel();
                    self.flush().await;
                    let _ = reply.send(());
                    break;
                }
            }
        }

        self.grace.cancel();
        if !self.backlog.is_empty() {
            log_warn!(
                "Clock worker stopping with {} unsaved writes",
                self.backlog.len()
            );
        }
        log_info!("Clock worker stopped");
    }

    async fn handle_event(&mut self, event: ClockEvent) {
        if let ClockEvent::GraceElapsed { generation } = event {
            log_debug!("Grace timer {generation} elapsed");
            self.grace.clear_fired();
        }

        let before = self.state.status();
        let effects = self.state.apply(event);
        let after = self.state.status();
        if effects.is_empty() {
            log_debug!("Ignored {event:?} in state {before:?}");
            return;
        }
        if before != after {
            log_info!("Clock transition {before:?} -> {after:?}");
        }

        self.execute(effects).await;
    }

    async fn handle_manual(&mut self, action: ManualClockAction) -> Result<(), EditError> {
        validate_manual_action(&self.state.snapshot(), &action)?;
        if action.kind == ManualKind::In {
            self.check_after_latest_closed(None, action.timestamp).await?;
        }
        self.handle_event(ClockEvent::Manual(action)).await;
        Ok(())
    }

    /// An open session runs from its start onwards, so it must not start
    /// before any closed session has ended.
    async fn check_after_latest_closed(
        &self,
        session_id: Option<&str>,
        start: DateTime<Utc>,
    ) -> Result<(), EditError> {
        let latest = self
            .store
            .fetch_latest_closed_session()
            .await
            .map_err(storage_error)?;
        match latest {
            Some(latest)
                if Some(latest.id.as_str()) != session_id
                    && latest.end.map_or(false, |end| end > start) =>
            {
                Err(EditError::SessionsOverlap(latest.id))
            }
            _ => Ok(()),
        }
    }

    async fn check_neighbours(&self, edit: &RecordEdit) -> Result<(), EditError> {
        let RecordEdit::SessionBounds {
            session_id,
            start,
            end,
        } = edit
        else {
            return Ok(());
        };
        let Some(end) = end else {
            return self
                .check_after_latest_closed(Some(session_id.as_str()), *start)
                .await;
        };

        let neighbours = self
            .store
            .fetch_sessions_overlapping(*start, *end)
            .await
            .map_err(storage_error)?;
        match neighbours.into_iter().find(|other| other.id != *session_id) {
            Some(other) => Err(EditError::SessionsOverlap(other.id)),
            None => Ok(()),
        }
    }

    async fn handle_edit(&mut self, edit: RecordEdit) -> Result<(), EditError> {
        let session_id = self.owning_session_id(&edit).await?;
        let is_active = self
            .state
            .active_session()
            .map_or(false, |session| session.id == session_id);

        let mut session = if is_active {
            self.state
                .active_session()
                .cloned()
                .ok_or(EditError::NoActiveSession)?
        } else {
            self.store
                .fetch_session(&session_id)
                .await
                .map_err(storage_error)?
                .ok_or_else(|| EditError::SessionNotFound(session_id.clone()))?
        };

        validate_edit(&session, &edit, self.clock.now())?;
        self.check_neighbours(&edit).await?;

        let effects = if is_active {
            self.state.edit_active(&edit)
        } else {
            let mut effects: Vec<Effect> = apply_edit(&mut session, &edit)
                .into_iter()
                .map(Effect::Store)
                .collect();
            effects.push(Effect::Notify(match edit {
                RecordEdit::DeleteSession { session_id } => {
                    ClockNotice::SessionDeleted { session_id }
                }
                _ => ClockNotice::SessionEdited { session },
            }));
            effects
        };

        log_info!("Applied edit to session {session_id}");
        self.execute(effects).await;
        Ok(())
    }

    async fn owning_session_id(&self, edit: &RecordEdit) -> Result<String, EditError> {
        let gap_id = match edit {
            RecordEdit::SessionBounds { session_id, .. }
            | RecordEdit::DeleteSession { session_id } => return Ok(session_id.clone()),
            RecordEdit::GapTimes { gap_id, .. } | RecordEdit::GapDeleted { gap_id, .. } => gap_id,
        };

        if let Some(session) = self.state.active_session() {
            if session.gap(gap_id).is_some() {
                return Ok(session.id.clone());
            }
        }

        self.store
            .fetch_gap(gap_id)
            .await
            .map_err(storage_error)?
            .map(|gap| gap.session_id)
            .ok_or_else(|| EditError::GapNotFound(gap_id.clone()))
    }

    async fn execute(&mut self, effects: Vec<Effect>) {
        for effect in effects {
            match effect {
                Effect::Store(write) => self.backlog.push_back(write),
                Effect::ArmGrace { generation, delay } => self.arm_grace(generation, delay),
                Effect::CancelGrace => {
                    log_debug!("Cancelling grace timer");
                    self.grace.cancel();
                }
                Effect::Notify(notice) => {
                    if self.notices.send(notice).is_err() {
                        log_debug!("No notice listener attached");
                    }
                }
            }
        }

        self.flush().await;
    }

    fn arm_grace(&mut self, generation: u64, delay: Duration) {
        log_info!(
            "Arming grace timer {generation} for {}s",
            delay.as_secs()
        );
        let commands = self.commands.clone();
        self.grace.arm(delay, async move {
            // Expiry re-enters the worker through the command channel.
            if let Some(sender) = commands.upgrade() {
                let _ = sender
                    .send(Command::Event(ClockEvent::GraceElapsed { generation }))
                    .await;
            }
        });
    }

    /// Writes the backlog in order. A failed write stays queued and is retried
    /// on the next mutation; in-memory state is not rolled back.
    async fn flush(&mut self) {
        while let Some(write) = self.backlog.front() {
            match persist(self.store.as_ref(), write).await {
                Ok(()) => {
                    self.backlog.pop_front();
                }
                Err(err) => {
                    log_error!(
                        "Store write failed ({} pending, will retry): {err:#}",
                        self.backlog.len()
                    );
                    break;
                }
            }
        }
    }
}

fn storage_error(err: anyhow::Error) -> EditError {
    EditError::Storage(format!("{err:#}"))
}

async fn persist(store: &dyn SessionStore, write: &StoreWrite) -> Result<()> {
    match write {
        StoreWrite::InsertSession(session) => store
            .insert_session(session)
            .await
            .with_context(|| format!("failed to insert session {}", session.id)),
        StoreWrite::SaveSession(session) => store
            .save_session(session)
            .await
            .with_context(|| format!("failed to save session {}", session.id)),
        StoreWrite::DeleteSession(session_id) => store
            .delete_session(session_id)
            .await
            .with_context(|| format!("failed to delete session {session_id}")),
        StoreWrite::InsertGap(gap) => store
            .insert_gap(gap)
            .await
            .with_context(|| format!("failed to insert gap {}", gap.id)),
        StoreWrite::SaveGap(gap) => store
            .save_gap(gap)
            .await
            .with_context(|| format!("failed to save gap {}", gap.id)),
    }
}
