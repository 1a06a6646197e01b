use anyhow::Result;
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use crate::db::{
    helpers::{format_datetime, format_optional_datetime, parse_datetime, parse_optional_datetime},
    models::WorkSession,
    Database,
};

use super::gaps::load_gaps;

const SESSION_COLUMNS: &str = "id, started_at, ended_at";

fn row_to_session(row: &Row) -> Result<WorkSession> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;

    Ok(WorkSession {
        id: row.get("id")?,
        start: parse_datetime(&started_at, "started_at")?,
        end: parse_optional_datetime(ended_at, "ended_at")?,
        gaps: Vec::new(),
    })
}

/// Runs a session query and attaches each session's gaps.
fn query_sessions(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Vec<WorkSession>> {
    let mut stmt = conn.prepare(sql)?;
    let mut rows = stmt.query(params)?;
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }
    drop(rows);

    for session in &mut sessions {
        session.gaps = load_gaps(conn, &session.id)?;
    }
    Ok(sessions)
}

impl Database {
    pub async fn insert_session(&self, session: &WorkSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            conn.execute(
                "INSERT INTO sessions (id, started_at, ended_at, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                params![
                    record.id,
                    format_datetime(&record.start),
                    format_optional_datetime(record.end.as_ref()),
                    now,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn update_session_bounds(&self, session: &WorkSession) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE sessions
                 SET started_at = ?1,
                     ended_at = ?2,
                     updated_at = ?3
                 WHERE id = ?4",
                params![
                    format_datetime(&record.start),
                    format_optional_datetime(record.end.as_ref()),
                    format_datetime(&Utc::now()),
                    record.id,
                ],
            )?;

            if rows_affected == 0 {
                return Err(anyhow::anyhow!("Session not found"));
            }

            Ok(())
        })
        .await
    }

    pub async fn get_session(&self, session_id: &str) -> Result<Option<WorkSession>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let sql = format!("SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1");
            let mut sessions = query_sessions(conn, &sql, params![session_id])?;
            Ok(sessions.pop())
        })
        .await
    }

    pub async fn get_open_session(&self) -> Result<Option<WorkSession>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE ended_at IS NULL
                 ORDER BY started_at DESC
                 LIMIT 1"
            );
            let mut sessions = query_sessions(conn, &sql, [])?;
            Ok(sessions.pop())
        })
        .await
    }

    pub async fn get_latest_closed_session(&self) -> Result<Option<WorkSession>> {
        self.execute(|conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE ended_at IS NOT NULL
                 ORDER BY ended_at DESC
                 LIMIT 1"
            );
            let mut sessions = query_sessions(conn, &sql, [])?;
            Ok(sessions.pop())
        })
        .await
    }

    pub async fn list_sessions_overlapping(
        &self,
        start: DateTime<Utc>,
        end: DateTime<Utc>,
    ) -> Result<Vec<WorkSession>> {
        self.execute(move |conn| {
            let sql = format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE started_at < ?2
                   AND (ended_at IS NULL OR ended_at > ?1)
                 ORDER BY started_at ASC"
            );
            query_sessions(
                conn,
                &sql,
                params![format_datetime(&start), format_datetime(&end)],
            )
        })
        .await
    }

    /// Delete a session; its gaps go with it via ON DELETE CASCADE.
    pub async fn delete_session(&self, session_id: &str) -> Result<()> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let tx = conn.transaction()?;
            tx.execute("DELETE FROM gaps WHERE session_id = ?1", params![session_id])?;
            tx.execute("DELETE FROM sessions WHERE id = ?1", params![session_id])?;
            tx.commit()?;
            Ok(())
        })
        .await
    }
}
