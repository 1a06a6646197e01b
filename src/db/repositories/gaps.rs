use anyhow::Result;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};

use crate::db::{
    helpers::{
        format_datetime, format_optional_datetime, gap_status_flag, parse_datetime,
        parse_gap_status, parse_optional_datetime,
    },
    models::Gap,
    Database,
};

fn row_to_gap(row: &Row) -> Result<Gap> {
    let exit_time: String = row.get("exit_time")?;
    let return_time: Option<String> = row.get("return_time")?;
    let deleted: i64 = row.get("deleted")?;

    Ok(Gap {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        exit_time: parse_datetime(&exit_time, "exit_time")?,
        return_time: parse_optional_datetime(return_time, "return_time")?,
        status: parse_gap_status(deleted)?,
    })
}

pub(super) fn load_gaps(conn: &Connection, session_id: &str) -> Result<Vec<Gap>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, exit_time, return_time, deleted
         FROM gaps
         WHERE session_id = ?1
         ORDER BY exit_time ASC",
    )?;

    let mut rows = stmt.query(params![session_id])?;
    let mut gaps = Vec::new();
    while let Some(row) = rows.next()? {
        gaps.push(row_to_gap(row)?);
    }
    Ok(gaps)
}

impl Database {
    pub async fn insert_gap(&self, gap: &Gap) -> Result<()> {
        let record = gap.clone();
        self.execute(move |conn| {
            let now = format_datetime(&Utc::now());
            conn.execute(
                "INSERT INTO gaps (id, session_id, exit_time, return_time, deleted, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
                params![
                    record.id,
                    record.session_id,
                    format_datetime(&record.exit_time),
                    format_optional_datetime(record.return_time.as_ref()),
                    gap_status_flag(record.status),
                    now,
                    now,
                ],
            )?;
            Ok(())
        })
        .await
    }

    pub async fn update_gap(&self, gap: &Gap) -> Result<()> {
        let record = gap.clone();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE gaps
                 SET exit_time = ?1,
                     return_time = ?2,
                     deleted = ?3,
                     updated_at = ?4
                 WHERE id = ?5",
                params![
                    format_datetime(&record.exit_time),
                    format_optional_datetime(record.return_time.as_ref()),
                    gap_status_flag(record.status),
                    format_datetime(&Utc::now()),
                    record.id,
                ],
            )?;

            if rows_affected == 0 {
                return Err(anyhow::anyhow!("Gap not found"));
            }

            Ok(())
        })
        .await
    }

    pub async fn get_gap(&self, gap_id: &str) -> Result<Option<Gap>> {
        let gap_id = gap_id.to_string();
        self.execute(move |conn| {
            let gap = conn
                .query_row(
                    "SELECT id, session_id, exit_time, return_time, deleted
                     FROM gaps
                     WHERE id = ?1",
                    params![gap_id],
                    |row| Ok(row_to_gap(row)),
                )
                .optional()?
                .transpose()?;
            Ok(gap)
        })
        .await
    }
}
