// ==========================================
// Duty Roster Engine - assignment history ledger
// ==========================================
// Rule: append-only, rows are never updated or deleted
// Key: (person, date, category, cohort); the newest row of a key is the
// standing assignment, older rows stay as the audit trail of forced re-runs
// ==========================================

use crate::domain::assignment::AssignmentHistoryRecord;
use crate::repository::db_utils::{format_date, format_ts, parse_date, parse_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

/// Restricts `h` to the newest row of each (person, date, category, cohort).
const STANDING_ROW: &str = r#"
    h.id = (SELECT MAX(x.id) FROM assignment_history x
            WHERE x.person = h.person AND x.date = h.date
              AND x.category = h.category AND x.cohort = h.cohort)
"#;

pub struct HistoryRepository {
    conn: Arc<Mutex<Connection>>,
}

fn map_record(row: &Row<'_>) -> SqliteResult<AssignmentHistoryRecord> {
    let date_raw: String = row.get(1)?;
    let recorded_raw: String = row.get(6)?;
    Ok(AssignmentHistoryRecord {
        person: row.get(0)?,
        date: parse_date(1, &date_raw)?,
        category: row.get(2)?,
        cohort: row.get(3)?,
        shift: row.get(4)?,
        station: row.get(5)?,
        recorded_at: parse_ts(6, &recorded_raw)?,
    })
}

/// Appends one record on an existing connection or transaction.
///
/// Returns 0 when the standing row of the key already carries the same
/// shift and station.
pub(crate) fn append_on(conn: &Connection, record: &AssignmentHistoryRecord) -> rusqlite::Result<usize> {
    let date = format_date(record.date);
    let standing: Option<(Option<i32>, Option<String>)> = conn
        .query_row(
            r#"
            SELECT shift, station FROM assignment_history
            WHERE person = ?1 AND date = ?2 AND category = ?3 AND cohort = ?4
            ORDER BY id DESC
            LIMIT 1
            "#,
            params![record.person, date, record.category, record.cohort],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .optional()?;
    if standing == Some((record.shift, record.station.clone())) {
        return Ok(0);
    }

    conn.execute(
        r#"
        INSERT INTO assignment_history
            (person, date, category, cohort, shift, station, recorded_at)
        VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
        "#,
        params![
            record.person,
            date,
            record.category,
            record.cohort,
            record.shift,
            record.station,
            format_ts(record.recorded_at),
        ],
    )
}

impl HistoryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Appends a record. Returns `false` when it matches the standing row.
    pub fn append(&self, record: &AssignmentHistoryRecord) -> RepositoryResult<bool> {
        let conn = self.get_conn()?;
        Ok(append_on(&conn, record)? > 0)
    }

    /// Standing records of a person for one category and cohort, newest day first.
    ///
    /// One row per day; `before` bounds the lookup to dates strictly earlier than the given day.
    pub fn recent_for(
        &self,
        person: &str,
        category: &str,
        cohort: i32,
        before: Option<NaiveDate>,
        limit: usize,
    ) -> RepositoryResult<Vec<AssignmentHistoryRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT h.person, h.date, h.category, h.cohort, h.shift, h.station, h.recorded_at
            FROM assignment_history h
            WHERE h.person = ?1 AND h.category = ?2 AND h.cohort = ?3
              AND (?4 IS NULL OR h.date < ?4)
              AND {}
            ORDER BY h.date DESC
            LIMIT ?5
            "#,
            STANDING_ROW
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                params![person, category, cohort, before.map(format_date), limit as i64],
                map_record,
            )?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// Standing records of one day, for reporting.
    pub fn list_for_date(&self, date: NaiveDate) -> RepositoryResult<Vec<AssignmentHistoryRecord>> {
        let conn = self.get_conn()?;
        let sql = format!(
            r#"
            SELECT h.person, h.date, h.category, h.cohort, h.shift, h.station, h.recorded_at
            FROM assignment_history h
            WHERE h.date = ?1 AND {}
            ORDER BY h.cohort, h.category, h.id
            "#,
            STANDING_ROW
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![format_date(date)], map_record)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    /// Number of people recorded for one key (standing rows only).
    pub fn count_for(&self, date: NaiveDate, category: &str, cohort: i32) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(DISTINCT person) FROM assignment_history WHERE date = ?1 AND category = ?2 AND cohort = ?3",
            params![format_date(date), category, cohort],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Every row of one key, superseded ones included, oldest first.
    pub fn audit_for(&self, date: NaiveDate, category: &str, cohort: i32) -> RepositoryResult<Vec<AssignmentHistoryRecord>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT person, date, category, cohort, shift, station, recorded_at
            FROM assignment_history
            WHERE date = ?1 AND category = ?2 AND cohort = ?3
            ORDER BY id
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date), category, cohort], map_record)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}
