// ==========================================
// Duty Roster Engine - shift / station assignment repository
// ==========================================
// Guarded write: existence check, replace and history append run in one
// IMMEDIATE transaction, so a concurrent trigger for the same key waits and
// then observes the committed rows
// ==========================================

use crate::domain::assignment::{AssignmentHistoryRecord, ShiftAssignment, StationAssignment};
use crate::repository::db_utils::{format_date, parse_date};
use crate::repository::error::{RepositoryError, RepositoryResult};
use crate::repository::history_repo::append_on;
use chrono::{NaiveDate, NaiveDateTime};
use rusqlite::{params, Connection, Result as SqliteResult, Row, TransactionBehavior};
use std::sync::{Arc, Mutex};

/// Result of a guarded allocation write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WriteOutcome {
    /// Rows written; `history_appended` counts new ledger rows.
    Written { rows: usize, history_appended: usize },
    /// Rows already existed and no overwrite was requested.
    AlreadyAllocated { existing: usize },
}

pub struct AssignmentRepository {
    conn: Arc<Mutex<Connection>>,
}

fn map_shift(row: &Row<'_>) -> SqliteResult<ShiftAssignment> {
    let raw: String = row.get(0)?;
    Ok(ShiftAssignment {
        date: parse_date(0, &raw)?,
        category: row.get(1)?,
        cohort: row.get(2)?,
        person: row.get(3)?,
        shift: row.get(4)?,
    })
}

fn map_station(row: &Row<'_>) -> SqliteResult<StationAssignment> {
    let raw: String = row.get(0)?;
    Ok(StationAssignment {
        date: parse_date(0, &raw)?,
        category: row.get(1)?,
        cohort: row.get(2)?,
        person: row.get(3)?,
        station: row.get(4)?,
    })
}

fn ensure_single_key<'a, I>(date: NaiveDate, category: &str, cohort: i32, keys: I) -> RepositoryResult<()>
where
    I: IntoIterator<Item = (NaiveDate, &'a str, i32)>,
{
    for (d, c, h) in keys {
        if d != date || c != category || h != cohort {
            return Err(RepositoryError::ValidationError(format!(
                "assignment ({}, {}, {}) outside allocation key ({}, {}, {})",
                d, c, h, date, category, cohort
            )));
        }
    }
    Ok(())
}

impl AssignmentRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    // ==========================================
    // shift assignments
    // ==========================================

    pub fn count_shift_assignments(&self, date: NaiveDate, category: &str, cohort: i32) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM shift_assignment WHERE date = ?1 AND category = ?2 AND cohort = ?3",
            params![format_date(date), category, cohort],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Writes one (date, category, cohort) shift allocation plus its history rows.
    ///
    /// Without `force`, existing rows for the key turn the call into a no-op.
    /// With `force`, the key's rows are replaced; a ledger row is appended only
    /// for people whose shift or station changed.
    pub fn write_shift_allocation(
        &self,
        date: NaiveDate,
        category: &str,
        cohort: i32,
        assignments: &[ShiftAssignment],
        force: bool,
        recorded_at: NaiveDateTime,
    ) -> RepositoryResult<WriteOutcome> {
        ensure_single_key(
            date,
            category,
            cohort,
            assignments.iter().map(|a| (a.date, a.category.as_str(), a.cohort)),
        )?;

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::transaction)?;
        let date_str = format_date(date);

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM shift_assignment WHERE date = ?1 AND category = ?2 AND cohort = ?3",
            params![date_str, category, cohort],
            |row| row.get(0),
        )?;
        if existing > 0 && !force {
            return Ok(WriteOutcome::AlreadyAllocated {
                existing: existing as usize,
            });
        }
        if existing > 0 {
            tx.execute(
                "DELETE FROM shift_assignment WHERE date = ?1 AND category = ?2 AND cohort = ?3",
                params![date_str, category, cohort],
            )?;
        }

        let mut rows = 0;
        let mut history_appended = 0;
        for a in assignments {
            rows += tx.execute(
                r#"
                INSERT OR REPLACE INTO shift_assignment (date, category, cohort, person, shift)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![date_str, a.category, a.cohort, a.person, a.shift],
            )?;
            history_appended += append_on(&tx, &AssignmentHistoryRecord::from_shift(a, recorded_at))?;
        }

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(WriteOutcome::Written { rows, history_appended })
    }

    pub fn list_shift_assignments(
        &self,
        date: NaiveDate,
        category: &str,
        cohort: i32,
    ) -> RepositoryResult<Vec<ShiftAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT date, category, cohort, person, shift
            FROM shift_assignment
            WHERE date = ?1 AND category = ?2 AND cohort = ?3
            ORDER BY shift, person
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date), category, cohort], map_shift)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn list_shifts_for_date(&self, date: NaiveDate) -> RepositoryResult<Vec<ShiftAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT date, category, cohort, person, shift
            FROM shift_assignment
            WHERE date = ?1
            ORDER BY cohort, category, shift, person
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date)], map_shift)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    // ==========================================
    // station assignments
    // ==========================================

    pub fn count_station_assignments(&self, date: NaiveDate, category: &str, cohort: i32) -> RepositoryResult<usize> {
        let conn = self.get_conn()?;
        let n: i64 = conn.query_row(
            "SELECT COUNT(*) FROM station_assignment WHERE date = ?1 AND category = ?2 AND cohort = ?3",
            params![format_date(date), category, cohort],
            |row| row.get(0),
        )?;
        Ok(n as usize)
    }

    /// Station counterpart of [`AssignmentRepository::write_shift_allocation`].
    pub fn write_station_allocation(
        &self,
        date: NaiveDate,
        category: &str,
        cohort: i32,
        assignments: &[StationAssignment],
        force: bool,
        recorded_at: NaiveDateTime,
    ) -> RepositoryResult<WriteOutcome> {
        ensure_single_key(
            date,
            category,
            cohort,
            assignments.iter().map(|a| (a.date, a.category.as_str(), a.cohort)),
        )?;

        let mut conn = self.get_conn()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(RepositoryError::transaction)?;
        let date_str = format_date(date);

        let existing: i64 = tx.query_row(
            "SELECT COUNT(*) FROM station_assignment WHERE date = ?1 AND category = ?2 AND cohort = ?3",
            params![date_str, category, cohort],
            |row| row.get(0),
        )?;
        if existing > 0 && !force {
            return Ok(WriteOutcome::AlreadyAllocated {
                existing: existing as usize,
            });
        }
        if existing > 0 {
            tx.execute(
                "DELETE FROM station_assignment WHERE date = ?1 AND category = ?2 AND cohort = ?3",
                params![date_str, category, cohort],
            )?;
        }

        let mut rows = 0;
        let mut history_appended = 0;
        for a in assignments {
            rows += tx.execute(
                r#"
                INSERT OR REPLACE INTO station_assignment (date, category, cohort, person, station)
                VALUES (?1, ?2, ?3, ?4, ?5)
                "#,
                params![date_str, a.category, a.cohort, a.person, a.station],
            )?;
            history_appended += append_on(&tx, &AssignmentHistoryRecord::from_station(a, recorded_at))?;
        }

        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(WriteOutcome::Written { rows, history_appended })
    }

    pub fn list_station_assignments(
        &self,
        date: NaiveDate,
        category: &str,
        cohort: i32,
    ) -> RepositoryResult<Vec<StationAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT date, category, cohort, person, station
            FROM station_assignment
            WHERE date = ?1 AND category = ?2 AND cohort = ?3
            ORDER BY station, person
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date), category, cohort], map_station)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn list_stations_for_date(&self, date: NaiveDate) -> RepositoryResult<Vec<StationAssignment>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT date, category, cohort, person, station
            FROM station_assignment
            WHERE date = ?1
            ORDER BY cohort, category, station, person
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date)], map_station)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> AssignmentRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        AssignmentRepository::new(Arc::new(Mutex::new(conn)))
    }

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 6, 2).unwrap()
    }

    fn shift(person: &str, shift: i32) -> ShiftAssignment {
        ShiftAssignment {
            date: day(),
            category: "к".to_string(),
            cohort: 2023,
            person: person.to_string(),
            shift,
        }
    }

    fn at() -> NaiveDateTime {
        day().and_hms_opt(15, 30, 0).unwrap()
    }

    #[test]
    fn test_guarded_write_is_noop_second_time() {
        let repo = setup();
        let first = vec![shift("a", 0), shift("b", 1)];
        let out = repo.write_shift_allocation(day(), "к", 2023, &first, false, at()).unwrap();
        assert_eq!(out, WriteOutcome::Written { rows: 2, history_appended: 2 });

        let second = vec![shift("a", 1), shift("b", 0)];
        let out = repo.write_shift_allocation(day(), "к", 2023, &second, false, at()).unwrap();
        assert_eq!(out, WriteOutcome::AlreadyAllocated { existing: 2 });

        let stored = repo.list_shift_assignments(day(), "к", 2023).unwrap();
        assert_eq!(stored, vec![shift("a", 0), shift("b", 1)]);
    }

    #[test]
    fn test_forced_write_replaces_rows() {
        let repo = setup();
        repo.write_shift_allocation(day(), "к", 2023, &[shift("a", 0), shift("b", 1)], false, at())
            .unwrap();

        let out = repo
            .write_shift_allocation(day(), "к", 2023, &[shift("c", 0)], true, at())
            .unwrap();
        assert_eq!(out, WriteOutcome::Written { rows: 1, history_appended: 1 });

        let stored = repo.list_shift_assignments(day(), "к", 2023).unwrap();
        assert_eq!(stored, vec![shift("c", 0)]);
        assert_eq!(repo.count_shift_assignments(day(), "к", 2023).unwrap(), 1);
    }

    #[test]
    fn test_rejects_rows_outside_key() {
        let repo = setup();
        let mut stray = shift("a", 0);
        stray.cohort = 2024;
        let err = repo
            .write_shift_allocation(day(), "к", 2023, &[stray], false, at())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::ValidationError(_)));
    }

    #[test]
    fn test_station_write_and_list() {
        let repo = setup();
        let rows = vec![StationAssignment {
            date: day(),
            category: "с".to_string(),
            cohort: 2023,
            person: "a".to_string(),
            station: "ГЦ".to_string(),
        }];
        repo.write_station_allocation(day(), "с", 2023, &rows, false, at()).unwrap();
        assert_eq!(repo.count_station_assignments(day(), "с", 2023).unwrap(), 1);
        assert_eq!(repo.list_stations_for_date(day()).unwrap(), rows);
    }

    #[test]
    fn test_busy_database_is_a_transaction_error() {
        let file = tempfile::NamedTempFile::new().unwrap();
        let path = file.path().to_string_lossy().to_string();
        let holder = Connection::open(&path).unwrap();
        crate::db::init_schema(&holder).unwrap();
        holder.execute_batch("BEGIN IMMEDIATE").unwrap();

        // no busy timeout: the write lock held above fails immediately
        let repo = AssignmentRepository::new(Arc::new(Mutex::new(Connection::open(&path).unwrap())));
        let err = repo
            .write_shift_allocation(day(), "к", 2023, &[shift("a", 0)], false, at())
            .unwrap_err();
        assert!(matches!(err, RepositoryError::DatabaseTransactionError(_)));

        holder.execute_batch("ROLLBACK").unwrap();
        assert!(repo
            .write_shift_allocation(day(), "к", 2023, &[shift("a", 0)], false, at())
            .is_ok());
    }

    #[test]
    fn test_forced_station_change_is_recorded_in_ledger() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repo = AssignmentRepository::new(conn.clone());
        let history = crate::repository::HistoryRepository::new(conn);

        let station = |name: &str| StationAssignment {
            date: day(),
            category: "с".to_string(),
            cohort: 2023,
            person: "a".to_string(),
            station: name.to_string(),
        };
        repo.write_station_allocation(day(), "с", 2023, &[station("ГЦ")], false, at()).unwrap();

        let same = repo
            .write_station_allocation(day(), "с", 2023, &[station("ГЦ")], true, at())
            .unwrap();
        assert_eq!(same, WriteOutcome::Written { rows: 1, history_appended: 0 });

        let moved = repo
            .write_station_allocation(day(), "с", 2023, &[station("овощи")], true, at())
            .unwrap();
        assert_eq!(moved, WriteOutcome::Written { rows: 1, history_appended: 1 });

        let standing = history.list_for_date(day()).unwrap();
        assert_eq!(standing.len(), 1);
        assert_eq!(standing[0].station.as_deref(), Some("овощи"));
    }
}
