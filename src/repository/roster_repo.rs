// ==========================================
// Duty Roster Engine - roster repository
// ==========================================
// Rows are produced by the external roster importer; the engine only reads
// ==========================================

use crate::domain::roster::RosterEntry;
use crate::domain::types::{normalize_code, Gender};
use crate::repository::db_utils::{format_date, parse_date};
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveDate;
use rusqlite::{params, Connection, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct RosterRepository {
    conn: Arc<Mutex<Connection>>,
}

fn map_entry(row: &Row<'_>) -> SqliteResult<RosterEntry> {
    let date_raw: String = row.get(1)?;
    let gender_raw: String = row.get(4)?;
    Ok(RosterEntry {
        person: row.get(0)?,
        date: parse_date(1, &date_raw)?,
        category: row.get(2)?,
        group_name: row.get(3)?,
        gender: Gender::parse(&gender_raw),
        cohort: row.get(5)?,
    })
}

impl RosterRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Batch insert used by the importer. A person appears once per (date, cohort);
    /// a later row replaces an earlier one. Category codes are stored normalized.
    pub fn insert_entries(&self, entries: &[RosterEntry]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;
        let mut count = 0;
        for e in entries {
            count += tx.execute(
                r#"
                INSERT INTO duty_roster (person, date, category, group_name, gender, cohort)
                VALUES (?1, ?2, ?3, ?4, ?5, ?6)
                "#,
                params![
                    e.person,
                    format_date(e.date),
                    normalize_code(&e.category),
                    e.group_name,
                    e.gender.as_str(),
                    e.cohort,
                ],
            )?;
        }
        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(count)
    }

    /// Every roster row of the day, ordered by cohort, category, then insertion.
    pub fn list_for_date(&self, date: NaiveDate) -> RepositoryResult<Vec<RosterEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT person, date, category, group_name, gender, cohort
            FROM duty_roster
            WHERE date = ?1
            ORDER BY cohort, category, rowid
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date)], map_entry)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn list_for(&self, date: NaiveDate, category: &str, cohort: i32) -> RepositoryResult<Vec<RosterEntry>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT person, date, category, group_name, gender, cohort
            FROM duty_roster
            WHERE date = ?1 AND category = ?2 AND cohort = ?3
            ORDER BY rowid
            "#,
        )?;
        let rows = stmt
            .query_map(params![format_date(date), normalize_code(category), cohort], map_entry)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn distinct_cohorts(&self, date: NaiveDate) -> RepositoryResult<Vec<i32>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT DISTINCT cohort FROM duty_roster WHERE date = ?1 ORDER BY cohort")?;
        let rows = stmt
            .query_map(params![format_date(date)], |row| row.get(0))?
            .collect::<SqliteResult<Vec<i32>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(person: &str, category: &str, cohort: i32) -> RosterEntry {
        RosterEntry {
            person: person.to_string(),
            date: NaiveDate::from_ymd_opt(2025, 4, 10).unwrap(),
            category: category.to_string(),
            group_name: "ИО6".to_string(),
            gender: Gender::Male,
            cohort,
        }
    }

    #[test]
    fn test_list_and_cohorts() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let repo = RosterRepository::new(Arc::new(Mutex::new(conn)));

        repo.insert_entries(&[
            entry("Иванов", "к", 2023),
            entry("Петров", "к", 2023),
            entry("Сидоров", " С", 2024),
        ])
        .unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();
        assert_eq!(repo.list_for_date(date).unwrap().len(), 3);
        assert_eq!(repo.list_for(date, "к", 2023).unwrap().len(), 2);
        let canteen = repo.list_for(date, "С", 2024).unwrap();
        assert_eq!(canteen.len(), 1);
        assert_eq!(canteen[0].category, "с");
        assert_eq!(repo.distinct_cohorts(date).unwrap(), vec![2023, 2024]);
    }

    #[test]
    fn test_reimport_replaces_person_row() {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let repo = RosterRepository::new(Arc::new(Mutex::new(conn)));

        repo.insert_entries(&[entry("Иванов", "к", 2023)]).unwrap();
        repo.insert_entries(&[entry("Иванов", "гбр", 2023)]).unwrap();

        let date = NaiveDate::from_ymd_opt(2025, 4, 10).unwrap();
        let rows = repo.list_for_date(date).unwrap();
        assert_eq!(rows.len(), 1);
        assert_eq!(rows[0].category, "гбр");
    }
}
