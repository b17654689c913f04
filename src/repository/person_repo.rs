// ==========================================
// Duty Roster Engine - person metadata repository
// ==========================================
// global_score is maintained outside this core; read here for fairness scoring
// ==========================================

use crate::domain::roster::Person;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension};
use std::sync::{Arc, Mutex};

pub struct PersonRepository {
    conn: Arc<Mutex<Connection>>,
}

impl PersonRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    pub fn upsert(&self, person: &Person) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO person (person, cohort, global_score) VALUES (?1, ?2, ?3)
            ON CONFLICT (person, cohort) DO UPDATE SET global_score = excluded.global_score
            "#,
            params![person.person, person.cohort, person.global_score],
        )?;
        Ok(())
    }

    /// `None` when the person is unknown or the score is NULL.
    pub fn global_score(&self, person: &str, cohort: i32) -> RepositoryResult<Option<f64>> {
        let conn = self.get_conn()?;
        let score: Option<Option<f64>> = conn
            .query_row(
                "SELECT global_score FROM person WHERE person = ?1 AND cohort = ?2",
                params![person, cohort],
                |row| row.get(0),
            )
            .optional()?;
        Ok(score.flatten())
    }
}
