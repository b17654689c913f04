// ==========================================
// Duty Roster Engine - category weight repository
// ==========================================
// Written only by the weight calculator; one row per category (upsert)
// ==========================================

use crate::domain::category::CategoryWeight;
use crate::repository::db_utils::{build_in_clause, format_ts, parse_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, params_from_iter, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

pub struct WeightRepository {
    conn: Arc<Mutex<Connection>>,
}

fn map_weight(row: &Row<'_>) -> SqliteResult<CategoryWeight> {
    let raw: String = row.get(2)?;
    Ok(CategoryWeight {
        category_id: row.get(0)?,
        weight: row.get(1)?,
        computed_at: parse_ts(2, &raw)?,
    })
}

impl WeightRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Upserts all weights in a single transaction. Returns the number of rows written.
    pub fn upsert_many(&self, weights: &[CategoryWeight]) -> RepositoryResult<usize> {
        let mut conn = self.get_conn()?;
        let tx = conn.transaction().map_err(RepositoryError::transaction)?;
        let mut count = 0;
        for w in weights {
            count += tx.execute(
                r#"
                INSERT INTO category_weight (category_id, weight, computed_at)
                VALUES (?1, ?2, ?3)
                ON CONFLICT (category_id)
                DO UPDATE SET weight = excluded.weight, computed_at = excluded.computed_at
                "#,
                params![w.category_id, w.weight, format_ts(w.computed_at)],
            )?;
        }
        tx.commit().map_err(RepositoryError::transaction)?;
        Ok(count)
    }

    pub fn find(&self, category_id: i64) -> RepositoryResult<Option<CategoryWeight>> {
        let conn = self.get_conn()?;
        let w = conn
            .query_row(
                "SELECT category_id, weight, computed_at FROM category_weight WHERE category_id = ?1",
                params![category_id],
                map_weight,
            )
            .optional()?;
        Ok(w)
    }

    /// Stored weights for the given categories; categories without a row are absent.
    pub fn weights_for(&self, category_ids: &[i64]) -> RepositoryResult<HashMap<i64, f64>> {
        if category_ids.is_empty() {
            return Ok(HashMap::new());
        }
        let conn = self.get_conn()?;
        let sql = format!(
            "SELECT category_id, weight FROM category_weight WHERE {}",
            build_in_clause("category_id", category_ids)
        );
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params_from_iter(category_ids.iter()), |row| {
                Ok((row.get::<_, i64>(0)?, row.get::<_, f64>(1)?))
            })?
            .collect::<SqliteResult<HashMap<_, _>>>()?;
        Ok(rows)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<CategoryWeight>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            "SELECT category_id, weight, computed_at FROM category_weight ORDER BY category_id",
        )?;
        let rows = stmt
            .query_map([], map_weight)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn setup() -> (Arc<Mutex<Connection>>, WeightRepository) {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        conn.execute_batch(
            "INSERT INTO duty_category (id, name, code) VALUES (1, 'Курс', 'к'), (2, 'ГБР', 'гбр');",
        )
        .unwrap();
        let conn = Arc::new(Mutex::new(conn));
        (conn.clone(), WeightRepository::new(conn))
    }

    fn w(id: i64, weight: f64, hour: u32) -> CategoryWeight {
        CategoryWeight {
            category_id: id,
            weight,
            computed_at: NaiveDate::from_ymd_opt(2025, 1, 1)
                .unwrap()
                .and_hms_opt(hour, 0, 0)
                .unwrap(),
        }
    }

    #[test]
    fn test_upsert_overwrites_and_refreshes_timestamp() {
        let (_conn, repo) = setup();
        repo.upsert_many(&[w(1, 12.0, 8), w(2, 9.0, 8)]).unwrap();
        repo.upsert_many(&[w(1, 16.5, 9)]).unwrap();

        let one = repo.find(1).unwrap().unwrap();
        assert_eq!(one.weight, 16.5);
        assert_eq!(one.computed_at, w(1, 0.0, 9).computed_at);
        assert_eq!(repo.list_all().unwrap().len(), 2);
    }

    #[test]
    fn test_weights_for_skips_missing() {
        let (_conn, repo) = setup();
        repo.upsert_many(&[w(1, 12.0, 8)]).unwrap();
        let map = repo.weights_for(&[1, 2]).unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map.get(&1), Some(&12.0));
        assert!(repo.weights_for(&[]).unwrap().is_empty());
    }
}
