// ==========================================
// Duty Roster Engine - duty category repository
// ==========================================
// Rule: repositories hold no business logic
// ==========================================

use crate::domain::category::DutyCategory;
use crate::domain::types::normalize_code;
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

// ==========================================
// CategoryRepository
// ==========================================
/// Manages the duty_category table.
pub struct CategoryRepository {
    conn: Arc<Mutex<Connection>>,
}

const SELECT_COLUMNS: &str = "SELECT id, name, code, parent_id FROM duty_category";

fn map_category(row: &Row<'_>) -> SqliteResult<DutyCategory> {
    Ok(DutyCategory {
        id: row.get(0)?,
        name: row.get(1)?,
        code: row.get(2)?,
        parent_id: row.get(3)?,
    })
}

impl CategoryRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Inserts a category and returns its id. The code is stored normalized.
    pub fn insert(&self, name: &str, code: Option<&str>, parent_id: Option<i64>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO duty_category (name, code, parent_id) VALUES (?1, ?2, ?3)",
            params![name, code.map(normalize_code), parent_id],
        )?;
        Ok(conn.last_insert_rowid())
    }

    /// Returns the id of the category named `name`, creating it when absent.
    ///
    /// An existing row keeps its code and parent.
    pub fn ensure(&self, name: &str, code: Option<&str>, parent_id: Option<i64>) -> RepositoryResult<i64> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT OR IGNORE INTO duty_category (name, code, parent_id) VALUES (?1, ?2, ?3)",
            params![name, code.map(normalize_code), parent_id],
        )?;
        let id = conn.query_row(
            "SELECT id FROM duty_category WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )?;
        Ok(id)
    }

    pub fn find_by_id(&self, id: i64) -> RepositoryResult<Option<DutyCategory>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE id = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![id], map_category).optional()?)
    }

    pub fn find_by_name(&self, name: &str) -> RepositoryResult<Option<DutyCategory>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE name = ?1", SELECT_COLUMNS);
        Ok(conn.query_row(&sql, params![name], map_category).optional()?)
    }

    /// Top-level category carrying roster role code `code`.
    pub fn find_by_code(&self, code: &str) -> RepositoryResult<Option<DutyCategory>> {
        let conn = self.get_conn()?;
        let sql = format!(
            "{} WHERE code = ?1 AND parent_id IS NULL ORDER BY id LIMIT 1",
            SELECT_COLUMNS
        );
        Ok(conn.query_row(&sql, params![normalize_code(code)], map_category).optional()?)
    }

    pub fn list_all(&self) -> RepositoryResult<Vec<DutyCategory>> {
        let conn = self.get_conn()?;
        let sql = format!("{} ORDER BY id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_category)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn list_top_level(&self) -> RepositoryResult<Vec<DutyCategory>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE parent_id IS NULL ORDER BY id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map([], map_category)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }

    pub fn list_children(&self, parent_id: i64) -> RepositoryResult<Vec<DutyCategory>> {
        let conn = self.get_conn()?;
        let sql = format!("{} WHERE parent_id = ?1 ORDER BY id", SELECT_COLUMNS);
        let mut stmt = conn.prepare(&sql)?;
        let rows = stmt
            .query_map(params![parent_id], map_category)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setup() -> CategoryRepository {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::configure_sqlite_connection(&conn).unwrap();
        crate::db::init_schema(&conn).unwrap();
        CategoryRepository::new(Arc::new(Mutex::new(conn)))
    }

    #[test]
    fn test_ensure_is_idempotent() {
        let repo = setup();
        let a = repo.ensure("Столовая", Some("с"), None).unwrap();
        let b = repo.ensure("Столовая", Some("с"), None).unwrap();
        assert_eq!(a, b);
        assert_eq!(repo.list_all().unwrap().len(), 1);
    }

    #[test]
    fn test_children_and_code_lookup() {
        let repo = setup();
        let canteen = repo.ensure("Столовая", Some(" С "), None).unwrap();
        repo.ensure("ГЦ", None, Some(canteen)).unwrap();
        repo.ensure("овощи", None, Some(canteen)).unwrap();
        repo.ensure("Курс", Some("к"), None).unwrap();

        let children = repo.list_children(canteen).unwrap();
        assert_eq!(children.len(), 2);
        assert!(children.iter().all(|c| c.parent_id == Some(canteen)));

        assert_eq!(repo.list_top_level().unwrap().len(), 2);
        let found = repo.find_by_code("С").unwrap().unwrap();
        assert_eq!(found.id, canteen);
        assert_eq!(found.code.as_deref(), Some("с"));
        assert_eq!(repo.find_by_code("с").unwrap().unwrap().id, canteen);
        assert!(repo.find_by_code("гбр").unwrap().is_none());
    }

    #[test]
    fn test_unknown_parent_rejected() {
        let repo = setup();
        let err = repo.insert("orphan", None, Some(999)).unwrap_err();
        assert!(matches!(err, RepositoryError::ForeignKeyViolation(_)));
    }
}
