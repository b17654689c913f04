// ==========================================
// Duty Roster Engine - SQLite connection and schema
// ==========================================
// Goals:
// - every Connection::open goes through the same PRAGMAs
// - busy_timeout set per connection to absorb concurrent writers
// - uniqueness constraints close the check-then-insert race at storage level
// ==========================================

use rusqlite::Connection;
use rusqlite::OptionalExtension;
use std::time::Duration;

/// Default busy_timeout (ms)
pub const DEFAULT_BUSY_TIMEOUT_MS: u64 = 5_000;

/// Schema version written by [`init_schema`]
pub const CURRENT_SCHEMA_VERSION: i64 = 2;

/// Applies the shared PRAGMAs.
///
/// foreign_keys and busy_timeout are per-connection settings.
pub fn configure_sqlite_connection(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch("PRAGMA foreign_keys = ON;")?;
    conn.busy_timeout(Duration::from_millis(DEFAULT_BUSY_TIMEOUT_MS))?;
    Ok(())
}

/// Opens a SQLite connection with the shared configuration.
pub fn open_sqlite_connection(db_path: &str) -> rusqlite::Result<Connection> {
    let conn = Connection::open(db_path)?;
    configure_sqlite_connection(&conn)?;
    Ok(conn)
}

/// Creates every table and index used by the engine. Idempotent.
pub fn init_schema(conn: &Connection) -> rusqlite::Result<()> {
    conn.execute_batch(
        r#"
        CREATE TABLE IF NOT EXISTS schema_version (
            version INTEGER PRIMARY KEY,
            applied_at TEXT NOT NULL DEFAULT (datetime('now'))
        );

        CREATE TABLE IF NOT EXISTS config_kv (
            scope_id TEXT NOT NULL DEFAULT 'global',
            key TEXT NOT NULL,
            value TEXT NOT NULL,
            updated_at TEXT NOT NULL DEFAULT (datetime('now')),
            PRIMARY KEY (scope_id, key)
        );

        CREATE TABLE IF NOT EXISTS person (
            person TEXT NOT NULL,
            cohort INTEGER NOT NULL,
            global_score REAL NOT NULL DEFAULT 0,
            PRIMARY KEY (person, cohort)
        );

        CREATE TABLE IF NOT EXISTS duty_category (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            name TEXT NOT NULL UNIQUE,
            code TEXT,
            parent_id INTEGER REFERENCES duty_category(id) ON DELETE RESTRICT
        );

        CREATE TABLE IF NOT EXISTS category_weight (
            category_id INTEGER PRIMARY KEY REFERENCES duty_category(id) ON DELETE CASCADE,
            weight REAL NOT NULL,
            computed_at TEXT NOT NULL
        );

        -- no foreign keys on purpose: stale votes must not block the survey
        CREATE TABLE IF NOT EXISTS pairwise_vote (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            voter_id INTEGER NOT NULL,
            category_a INTEGER NOT NULL,
            category_b INTEGER NOT NULL,
            verdict TEXT NOT NULL CHECK (verdict IN ('a', 'b', 'equal')),
            stage TEXT NOT NULL,
            voted_at TEXT NOT NULL,
            CHECK (category_a < category_b),
            UNIQUE (voter_id, category_a, category_b, stage)
        );

        CREATE TABLE IF NOT EXISTS duty_roster (
            person TEXT NOT NULL,
            date TEXT NOT NULL CHECK (date LIKE '____-__-__'),
            category TEXT NOT NULL,
            group_name TEXT NOT NULL,
            gender TEXT NOT NULL DEFAULT 'male' CHECK (gender IN ('male', 'female')),
            cohort INTEGER NOT NULL,
            UNIQUE (person, date, cohort) ON CONFLICT REPLACE
        );

        CREATE TABLE IF NOT EXISTS shift_assignment (
            date TEXT NOT NULL,
            category TEXT NOT NULL,
            cohort INTEGER NOT NULL,
            person TEXT NOT NULL,
            shift INTEGER NOT NULL CHECK (shift >= 0),
            PRIMARY KEY (date, category, cohort, person)
        );

        CREATE TABLE IF NOT EXISTS station_assignment (
            date TEXT NOT NULL,
            category TEXT NOT NULL,
            cohort INTEGER NOT NULL,
            person TEXT NOT NULL,
            station TEXT NOT NULL,
            PRIMARY KEY (date, category, cohort, person)
        );

        CREATE TABLE IF NOT EXISTS assignment_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person TEXT NOT NULL,
            date TEXT NOT NULL,
            category TEXT NOT NULL,
            cohort INTEGER NOT NULL,
            shift INTEGER,
            station TEXT,
            recorded_at TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_roster_date ON duty_roster (date);
        CREATE INDEX IF NOT EXISTS idx_roster_date_category ON duty_roster (date, category, cohort);
        CREATE INDEX IF NOT EXISTS idx_vote_stage ON pairwise_vote (stage);
        CREATE INDEX IF NOT EXISTS idx_history_person ON assignment_history (person, category, cohort, date);
        CREATE INDEX IF NOT EXISTS idx_history_key ON assignment_history (person, date, category, cohort, id);
        CREATE INDEX IF NOT EXISTS idx_category_parent ON duty_category (parent_id);
        "#,
    )?;

    if read_schema_version(conn)? == Some(1) {
        migrate_history_ledger(conn)?;
    }

    conn.execute(
        "INSERT OR IGNORE INTO schema_version (version) VALUES (?1)",
        [CURRENT_SCHEMA_VERSION],
    )?;
    Ok(())
}

/// v1 -> v2: the ledger held one row per (person, date, category, cohort),
/// so a forced re-run could not record a changed shift or station.
fn migrate_history_ledger(conn: &Connection) -> rusqlite::Result<()> {
    tracing::info!("migrating assignment_history to schema v2");
    conn.execute_batch(
        r#"
        BEGIN IMMEDIATE;
        ALTER TABLE assignment_history RENAME TO assignment_history_v1;
        CREATE TABLE assignment_history (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            person TEXT NOT NULL,
            date TEXT NOT NULL,
            category TEXT NOT NULL,
            cohort INTEGER NOT NULL,
            shift INTEGER,
            station TEXT,
            recorded_at TEXT NOT NULL
        );
        INSERT INTO assignment_history (id, person, date, category, cohort, shift, station, recorded_at)
            SELECT id, person, date, category, cohort, shift, station, recorded_at FROM assignment_history_v1;
        DROP TABLE assignment_history_v1;
        CREATE INDEX IF NOT EXISTS idx_history_person ON assignment_history (person, category, cohort, date);
        CREATE INDEX IF NOT EXISTS idx_history_key ON assignment_history (person, date, category, cohort, id);
        COMMIT;
        "#,
    )
}

/// Reads schema_version (None when the table does not exist)
pub fn read_schema_version(conn: &Connection) -> rusqlite::Result<Option<i64>> {
    let has_table: bool = conn
        .query_row(
            "SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version' LIMIT 1",
            [],
            |_row| Ok(true),
        )
        .optional()?
        .unwrap_or(false);

    if !has_table {
        return Ok(None);
    }

    let v: Option<i64> = conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| row.get(0))?;
    Ok(v)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_schema_is_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        configure_sqlite_connection(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), None);

        init_schema(&conn).unwrap();
        init_schema(&conn).unwrap();

        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));
    }

    #[test]
    fn test_v1_ledger_is_migrated() {
        let conn = Connection::open_in_memory().unwrap();
        conn.execute_batch(
            r#"
            CREATE TABLE schema_version (
                version INTEGER PRIMARY KEY,
                applied_at TEXT NOT NULL DEFAULT (datetime('now'))
            );
            INSERT INTO schema_version (version) VALUES (1);
            CREATE TABLE assignment_history (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                person TEXT NOT NULL,
                date TEXT NOT NULL,
                category TEXT NOT NULL,
                cohort INTEGER NOT NULL,
                shift INTEGER,
                station TEXT,
                recorded_at TEXT NOT NULL,
                UNIQUE (person, date, category, cohort)
            );
            INSERT INTO assignment_history (person, date, category, cohort, station, recorded_at)
                VALUES ('А', '2025-05-01', 'с', 2023, 'ГЦ', '2025-05-01 15:30:00');
            "#,
        )
        .unwrap();

        init_schema(&conn).unwrap();
        assert_eq!(read_schema_version(&conn).unwrap(), Some(CURRENT_SCHEMA_VERSION));

        // a second row for the same day is now accepted
        conn.execute(
            "INSERT INTO assignment_history (person, date, category, cohort, station, recorded_at)
             VALUES ('А', '2025-05-01', 'с', 2023, 'овощи', '2025-05-01 15:40:00')",
            [],
        )
        .unwrap();
        let n: i64 = conn
            .query_row("SELECT COUNT(*) FROM assignment_history", [], |row| row.get(0))
            .unwrap();
        assert_eq!(n, 2);

        // re-running on a migrated database is a no-op
        init_schema(&conn).unwrap();
    }

    #[test]
    fn test_vote_pair_must_be_ordered() {
        let conn = Connection::open_in_memory().unwrap();
        init_schema(&conn).unwrap();

        let res = conn.execute(
            "INSERT INTO pairwise_vote (voter_id, category_a, category_b, verdict, stage, voted_at)
             VALUES (1, 5, 2, 'a', 'main', '2025-01-01 00:00:00')",
            [],
        );
        assert!(res.is_err());
    }
}
