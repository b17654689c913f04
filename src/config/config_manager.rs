// ==========================================
// Duty Roster Engine - configuration manager
// ==========================================
// Responsibility: load, query and override configuration
// Storage: config_kv table (key-value + scope, scope_id='global')
// ==========================================

use crate::db::open_sqlite_connection;
use crate::repository::error::{RepositoryError, RepositoryResult};
use chrono::NaiveTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

// ==========================================
// Typed settings
// ==========================================

/// Settings read once per allocation pass.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AllocationSettings {
    /// Station weight at or above which a station counts as heavy
    pub heavy_threshold: f64,
    pub streak_penalty: f64,
    /// Multiplier applied to the externally kept global score
    pub global_score_factor: f64,
    /// History rows consulted per (person, category)
    pub history_depth: usize,
    /// Role codes split into numbered shifts
    pub shift_category_codes: Vec<String>,
    /// Station names used when the canteen category has no child categories
    pub fallback_stations: Vec<String>,
    pub canteen_parent: String,
    pub female_parent: String,
}

impl Default for AllocationSettings {
    fn default() -> Self {
        Self {
            heavy_threshold: 12.0,
            streak_penalty: 5.0,
            global_score_factor: 0.5,
            history_depth: 5,
            shift_category_codes: vec!["к".to_string(), "дк".to_string(), "гбр".to_string()],
            fallback_stations: defaults::CANTEEN_STATIONS.iter().map(|s| s.to_string()).collect(),
            canteen_parent: defaults::CANTEEN_PARENT.to_string(),
            female_parent: defaults::FEMALE_PARENT.to_string(),
        }
    }
}

impl AllocationSettings {
    pub fn is_shift_category(&self, code: &str) -> bool {
        let code = code.trim().to_lowercase();
        self.shift_category_codes.iter().any(|c| c.to_lowercase() == code)
    }
}

/// Settings of the time-triggered poll loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSettings {
    pub duty_start: NaiveTime,
    pub lead_minutes: i64,
    pub window_minutes: i64,
    pub poll_interval_secs: u64,
}

impl Default for SchedulerSettings {
    fn default() -> Self {
        Self {
            duty_start: NaiveTime::from_hms_opt(18, 30, 0).unwrap_or_default(),
            lead_minutes: 180,
            window_minutes: 5,
            poll_interval_secs: 300,
        }
    }
}

// ==========================================
// ConfigManager
// ==========================================
pub struct ConfigManager {
    conn: Arc<Mutex<Connection>>,
}

impl ConfigManager {
    /// Opens its own connection on `db_path`.
    pub fn new(db_path: &str) -> RepositoryResult<Self> {
        let conn = open_sqlite_connection(db_path)
            .map_err(|e| RepositoryError::DatabaseConnectionError(format!("{}: {}", db_path, e)))?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Raw value of a global key.
    pub fn get_global_config_value(&self, key: &str) -> RepositoryResult<Option<String>> {
        let conn = self.get_conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM config_kv WHERE scope_id = 'global' AND key = ?1",
                params![key],
                |row| row.get::<_, String>(0),
            )
            .optional()?;
        Ok(value)
    }

    pub fn set_global_config_value(&self, key: &str, value: &str) -> RepositoryResult<()> {
        let conn = self.get_conn()?;
        conn.execute(
            "INSERT INTO config_kv (scope_id, key, value) VALUES ('global', ?1, ?2)
             ON CONFLICT(scope_id, key) DO UPDATE SET value = ?2, updated_at = datetime('now')",
            params![key, value],
        )?;
        Ok(())
    }

    fn get_config_or_default(&self, key: &str, default: &str) -> RepositoryResult<String> {
        Ok(self.get_global_config_value(key)?.unwrap_or_else(|| default.to_string()))
    }

    /// Parses a key, logging and falling back to `default` on malformed values.
    fn get_parsed<T: std::str::FromStr + Copy + std::fmt::Display>(&self, key: &str, default: T) -> RepositoryResult<T> {
        let raw = self.get_config_or_default(key, &default.to_string())?;
        Ok(raw.trim().parse::<T>().unwrap_or_else(|_| {
            tracing::warn!(config_key = key, raw_value = %raw, "malformed config value, using default");
            default
        }))
    }

    fn get_list(&self, key: &str, default: &[&str]) -> RepositoryResult<Vec<String>> {
        let raw = self.get_config_or_default(key, &default.join(","))?;
        let items: Vec<String> = raw
            .split(',')
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        if items.is_empty() {
            Ok(default.iter().map(|s| s.to_string()).collect())
        } else {
            Ok(items)
        }
    }

    /// JSON snapshot of every global key, logged alongside allocation runs.
    pub fn get_config_snapshot(&self) -> RepositoryResult<String> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare("SELECT key, value FROM config_kv WHERE scope_id = 'global' ORDER BY key")?;

        let mut config_map: HashMap<String, String> = HashMap::new();
        let rows = stmt.query_map([], |row| Ok((row.get::<_, String>(0)?, row.get::<_, String>(1)?)))?;
        for row in rows {
            let (key, value) = row?;
            config_map.insert(key, value);
        }

        serde_json::to_string(&json!(config_map)).map_err(|e| RepositoryError::InternalError(e.to_string()))
    }

    // ===== allocation =====

    pub fn load_allocation_settings(&self) -> RepositoryResult<AllocationSettings> {
        let d = AllocationSettings::default();
        Ok(AllocationSettings {
            heavy_threshold: self.get_parsed(config_keys::HEAVY_STATION_THRESHOLD, d.heavy_threshold)?,
            streak_penalty: self.get_parsed(config_keys::STREAK_PENALTY, d.streak_penalty)?,
            global_score_factor: self.get_parsed(config_keys::GLOBAL_SCORE_FACTOR, d.global_score_factor)?,
            history_depth: self.get_parsed(config_keys::HISTORY_DEPTH, d.history_depth)?.max(2),
            shift_category_codes: self.get_list(config_keys::SHIFT_CATEGORY_CODES, &["к", "дк", "гбр"])?,
            fallback_stations: self.get_list(config_keys::CANTEEN_STATIONS, &defaults::CANTEEN_STATIONS)?,
            canteen_parent: self.get_config_or_default(config_keys::CANTEEN_PARENT_CATEGORY, defaults::CANTEEN_PARENT)?,
            female_parent: self.get_config_or_default(config_keys::FEMALE_PARENT_CATEGORY, defaults::FEMALE_PARENT)?,
        })
    }

    // ===== scheduler =====

    pub fn load_scheduler_settings(&self) -> RepositoryResult<SchedulerSettings> {
        let d = SchedulerSettings::default();
        let start_raw = self.get_config_or_default(config_keys::DUTY_START_TIME, "18:30")?;
        let duty_start = NaiveTime::parse_from_str(start_raw.trim(), "%H:%M").unwrap_or_else(|_| {
            tracing::warn!(config_key = config_keys::DUTY_START_TIME, raw_value = %start_raw, "malformed duty start time, using 18:30");
            d.duty_start
        });
        Ok(SchedulerSettings {
            duty_start,
            lead_minutes: self.get_parsed(config_keys::DISTRIBUTION_LEAD_MINUTES, d.lead_minutes)?,
            window_minutes: self.get_parsed(config_keys::DISTRIBUTION_WINDOW_MINUTES, d.window_minutes)?,
            poll_interval_secs: self.get_parsed(config_keys::POLL_INTERVAL_SECS, d.poll_interval_secs)?.max(1),
        })
    }
}

// ==========================================
// Default values
// ==========================================
pub mod defaults {
    pub const CANTEEN_PARENT: &str = "Столовая";
    pub const FEMALE_PARENT: &str = "Женский наряд";
    pub const CANTEEN_STATIONS: [&str; 6] = ["ГЦ", "овощи", "тарелки", "железо", "стаканы", "лента"];
}

// ==========================================
// Config keys
// ==========================================
pub mod config_keys {
    // scheduler
    pub const DUTY_START_TIME: &str = "duty_start_time"; // HH:MM
    pub const DISTRIBUTION_LEAD_MINUTES: &str = "distribution_lead_minutes";
    pub const DISTRIBUTION_WINDOW_MINUTES: &str = "distribution_window_minutes";
    pub const POLL_INTERVAL_SECS: &str = "poll_interval_secs";

    // fairness
    pub const HEAVY_STATION_THRESHOLD: &str = "heavy_station_threshold";
    pub const STREAK_PENALTY: &str = "streak_penalty";
    pub const GLOBAL_SCORE_FACTOR: &str = "global_score_factor";
    pub const HISTORY_DEPTH: &str = "history_depth";

    // categories
    pub const SHIFT_CATEGORY_CODES: &str = "shift_category_codes"; // comma separated
    pub const CANTEEN_STATIONS: &str = "canteen_stations"; // comma separated
    pub const CANTEEN_PARENT_CATEGORY: &str = "canteen_parent_category";
    pub const FEMALE_PARENT_CATEGORY: &str = "female_parent_category";
}
