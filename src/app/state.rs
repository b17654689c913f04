// ==========================================
// Duty Roster Engine - application state
// ==========================================
// Responsibility: open the database once and wire repositories,
// engines and APIs around the shared connection
// ==========================================

use std::sync::{Arc, Mutex};

use crate::api::{DutyApi, SurveyApi};
use crate::app::scheduler::DistributionScheduler;
use crate::config::ConfigManager;
use crate::db::{init_schema, open_sqlite_connection};
use crate::engine::{AllocationOrchestrator, DutyRepositories, WeightCalculator};

/// Shared services of one process.
pub struct AppState {
    pub db_path: String,
    pub config_manager: Arc<ConfigManager>,
    pub repos: DutyRepositories,
    pub weight_calculator: Arc<WeightCalculator>,
    pub orchestrator: Arc<AllocationOrchestrator>,
    pub survey_api: Arc<SurveyApi>,
    pub duty_api: Arc<DutyApi>,
}

impl AppState {
    /// Opens (and if needed creates) the database at `db_path`.
    pub fn new(db_path: String) -> Result<Self, String> {
        tracing::info!(db_path = %db_path, "initializing application state");

        let conn = open_sqlite_connection(&db_path).map_err(|e| format!("cannot open database: {}", e))?;
        init_schema(&conn).map_err(|e| format!("cannot initialize schema: {}", e))?;
        let conn = Arc::new(Mutex::new(conn));

        // ==========================================
        // repositories + config
        // ==========================================
        let repos = DutyRepositories::from_connection(conn.clone());
        let config_manager = Arc::new(ConfigManager::from_connection(conn));

        // ==========================================
        // engines
        // ==========================================
        let weight_calculator = Arc::new(WeightCalculator::new(
            repos.category_repo.clone(),
            repos.vote_repo.clone(),
            repos.weight_repo.clone(),
            config_manager.clone(),
        ));
        let orchestrator = Arc::new(AllocationOrchestrator::new(repos.clone(), config_manager.clone()));

        // ==========================================
        // APIs
        // ==========================================
        let survey_api = Arc::new(SurveyApi::new(
            repos.vote_repo.clone(),
            weight_calculator.clone(),
            config_manager.clone(),
        ));
        let duty_api = Arc::new(DutyApi::new(orchestrator.clone(), repos.clone()));

        Ok(Self {
            db_path,
            config_manager,
            repos,
            weight_calculator,
            orchestrator,
            survey_api,
            duty_api,
        })
    }

    pub fn scheduler(&self) -> Arc<DistributionScheduler> {
        Arc::new(DistributionScheduler::new(
            self.orchestrator.clone(),
            self.config_manager.clone(),
        ))
    }
}

// ==========================================
// Default database path
// ==========================================

/// Database path: `DUTY_DB_PATH` when set, otherwise
/// `<data dir>/duty-roster/duty_roster.db`, falling back to the working directory.
pub fn get_default_db_path() -> String {
    use std::path::PathBuf;

    if let Ok(path) = std::env::var("DUTY_DB_PATH") {
        let trimmed = path.trim();
        if !trimmed.is_empty() {
            return trimmed.to_string();
        }
    }

    let mut path = PathBuf::from("./duty_roster.db");
    if let Some(data_dir) = dirs::data_dir() {
        let dir = data_dir.join("duty-roster");
        if std::fs::create_dir_all(&dir).is_ok() {
            path = dir.join("duty_roster.db");
        }
    }

    path.to_string_lossy().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_get_default_db_path() {
        let path = get_default_db_path();
        assert!(!path.is_empty());
        assert!(path.ends_with(".db"));
    }

    #[test]
    fn test_state_initializes_schema() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state.db").to_string_lossy().to_string();
        let state = AppState::new(path.clone()).unwrap();
        assert_eq!(state.db_path, path);
        assert!(state.repos.category_repo.list_all().unwrap().is_empty());
        // re-opening an initialized database is fine
        assert!(AppState::new(path).is_ok());
    }
}
