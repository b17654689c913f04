// ==========================================
// Duty Roster Engine - duty API
// ==========================================
// Responsibility: manual allocation trigger and duty-day queries
// Rule: forced re-allocation is limited to admins and sergeants
// ==========================================

use std::sync::Arc;

use chrono::NaiveDate;
use serde::Serialize;
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::domain::assignment::{AssignmentHistoryRecord, ShiftAssignment, StationAssignment};
use crate::domain::types::ActorRole;
use crate::engine::orchestrator::{AllocationOrchestrator, AllocationReport};
use crate::engine::repositories::DutyRepositories;

/// The people sharing one of a person's assignments on a day.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DutyMates {
    pub category: String,
    pub cohort: i32,
    pub shift: Option<i32>,
    pub station: Option<String>,
    pub mates: Vec<String>,
}

pub struct DutyApi {
    orchestrator: Arc<AllocationOrchestrator>,
    repos: DutyRepositories,
}

impl DutyApi {
    pub fn new(orchestrator: Arc<AllocationOrchestrator>, repos: DutyRepositories) -> Self {
        Self { orchestrator, repos }
    }

    fn authorize(actor: ActorRole, force: bool) -> ApiResult<()> {
        let allowed = if force {
            actor.can_force_allocation()
        } else {
            actor.can_trigger_allocation()
        };
        if allowed {
            return Ok(());
        }
        warn!(role = actor.as_str(), force, "allocation trigger refused");
        Err(ApiError::Unauthorized {
            role: actor.to_string(),
            action: if force {
                "force re-allocation".to_string()
            } else {
                "trigger allocation".to_string()
            },
        })
    }

    /// Manual trigger; runs on the calling thread.
    pub fn trigger_allocation(&self, actor: ActorRole, date: NaiveDate, force: bool) -> ApiResult<AllocationReport> {
        Self::authorize(actor, force)?;
        info!(role = actor.as_str(), date = %date, force, "manual allocation triggered");
        Ok(self.orchestrator.run_for_date(date, force)?)
    }

    /// Manual trigger from async callers; the work runs on the blocking pool.
    pub async fn trigger_allocation_async(
        &self,
        actor: ActorRole,
        date: NaiveDate,
        force: bool,
    ) -> ApiResult<AllocationReport> {
        Self::authorize(actor, force)?;
        info!(role = actor.as_str(), date = %date, force, "manual allocation triggered");
        Ok(self.orchestrator.run_for_date_async(date, force).await?)
    }

    pub fn shifts_for_date(&self, date: NaiveDate) -> ApiResult<Vec<ShiftAssignment>> {
        Ok(self.repos.assignment_repo.list_shifts_for_date(date)?)
    }

    pub fn stations_for_date(&self, date: NaiveDate) -> ApiResult<Vec<StationAssignment>> {
        Ok(self.repos.assignment_repo.list_stations_for_date(date)?)
    }

    pub fn history_for_date(&self, date: NaiveDate) -> ApiResult<Vec<AssignmentHistoryRecord>> {
        Ok(self.repos.history_repo.list_for_date(date)?)
    }

    /// Who else is on the same shift or station as `person` on `date`.
    pub fn with_whom(&self, person: &str, date: NaiveDate) -> ApiResult<Vec<DutyMates>> {
        let mut out = Vec::new();

        let shifts = self.shifts_for_date(date)?;
        for mine in shifts.iter().filter(|a| a.person == person) {
            out.push(DutyMates {
                category: mine.category.clone(),
                cohort: mine.cohort,
                shift: Some(mine.shift),
                station: None,
                mates: shifts
                    .iter()
                    .filter(|a| {
                        a.person != person
                            && a.category == mine.category
                            && a.cohort == mine.cohort
                            && a.shift == mine.shift
                    })
                    .map(|a| a.person.clone())
                    .collect(),
            });
        }

        let stations = self.stations_for_date(date)?;
        for mine in stations.iter().filter(|a| a.person == person) {
            out.push(DutyMates {
                category: mine.category.clone(),
                cohort: mine.cohort,
                shift: None,
                station: Some(mine.station.clone()),
                mates: stations
                    .iter()
                    .filter(|a| {
                        a.person != person
                            && a.category == mine.category
                            && a.cohort == mine.cohort
                            && a.station == mine.station
                    })
                    .map(|a| a.person.clone())
                    .collect(),
            });
        }

        if out.is_empty() {
            return Err(ApiError::NotFound(format!("no assignment for {} on {}", person, date)));
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigManager;
    use crate::domain::roster::RosterEntry;
    use crate::domain::types::Gender;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn day() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 11, 3).unwrap()
    }

    fn setup() -> DutyApi {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repos = DutyRepositories::from_connection(conn.clone());
        let config = Arc::new(ConfigManager::from_connection(conn));
        let orchestrator = Arc::new(AllocationOrchestrator::new(repos.clone(), config));

        let entries: Vec<RosterEntry> = ["А", "Б", "В", "Г"]
            .iter()
            .map(|p| RosterEntry {
                person: p.to_string(),
                date: day(),
                category: "гбр".to_string(),
                group_name: "201".to_string(),
                gender: Gender::Male,
                cohort: 2023,
            })
            .collect();
        repos.roster_repo.insert_entries(&entries).unwrap();
        DutyApi::new(orchestrator, repos)
    }

    #[test]
    fn test_trigger_permissions() {
        let api = setup();
        assert!(matches!(
            api.trigger_allocation(ActorRole::User, day(), false),
            Err(ApiError::Unauthorized { .. })
        ));
        assert!(matches!(
            api.trigger_allocation(ActorRole::Assistant, day(), true),
            Err(ApiError::Unauthorized { .. })
        ));
        assert!(api.shifts_for_date(day()).unwrap().is_empty());

        let report = api.trigger_allocation(ActorRole::Assistant, day(), false).unwrap();
        assert_eq!(report.allocated(), 1);
        let forced = api.trigger_allocation(ActorRole::Sergeant, day(), true).unwrap();
        assert_eq!(forced.allocated(), 1);
        assert_eq!(api.history_for_date(day()).unwrap().len(), 4);
    }

    #[test]
    fn test_with_whom_lists_shift_partner() {
        let api = setup();
        api.trigger_allocation(ActorRole::Admin, day(), false).unwrap();

        let shifts = api.shifts_for_date(day()).unwrap();
        let me = &shifts[0];
        let mates = api.with_whom(&me.person, day()).unwrap();
        assert_eq!(mates.len(), 1);
        assert_eq!(mates[0].shift, Some(me.shift));
        // rapid reaction works in pairs
        assert_eq!(mates[0].mates.len(), 1);
        assert!(!mates[0].mates.contains(&me.person));

        assert!(matches!(api.with_whom("Никто", day()), Err(ApiError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_async_trigger_runs_on_blocking_pool() {
        let api = setup();
        let report = api
            .trigger_allocation_async(ActorRole::Admin, day(), false)
            .await
            .unwrap();
        assert_eq!(report.allocated(), 1);
    }
}
