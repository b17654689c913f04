// ==========================================
// Duty Roster Engine - distribution scheduler
// ==========================================
// Polls every poll_interval_secs; inside the window
// [duty_start - lead, duty_start - lead + window] it allocates the duty that
// starts `lead` after the window opened, which may be tomorrow's.
// A second tick inside the same window is a no-op (storage guard).
// ==========================================

use std::sync::Arc;
use std::time::Duration;

use chrono::{Local, NaiveDate, NaiveDateTime, NaiveTime};
use tokio::task::JoinHandle;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, error, info, warn};

use crate::config::{ConfigManager, SchedulerSettings};
use crate::engine::orchestrator::AllocationOrchestrator;

/// Start and end (inclusive) of the daily distribution window.
pub fn distribution_window(settings: &SchedulerSettings) -> (NaiveTime, NaiveTime) {
    let start = settings.duty_start - chrono::Duration::minutes(settings.lead_minutes);
    let end = start + chrono::Duration::minutes(settings.window_minutes);
    (start, end)
}

/// True when `now` falls inside the distribution window (bounds included).
pub fn is_in_distribution_window(now: NaiveTime, settings: &SchedulerSettings) -> bool {
    let (start, end) = distribution_window(settings);
    if start <= end {
        now >= start && now <= end
    } else {
        // window crosses midnight
        now >= start || now <= end
    }
}

/// Date of the duty the window around `now` leads up to.
///
/// Only meaningful while `now` is inside the window.
pub fn target_duty_date(now: NaiveDateTime, settings: &SchedulerSettings) -> NaiveDate {
    let (start, _) = distribution_window(settings);
    let mut since_start = now.time().signed_duration_since(start);
    if since_start < chrono::Duration::zero() {
        since_start += chrono::Duration::days(1);
    }
    let opened = now - since_start;
    (opened + chrono::Duration::minutes(settings.lead_minutes)).date()
}

pub struct DistributionScheduler {
    orchestrator: Arc<AllocationOrchestrator>,
    config: Arc<ConfigManager>,
}

impl DistributionScheduler {
    pub fn new(orchestrator: Arc<AllocationOrchestrator>, config: Arc<ConfigManager>) -> Self {
        Self { orchestrator, config }
    }

    /// Spawns the poll loop on the current tokio runtime.
    pub fn spawn(self: Arc<Self>) -> JoinHandle<()> {
        let settings = self.config.load_scheduler_settings().unwrap_or_else(|e| {
            warn!(error = %e, "failed to read scheduler settings, using defaults");
            SchedulerSettings::default()
        });
        let (start, end) = distribution_window(&settings);
        info!(
            poll_interval_secs = settings.poll_interval_secs,
            window_start = %start,
            window_end = %end,
            "starting distribution scheduler"
        );

        tokio::spawn(async move {
            let mut timer = interval(Duration::from_secs(settings.poll_interval_secs));
            timer.set_missed_tick_behavior(MissedTickBehavior::Skip);
            let mut last_run: Option<NaiveDate> = None;

            loop {
                timer.tick().await;
                last_run = self.tick(Local::now().naive_local(), last_run).await;
            }
        })
    }

    /// One poll. Returns the duty date of the most recent allocation pass.
    pub async fn tick(&self, now: NaiveDateTime, last_run: Option<NaiveDate>) -> Option<NaiveDate> {
        let settings = match self.config.load_scheduler_settings() {
            Ok(s) => s,
            Err(e) => {
                error!(error = %e, "failed to read scheduler settings");
                return last_run;
            }
        };
        if !is_in_distribution_window(now.time(), &settings) {
            debug!(now = %now, "outside distribution window");
            return last_run;
        }
        let duty_date = target_duty_date(now, &settings);
        if last_run == Some(duty_date) {
            debug!(date = %duty_date, "already distributed in this window");
            return last_run;
        }

        match self.orchestrator.run_for_date_async(duty_date, false).await {
            Ok(report) => {
                info!(
                    date = %duty_date,
                    run_id = %report.run_id,
                    allocated = report.allocated(),
                    failed = report.failed(),
                    "scheduled distribution finished"
                );
                Some(duty_date)
            }
            Err(e) => {
                error!(date = %duty_date, error = %e, "scheduled distribution failed");
                last_run
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::config_keys;
    use crate::domain::roster::RosterEntry;
    use crate::domain::types::Gender;
    use crate::engine::repositories::DutyRepositories;
    use rusqlite::Connection;
    use std::sync::Mutex;

    fn t(h: u32, m: u32) -> NaiveTime {
        NaiveTime::from_hms_opt(h, m, 0).unwrap()
    }

    #[test]
    fn test_default_window_is_inclusive() {
        let s = SchedulerSettings::default();
        assert_eq!(distribution_window(&s), (t(15, 30), t(15, 35)));
        assert!(!is_in_distribution_window(t(15, 29), &s));
        assert!(is_in_distribution_window(t(15, 30), &s));
        assert!(is_in_distribution_window(t(15, 35), &s));
        assert!(!is_in_distribution_window(t(15, 36), &s));
    }

    #[test]
    fn test_window_across_midnight() {
        let s = SchedulerSettings {
            duty_start: t(1, 0),
            lead_minutes: 65,
            window_minutes: 10,
            poll_interval_secs: 60,
        };
        assert_eq!(distribution_window(&s), (t(23, 55), t(0, 5)));
        assert!(is_in_distribution_window(t(23, 58), &s));
        assert!(is_in_distribution_window(t(0, 3), &s));
        assert!(!is_in_distribution_window(t(0, 6), &s));
    }

    #[test]
    fn test_target_duty_date() {
        let d = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        let next = d.succ_opt().unwrap();
        assert_eq!(target_duty_date(d.and_time(t(15, 31)), &SchedulerSettings::default()), d);

        let s = SchedulerSettings {
            duty_start: t(1, 0),
            lead_minutes: 65,
            window_minutes: 10,
            poll_interval_secs: 60,
        };
        assert_eq!(target_duty_date(d.and_time(t(23, 58)), &s), next);
        assert_eq!(target_duty_date(next.and_time(t(0, 3)), &s), next);
    }

    struct Fixture {
        repos: DutyRepositories,
        config: Arc<ConfigManager>,
        scheduler: DistributionScheduler,
    }

    fn setup() -> Fixture {
        let conn = Connection::open_in_memory().unwrap();
        crate::db::init_schema(&conn).unwrap();
        let conn = Arc::new(Mutex::new(conn));
        let repos = DutyRepositories::from_connection(conn.clone());
        let config = Arc::new(ConfigManager::from_connection(conn));
        let orchestrator = Arc::new(AllocationOrchestrator::new(repos.clone(), config.clone()));
        let scheduler = DistributionScheduler::new(orchestrator, config.clone());
        Fixture {
            repos,
            config,
            scheduler,
        }
    }

    fn roster(f: &Fixture, date: NaiveDate, person: &str) {
        f.repos
            .roster_repo
            .insert_entries(&[RosterEntry {
                person: person.to_string(),
                date,
                category: "к".to_string(),
                group_name: "301".to_string(),
                gender: Gender::Male,
                cohort: 2022,
            }])
            .unwrap();
    }

    #[tokio::test]
    async fn test_tick_runs_once_per_window() {
        let f = setup();
        let today = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        roster(&f, today, "А");

        assert_eq!(f.scheduler.tick(today.and_time(t(12, 0)), None).await, None);
        assert_eq!(f.repos.history_repo.count_for(today, "к", 2022).unwrap(), 0);

        assert_eq!(f.scheduler.tick(today.and_time(t(15, 31)), None).await, Some(today));
        assert_eq!(f.repos.assignment_repo.count_shift_assignments(today, "к", 2022).unwrap(), 1);
        assert_eq!(
            f.scheduler.tick(today.and_time(t(15, 35)), Some(today)).await,
            Some(today)
        );
        assert_eq!(f.repos.history_repo.count_for(today, "к", 2022).unwrap(), 1);
    }

    #[tokio::test]
    async fn test_window_across_midnight_allocates_next_duty_once() {
        let f = setup();
        f.config.set_global_config_value(config_keys::DUTY_START_TIME, "01:00").unwrap();
        f.config
            .set_global_config_value(config_keys::DISTRIBUTION_LEAD_MINUTES, "65")
            .unwrap();
        f.config
            .set_global_config_value(config_keys::DISTRIBUTION_WINDOW_MINUTES, "10")
            .unwrap();

        let today = NaiveDate::from_ymd_opt(2025, 12, 1).unwrap();
        let tomorrow = today.succ_opt().unwrap();
        roster(&f, today, "А");
        roster(&f, tomorrow, "Б");

        let last = f.scheduler.tick(today.and_time(t(23, 58)), None).await;
        assert_eq!(last, Some(tomorrow));
        assert_eq!(f.repos.assignment_repo.count_shift_assignments(tomorrow, "к", 2022).unwrap(), 1);
        assert_eq!(f.repos.assignment_repo.count_shift_assignments(today, "к", 2022).unwrap(), 0);

        let last = f.scheduler.tick(tomorrow.and_time(t(0, 3)), last).await;
        assert_eq!(last, Some(tomorrow));
        assert_eq!(f.repos.assignment_repo.count_shift_assignments(today, "к", 2022).unwrap(), 0);
        assert_eq!(f.repos.history_repo.list_for_date(tomorrow).unwrap().len(), 1);
    }
}
