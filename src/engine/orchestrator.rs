// ==========================================
// Duty Roster Engine - allocation orchestrator
// ==========================================
// Flow: roster of the day -> group by (cohort, category)
//       -> shift partitioner | station allocator -> guarded write + ledger
// Rule: one key failing never rolls back another key
// Rule: a key is processed by one caller at a time (in-process lock),
//       storage re-checks inside an IMMEDIATE transaction
// ==========================================

use crate::config::{AllocationSettings, ConfigManager};
use crate::domain::category::DEFAULT_WEIGHT;
use crate::domain::types::{normalize_code, CategoryKind};
use crate::engine::error::{EngineError, EngineResult};
use crate::engine::fairness::{FairnessScoreService, StationWeights};
use crate::engine::permutation::{PermutationSource, RngPermutation};
use crate::engine::repositories::DutyRepositories;
use crate::engine::shift_partitioner::ShiftPartitioner;
use crate::engine::station_allocator::{ScoredPerson, StationAllocator, WeightedStation};
use crate::repository::WriteOutcome;
use chrono::{Local, NaiveDate, NaiveDateTime};
use serde::Serialize;
use std::collections::{BTreeMap, HashMap};
use std::sync::{Arc, Mutex};
use tracing::{debug, error, info, info_span, warn};
use uuid::Uuid;

// ==========================================
// Outcome types
// ==========================================

/// One unit of allocation work.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct AllocationKey {
    pub date: NaiveDate,
    pub category: String,
    pub cohort: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum KeyStatus {
    Allocated { rows: usize, history_appended: usize },
    AlreadyAllocated { existing: usize },
    Skipped { reason: String },
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KeyOutcome {
    pub key: AllocationKey,
    pub status: KeyStatus,
}

#[derive(Debug, Clone, Serialize)]
pub struct AllocationReport {
    pub run_id: String,
    pub date: NaiveDate,
    pub forced: bool,
    pub outcomes: Vec<KeyOutcome>,
}

impl AllocationReport {
    pub fn allocated(&self) -> usize {
        self.count(|s| matches!(s, KeyStatus::Allocated { .. }))
    }

    pub fn already_allocated(&self) -> usize {
        self.count(|s| matches!(s, KeyStatus::AlreadyAllocated { .. }))
    }

    pub fn failed(&self) -> usize {
        self.count(|s| matches!(s, KeyStatus::Failed { .. }))
    }

    pub fn status_of(&self, category: &str, cohort: i32) -> Option<&KeyStatus> {
        self.outcomes
            .iter()
            .find(|o| o.key.category == category && o.key.cohort == cohort)
            .map(|o| &o.status)
    }

    fn count(&self, pred: impl Fn(&KeyStatus) -> bool) -> usize {
        self.outcomes.iter().filter(|o| pred(&o.status)).count()
    }
}

// ==========================================
// Per-key lock set
// ==========================================

#[derive(Default)]
struct KeyLocks {
    inner: Mutex<HashMap<AllocationKey, Arc<Mutex<()>>>>,
}

impl KeyLocks {
    fn lock_for(&self, key: &AllocationKey) -> EngineResult<Arc<Mutex<()>>> {
        let mut map = self
            .inner
            .lock()
            .map_err(|e| EngineError::Worker(format!("key lock set poisoned: {}", e)))?;
        Ok(map.entry(key.clone()).or_default().clone())
    }
}

enum SplitMode {
    Shifts,
    Stations,
}

// ==========================================
// AllocationOrchestrator
// ==========================================
pub struct AllocationOrchestrator {
    repos: DutyRepositories,
    config: Arc<ConfigManager>,
    fairness: FairnessScoreService,
    partitioner: ShiftPartitioner,
    allocator: StationAllocator,
    locks: KeyLocks,
}

impl AllocationOrchestrator {
    pub fn new(repos: DutyRepositories, config: Arc<ConfigManager>) -> Self {
        let fairness = FairnessScoreService::new(
            repos.person_repo.clone(),
            repos.history_repo.clone(),
            repos.category_repo.clone(),
            repos.weight_repo.clone(),
        );
        Self {
            repos,
            config,
            fairness,
            partitioner: ShiftPartitioner::new(),
            allocator: StationAllocator::new(),
            locks: KeyLocks::default(),
        }
    }

    pub fn fairness(&self) -> &FairnessScoreService {
        &self.fairness
    }

    /// Allocates every (cohort, category) of `date` with the thread RNG.
    pub fn run_for_date(&self, date: NaiveDate, force: bool) -> EngineResult<AllocationReport> {
        let mut perm = RngPermutation::thread();
        self.run_for_date_with(date, force, &mut perm, Local::now().naive_local())
    }

    /// Runs [`Self::run_for_date`] on the blocking thread pool.
    pub async fn run_for_date_async(self: &Arc<Self>, date: NaiveDate, force: bool) -> EngineResult<AllocationReport> {
        let this = Arc::clone(self);
        tokio::task::spawn_blocking(move || this.run_for_date(date, force))
            .await
            .map_err(|e| EngineError::Worker(e.to_string()))?
    }

    /// Allocates every (cohort, category) of `date`.
    ///
    /// Storage failures are reported per key as [`KeyStatus::Failed`]; only a
    /// failure to read the day's roster or settings fails the whole run.
    pub fn run_for_date_with<P: PermutationSource>(
        &self,
        date: NaiveDate,
        force: bool,
        perm: &mut P,
        now: NaiveDateTime,
    ) -> EngineResult<AllocationReport> {
        let run_id = Uuid::new_v4().to_string();
        let span = info_span!("allocation", run_id = %run_id, date = %date, force);
        let _enter = span.enter();

        let settings = self.config.load_allocation_settings()?;
        if let Ok(snapshot) = self.config.get_config_snapshot() {
            debug!(config = %snapshot, "allocation settings");
        }

        let mut groups: BTreeMap<(i32, String), Vec<String>> = BTreeMap::new();
        for entry in self.repos.roster_repo.list_for_date(date)? {
            groups
                .entry((entry.cohort, normalize_code(&entry.category)))
                .or_default()
                .push(entry.person);
        }
        if groups.is_empty() {
            info!("no roster for the day, nothing to allocate");
        }

        let mut outcomes = Vec::with_capacity(groups.len());
        for ((cohort, category), people) in groups {
            let key = AllocationKey { date, category, cohort };
            let status = match self.allocate_group(&key, &people, force, perm, now, &settings) {
                Ok(status) => status,
                Err(e) => {
                    error!(category = %key.category, cohort = key.cohort, error = %e, "allocation failed");
                    KeyStatus::Failed { reason: e.to_string() }
                }
            };
            outcomes.push(KeyOutcome { key, status });
        }

        let report = AllocationReport {
            run_id,
            date,
            forced: force,
            outcomes,
        };
        info!(
            keys = report.outcomes.len(),
            allocated = report.allocated(),
            already_allocated = report.already_allocated(),
            failed = report.failed(),
            "allocation pass finished"
        );
        Ok(report)
    }

    /// Allocates a single key from the stored roster.
    pub fn allocate_key<P: PermutationSource>(
        &self,
        key: &AllocationKey,
        force: bool,
        perm: &mut P,
        now: NaiveDateTime,
    ) -> EngineResult<KeyStatus> {
        let settings = self.config.load_allocation_settings()?;
        let key = AllocationKey {
            category: normalize_code(&key.category),
            ..key.clone()
        };
        let people: Vec<String> = self
            .repos
            .roster_repo
            .list_for(key.date, &key.category, key.cohort)?
            .into_iter()
            .map(|e| e.person)
            .collect();
        self.allocate_group(&key, &people, force, perm, now, &settings)
    }

    fn allocate_group<P: PermutationSource>(
        &self,
        key: &AllocationKey,
        people: &[String],
        force: bool,
        perm: &mut P,
        now: NaiveDateTime,
        settings: &AllocationSettings,
    ) -> EngineResult<KeyStatus> {
        if people.is_empty() {
            return Ok(KeyStatus::Skipped {
                reason: "empty roster".to_string(),
            });
        }
        let mode = if settings.is_shift_category(&key.category) {
            SplitMode::Shifts
        } else if CategoryKind::from_code(&key.category) == CategoryKind::Canteen {
            SplitMode::Stations
        } else {
            debug!(category = %key.category, cohort = key.cohort, "category has no fine-grained split");
            return Ok(KeyStatus::Skipped {
                reason: "category has no shifts or stations".to_string(),
            });
        };

        let lock = self.locks.lock_for(key)?;
        let _guard = lock
            .lock()
            .map_err(|e| EngineError::Worker(format!("key lock poisoned: {}", e)))?;

        let assignments = &self.repos.assignment_repo;
        if !force {
            let existing = match mode {
                SplitMode::Shifts => assignments.count_shift_assignments(key.date, &key.category, key.cohort)?,
                SplitMode::Stations => assignments.count_station_assignments(key.date, &key.category, key.cohort)?,
            };
            if existing > 0 {
                info!(category = %key.category, cohort = key.cohort, existing, "already allocated, skipping");
                return Ok(KeyStatus::AlreadyAllocated { existing });
            }
        }

        let outcome = match mode {
            SplitMode::Shifts => {
                let rows = self
                    .partitioner
                    .partition(key.date, &key.category, key.cohort, people, perm);
                assignments.write_shift_allocation(key.date, &key.category, key.cohort, &rows, force, now)?
            }
            SplitMode::Stations => {
                let stations = self.resolve_stations(&key.category, settings)?;
                let weights = StationWeights::new(stations.iter().map(|s| (s.name.clone(), s.weight)).collect());
                let mut scored = Vec::with_capacity(people.len());
                for person in people {
                    let score = self
                        .fairness
                        .score_with(person, &key.category, key.cohort, key.date, &weights, settings)?;
                    scored.push(ScoredPerson {
                        person: person.clone(),
                        score,
                    });
                }
                let rows = self
                    .allocator
                    .allocate(key.date, &key.category, key.cohort, scored, stations)?;
                assignments.write_station_allocation(key.date, &key.category, key.cohort, &rows, force, now)?
            }
        };

        Ok(match outcome {
            WriteOutcome::Written { rows, history_appended } => {
                info!(category = %key.category, cohort = key.cohort, rows, history_appended, "allocated");
                KeyStatus::Allocated { rows, history_appended }
            }
            WriteOutcome::AlreadyAllocated { existing } => {
                info!(category = %key.category, cohort = key.cohort, existing, "allocated concurrently, skipping");
                KeyStatus::AlreadyAllocated { existing }
            }
        })
    }

    /// Child categories of the station-bearing category, or the configured
    /// fallback list when it has none.
    fn resolve_stations(&self, code: &str, settings: &AllocationSettings) -> EngineResult<Vec<WeightedStation>> {
        let children = match self.repos.category_repo.find_by_code(code)? {
            Some(parent) => self.repos.category_repo.list_children(parent.id)?,
            None => Vec::new(),
        };
        if children.is_empty() {
            warn!(category = code, "no station categories, using configured station list");
            return Ok(settings
                .fallback_stations
                .iter()
                .map(|name| WeightedStation {
                    name: name.clone(),
                    weight: DEFAULT_WEIGHT,
                })
                .collect());
        }

        let ids: Vec<i64> = children.iter().map(|c| c.id).collect();
        let stored = self.repos.weight_repo.weights_for(&ids)?;
        Ok(children
            .into_iter()
            .map(|c| WeightedStation {
                weight: stored.get(&c.id).copied().unwrap_or(DEFAULT_WEIGHT),
                name: c.name,
            })
            .collect())
    }
}
