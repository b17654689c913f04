// ==========================================
// Duty Roster Engine - fairness score service
// ==========================================
// score = global_score_factor * global_score + streak penalty
// Streak: the two most recent stations (before the duty day) were both heavy
// Ordering key only; never blocks an assignment
// ==========================================

use crate::config::AllocationSettings;
use crate::domain::assignment::AssignmentHistoryRecord;
use crate::domain::category::DEFAULT_WEIGHT;
use crate::engine::error::EngineResult;
use crate::repository::{CategoryRepository, HistoryRepository, PersonRepository, WeightRepository};
use chrono::NaiveDate;
use std::collections::HashMap;
use std::sync::Arc;

/// Current weight per station name of one parent category.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StationWeights {
    by_name: HashMap<String, f64>,
}

impl StationWeights {
    pub fn new(by_name: HashMap<String, f64>) -> Self {
        Self { by_name }
    }

    /// Weight of `station`, 10 when unknown or never computed.
    pub fn weight(&self, station: &str) -> f64 {
        self.by_name.get(station).copied().unwrap_or(DEFAULT_WEIGHT)
    }

    pub fn is_empty(&self) -> bool {
        self.by_name.is_empty()
    }
}

/// Penalty owed for the most recent history rows (newest first).
///
/// Rows without a station are ignored; fewer than two stations means no streak.
pub fn streak_penalty(
    recent: &[AssignmentHistoryRecord],
    weights: &StationWeights,
    settings: &AllocationSettings,
) -> f64 {
    let heavy: Vec<bool> = recent
        .iter()
        .filter_map(|r| r.station.as_deref())
        .filter(|s| !s.trim().is_empty())
        .take(2)
        .map(|s| weights.weight(s) >= settings.heavy_threshold)
        .collect();

    if heavy.len() == 2 && heavy.iter().all(|h| *h) {
        settings.streak_penalty
    } else {
        0.0
    }
}

pub struct FairnessScoreService {
    person_repo: Arc<PersonRepository>,
    history_repo: Arc<HistoryRepository>,
    category_repo: Arc<CategoryRepository>,
    weight_repo: Arc<WeightRepository>,
}

impl FairnessScoreService {
    pub fn new(
        person_repo: Arc<PersonRepository>,
        history_repo: Arc<HistoryRepository>,
        category_repo: Arc<CategoryRepository>,
        weight_repo: Arc<WeightRepository>,
    ) -> Self {
        Self {
            person_repo,
            history_repo,
            category_repo,
            weight_repo,
        }
    }

    /// Weights of the child categories of the top-level category with `code`.
    pub fn station_weights(&self, code: &str) -> EngineResult<StationWeights> {
        let Some(parent) = self.category_repo.find_by_code(code)? else {
            return Ok(StationWeights::default());
        };
        let children = self.category_repo.list_children(parent.id)?;
        let ids: Vec<i64> = children.iter().map(|c| c.id).collect();
        let stored = self.weight_repo.weights_for(&ids)?;
        Ok(StationWeights::new(
            children
                .into_iter()
                .map(|c| {
                    let w = stored.get(&c.id).copied().unwrap_or(DEFAULT_WEIGHT);
                    (c.name, w)
                })
                .collect(),
        ))
    }

    /// Fairness score with station weights already resolved.
    pub fn score_with(
        &self,
        person: &str,
        category: &str,
        cohort: i32,
        as_of: NaiveDate,
        weights: &StationWeights,
        settings: &AllocationSettings,
    ) -> EngineResult<f64> {
        let global = self.person_repo.global_score(person, cohort)?.unwrap_or(0.0);
        let recent = self
            .history_repo
            .recent_for(person, category, cohort, Some(as_of), settings.history_depth)?;
        Ok(settings.global_score_factor * global + streak_penalty(&recent, weights, settings))
    }

    /// Fairness score of `person` for a station-bearing category on `as_of`.
    pub fn score(
        &self,
        person: &str,
        category: &str,
        cohort: i32,
        as_of: NaiveDate,
        settings: &AllocationSettings,
    ) -> EngineResult<f64> {
        let weights = self.station_weights(category)?;
        self.score_with(person, category, cohort, as_of, &weights, settings)
    }
}
