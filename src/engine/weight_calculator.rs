// ==========================================
// Duty Roster Engine - weight calculator
// ==========================================
// Input: pairwise votes of one stage + the stage's categories
// Output: one weight per category (upserted into category_weight)
// Rule: a = +2 to A, b = +2 to B, equal = +1 each
// Rule: k = S / avg, floor 0.8, ceiling 2.0 (top level) / 1.6 (children)
// ==========================================

use crate::config::{AllocationSettings, ConfigManager};
use crate::domain::category::{CategoryWeight, DutyCategory, DEFAULT_WEIGHT};
use crate::domain::types::WeightStage;
use crate::domain::vote::PairwiseVote;
use crate::engine::error::EngineResult;
use crate::repository::{CategoryRepository, VoteRepository, WeightRepository};
use chrono::NaiveDateTime;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument, warn};

/// Multiplier given to categories that collected no points.
pub const MIN_K: f64 = 0.8;

/// Result of one stage's round.
#[derive(Debug, Clone, PartialEq)]
pub struct RoundWeights {
    /// (category_id, weight) in category order
    pub weights: Vec<(i64, f64)>,
    /// Votes naming a category outside the round
    pub skipped_votes: usize,
}

impl RoundWeights {
    pub fn as_map(&self) -> HashMap<i64, f64> {
        self.weights.iter().copied().collect()
    }
}

/// Per-stage summary returned to callers.
#[derive(Debug, Clone, PartialEq)]
pub struct StageWeights {
    pub stage: WeightStage,
    pub weights: Vec<CategoryWeight>,
    pub skipped_votes: usize,
}

// ==========================================
// Pure round computation
// ==========================================

/// Computes the weights of one round.
///
/// `base_weight` is 10 for the top-level round and the parent's weight for
/// child rounds.
pub fn compute_round(
    categories: &[DutyCategory],
    votes: &[PairwiseVote],
    stage: WeightStage,
    base_weight: f64,
) -> RoundWeights {
    if categories.is_empty() {
        return RoundWeights {
            weights: Vec::new(),
            skipped_votes: 0,
        };
    }

    let mut scores: HashMap<i64, f64> = categories.iter().map(|c| (c.id, 0.0)).collect();
    let mut skipped_votes = 0;

    for vote in votes {
        if !scores.contains_key(&vote.category_a) || !scores.contains_key(&vote.category_b) {
            debug!(
                voter_id = vote.voter_id,
                category_a = vote.category_a,
                category_b = vote.category_b,
                stage = stage.as_str(),
                "vote outside round, skipped"
            );
            skipped_votes += 1;
            continue;
        }
        let (pa, pb) = vote.verdict.points();
        if let Some(s) = scores.get_mut(&vote.category_a) {
            *s += pa;
        }
        if let Some(s) = scores.get_mut(&vote.category_b) {
            *s += pb;
        }
    }

    let total: f64 = scores.values().sum();
    let avg = if total == 0.0 {
        1.0
    } else {
        total / categories.len() as f64
    };
    let max_k = stage.max_k();

    let weights = categories
        .iter()
        .map(|c| {
            let s = scores.get(&c.id).copied().unwrap_or(0.0);
            let k = if avg > 0.0 && s > 0.0 { s / avg } else { MIN_K };
            (c.id, base_weight * k.clamp(MIN_K, max_k))
        })
        .collect();

    RoundWeights { weights, skipped_votes }
}

// ==========================================
// WeightCalculator - persisting service
// ==========================================
pub struct WeightCalculator {
    category_repo: Arc<CategoryRepository>,
    vote_repo: Arc<VoteRepository>,
    weight_repo: Arc<WeightRepository>,
    config: Arc<ConfigManager>,
}

impl WeightCalculator {
    pub fn new(
        category_repo: Arc<CategoryRepository>,
        vote_repo: Arc<VoteRepository>,
        weight_repo: Arc<WeightRepository>,
        config: Arc<ConfigManager>,
    ) -> Self {
        Self {
            category_repo,
            vote_repo,
            weight_repo,
            config,
        }
    }

    /// Categories compared in `stage`, with the parent for child rounds.
    ///
    /// A child round whose parent category does not exist is empty.
    pub fn round_categories(
        &self,
        stage: WeightStage,
        settings: &AllocationSettings,
    ) -> EngineResult<(Vec<DutyCategory>, Option<DutyCategory>)> {
        let parent_name = match stage {
            WeightStage::Main => return Ok((self.category_repo.list_top_level()?, None)),
            WeightStage::Canteen => &settings.canteen_parent,
            WeightStage::Female => &settings.female_parent,
        };
        match self.category_repo.find_by_name(parent_name)? {
            Some(parent) => Ok((self.category_repo.list_children(parent.id)?, Some(parent))),
            None => {
                warn!(stage = stage.as_str(), parent = %parent_name, "parent category missing, round is empty");
                Ok((Vec::new(), None))
            }
        }
    }

    /// Recomputes one stage and upserts its weights.
    ///
    /// `fresh` carries weights computed earlier in the same run; a child
    /// round prefers them over the stored parent weight.
    #[instrument(skip_all, fields(stage = stage.as_str()))]
    pub fn compute_stage(
        &self,
        stage: WeightStage,
        fresh: &HashMap<i64, f64>,
        computed_at: NaiveDateTime,
    ) -> EngineResult<StageWeights> {
        let settings = self.config.load_allocation_settings()?;
        let (categories, parent) = self.round_categories(stage, &settings)?;
        if categories.is_empty() {
            info!("no categories in round, nothing to compute");
            return Ok(StageWeights {
                stage,
                weights: Vec::new(),
                skipped_votes: 0,
            });
        }

        let base_weight = match &parent {
            None => DEFAULT_WEIGHT,
            Some(p) => match fresh.get(&p.id) {
                Some(w) => *w,
                None => self
                    .weight_repo
                    .find(p.id)?
                    .map(|w| w.weight)
                    .unwrap_or(DEFAULT_WEIGHT),
            },
        };

        let votes = self.vote_repo.list_by_stage(stage)?;
        let round = compute_round(&categories, &votes, stage, base_weight);
        if round.skipped_votes > 0 {
            warn!(skipped_votes = round.skipped_votes, "votes referenced categories outside the round");
        }

        let weights: Vec<CategoryWeight> = round
            .weights
            .iter()
            .map(|(id, w)| CategoryWeight {
                category_id: *id,
                weight: *w,
                computed_at,
            })
            .collect();
        self.weight_repo.upsert_many(&weights)?;

        info!(
            categories = weights.len(),
            votes = votes.len(),
            base_weight,
            "stage weights updated"
        );
        Ok(StageWeights {
            stage,
            weights,
            skipped_votes: round.skipped_votes,
        })
    }

    /// Recomputes a single stage.
    pub fn compute(&self, stage: WeightStage, computed_at: NaiveDateTime) -> EngineResult<StageWeights> {
        self.compute_stage(stage, &HashMap::new(), computed_at)
    }

    /// Recomputes every stage, top level first.
    pub fn compute_all(&self, computed_at: NaiveDateTime) -> EngineResult<Vec<StageWeights>> {
        let mut fresh: HashMap<i64, f64> = HashMap::new();
        let mut out = Vec::with_capacity(WeightStage::ALL.len());
        for stage in WeightStage::ALL {
            let result = self.compute_stage(stage, &fresh, computed_at)?;
            fresh.extend(result.weights.iter().map(|w| (w.category_id, w.weight)));
            out.push(result);
        }
        Ok(out)
    }
}
