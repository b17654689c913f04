// ==========================================
// Duty Roster Engine - survey API
// ==========================================
// Responsibility: vote submission, pair listing, progress, finalize
// Finalize recomputes weights; only admins (or the female editor for
// the female stage) may trigger it
// ==========================================

use std::sync::Arc;

use chrono::{Local, NaiveDateTime};
use tracing::{info, warn};

use crate::api::error::{ApiError, ApiResult};
use crate::config::ConfigManager;
use crate::domain::category::DutyCategory;
use crate::domain::types::{ActorRole, Verdict, WeightStage};
use crate::domain::vote::{PairwiseVote, SurveyPair, SurveyProgress};
use crate::engine::weight_calculator::{StageWeights, WeightCalculator};
use crate::repository::VoteRepository;

pub struct SurveyApi {
    vote_repo: Arc<VoteRepository>,
    calculator: Arc<WeightCalculator>,
    config: Arc<ConfigManager>,
}

impl SurveyApi {
    pub fn new(vote_repo: Arc<VoteRepository>, calculator: Arc<WeightCalculator>, config: Arc<ConfigManager>) -> Self {
        Self {
            vote_repo,
            calculator,
            config,
        }
    }

    fn stage_categories(&self, stage: WeightStage) -> ApiResult<Vec<DutyCategory>> {
        let settings = self.config.load_allocation_settings()?;
        let (categories, _) = self.calculator.round_categories(stage, &settings)?;
        Ok(categories)
    }

    /// Records a voter's comparison, replacing their earlier vote on the pair.
    ///
    /// `choice` is the survey UI answer: `a`, `b` or `equal`, relative to
    /// the order `first`, `second`.
    pub fn submit_vote(
        &self,
        voter_id: i64,
        stage: WeightStage,
        first: i64,
        second: i64,
        choice: &str,
    ) -> ApiResult<PairwiseVote> {
        self.submit_vote_at(voter_id, stage, first, second, choice, Local::now().naive_local())
    }

    pub fn submit_vote_at(
        &self,
        voter_id: i64,
        stage: WeightStage,
        first: i64,
        second: i64,
        choice: &str,
        voted_at: NaiveDateTime,
    ) -> ApiResult<PairwiseVote> {
        let verdict =
            Verdict::parse(choice).ok_or_else(|| ApiError::InvalidInput(format!("unknown choice '{}'", choice)))?;
        let vote = PairwiseVote::normalized(voter_id, first, second, verdict, stage, voted_at)
            .ok_or_else(|| ApiError::InvalidInput("a category cannot be compared with itself".to_string()))?;

        let round = self.stage_categories(stage)?;
        for id in [vote.category_a, vote.category_b] {
            if !round.iter().any(|c| c.id == id) {
                return Err(ApiError::InvalidInput(format!(
                    "category {} is not part of the {} survey",
                    id, stage
                )));
            }
        }

        self.vote_repo.upsert(&vote)?;
        info!(
            voter_id,
            stage = stage.as_str(),
            category_a = vote.category_a,
            category_b = vote.category_b,
            verdict = vote.verdict.as_str(),
            "vote recorded"
        );
        Ok(vote)
    }

    /// Every unordered pair of the stage's categories, lower id first.
    pub fn list_pairs(&self, stage: WeightStage) -> ApiResult<Vec<SurveyPair>> {
        let categories = self.stage_categories(stage)?;
        let mut pairs = Vec::new();
        for (i, a) in categories.iter().enumerate() {
            for b in &categories[i + 1..] {
                let (a, b) = if a.id < b.id { (a, b) } else { (b, a) };
                pairs.push(SurveyPair {
                    category_a_id: a.id,
                    category_a_name: a.name.clone(),
                    category_b_id: b.id,
                    category_b_name: b.name.clone(),
                });
            }
        }
        Ok(pairs)
    }

    pub fn progress(&self, stage: WeightStage) -> ApiResult<SurveyProgress> {
        let n = self.stage_categories(stage)?.len();
        let (votes, voters) = self.vote_repo.count_by_stage(stage)?;
        Ok(SurveyProgress {
            stage: Some(stage),
            votes,
            voters,
            pairs: n * n.saturating_sub(1) / 2,
        })
    }

    /// Recomputes weights for one stage, or all stages when `stage` is `None`.
    pub fn finalize(&self, actor: ActorRole, stage: Option<WeightStage>) -> ApiResult<Vec<StageWeights>> {
        self.finalize_at(actor, stage, Local::now().naive_local())
    }

    pub fn finalize_at(
        &self,
        actor: ActorRole,
        stage: Option<WeightStage>,
        computed_at: NaiveDateTime,
    ) -> ApiResult<Vec<StageWeights>> {
        let allowed = match stage {
            Some(s) => actor.can_finalize(s),
            None => WeightStage::ALL.iter().all(|s| actor.can_finalize(*s)),
        };
        if !allowed {
            warn!(role = actor.as_str(), stage = ?stage, "finalize refused");
            return Err(ApiError::Unauthorized {
                role: actor.to_string(),
                action: format!(
                    "finalize the {} survey",
                    stage.map(|s| s.as_str()).unwrap_or("whole")
                ),
            });
        }

        let results = match stage {
            Some(s) => vec![self.calculator.compute(s, computed_at)?],
            None => self.calculator.compute_all(computed_at)?,
        };
        info!(
            role = actor.as_str(),
            stages = results.len(),
            weights = results.iter().map(|r| r.weights.len()).sum::<usize>(),
            "survey finalized"
        );
        Ok(results)
    }
}
