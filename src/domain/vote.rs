// ==========================================
// Duty Roster Engine - pairwise votes
// ==========================================

use crate::domain::types::{Verdict, WeightStage};
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// One voter's comparison of two categories within a stage.
///
/// Stored normalized: `category_a < category_b`, with the verdict transposed
/// when the submitted pair was reversed. See [`PairwiseVote::normalized`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PairwiseVote {
    pub voter_id: i64,
    pub category_a: i64,
    pub category_b: i64,
    pub verdict: Verdict,
    pub stage: WeightStage,
    pub voted_at: NaiveDateTime,
}

impl PairwiseVote {
    /// Builds a vote with the pair ordered so that `category_a < category_b`.
    ///
    /// Returns `None` when both sides name the same category.
    pub fn normalized(
        voter_id: i64,
        first: i64,
        second: i64,
        verdict: Verdict,
        stage: WeightStage,
        voted_at: NaiveDateTime,
    ) -> Option<Self> {
        if first == second {
            return None;
        }
        let (category_a, category_b, verdict) = if first < second {
            (first, second, verdict)
        } else {
            (second, first, verdict.transposed())
        };
        Some(Self {
            voter_id,
            category_a,
            category_b,
            verdict,
            stage,
            voted_at,
        })
    }
}

/// A pair offered to voters by the survey UI.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyPair {
    pub category_a_id: i64,
    pub category_a_name: String,
    pub category_b_id: i64,
    pub category_b_name: String,
}

/// Vote counts for one stage.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SurveyProgress {
    pub stage: Option<WeightStage>,
    pub votes: usize,
    pub voters: usize,
    pub pairs: usize,
}
