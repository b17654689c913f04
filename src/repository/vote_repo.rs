// ==========================================
// Duty Roster Engine - pairwise vote store
// ==========================================
// One row per (voter, ordered pair, stage); a repeat vote replaces the old one
// ==========================================

use crate::domain::types::{Verdict, WeightStage};
use crate::domain::vote::PairwiseVote;
use crate::repository::db_utils::{format_ts, parse_ts};
use crate::repository::error::{RepositoryError, RepositoryResult};
use rusqlite::types::Type;
use rusqlite::{params, Connection, OptionalExtension, Result as SqliteResult, Row};
use std::sync::{Arc, Mutex};

pub struct VoteRepository {
    conn: Arc<Mutex<Connection>>,
}

fn map_vote(row: &Row<'_>) -> SqliteResult<PairwiseVote> {
    let verdict_raw: String = row.get(3)?;
    let stage_raw: String = row.get(4)?;
    let voted_at_raw: String = row.get(5)?;
    Ok(PairwiseVote {
        voter_id: row.get(0)?,
        category_a: row.get(1)?,
        category_b: row.get(2)?,
        verdict: Verdict::parse(&verdict_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(3, Type::Text, format!("verdict {}", verdict_raw).into())
        })?,
        stage: WeightStage::parse(&stage_raw).ok_or_else(|| {
            rusqlite::Error::FromSqlConversionFailure(4, Type::Text, format!("stage {}", stage_raw).into())
        })?,
        voted_at: parse_ts(5, &voted_at_raw)?,
    })
}

impl VoteRepository {
    pub fn new(conn: Arc<Mutex<Connection>>) -> Self {
        Self { conn }
    }

    fn get_conn(&self) -> RepositoryResult<std::sync::MutexGuard<Connection>> {
        self.conn
            .lock()
            .map_err(|e| RepositoryError::LockError(e.to_string()))
    }

    /// Stores a normalized vote, replacing the voter's previous verdict on the same pair and stage.
    pub fn upsert(&self, vote: &PairwiseVote) -> RepositoryResult<()> {
        if vote.category_a >= vote.category_b {
            return Err(RepositoryError::ValidationError(format!(
                "vote pair not normalized: {} >= {}",
                vote.category_a, vote.category_b
            )));
        }
        let conn = self.get_conn()?;
        conn.execute(
            r#"
            INSERT INTO pairwise_vote (voter_id, category_a, category_b, verdict, stage, voted_at)
            VALUES (?1, ?2, ?3, ?4, ?5, ?6)
            ON CONFLICT (voter_id, category_a, category_b, stage)
            DO UPDATE SET verdict = excluded.verdict, voted_at = excluded.voted_at
            "#,
            params![
                vote.voter_id,
                vote.category_a,
                vote.category_b,
                vote.verdict.as_str(),
                vote.stage.as_str(),
                format_ts(vote.voted_at),
            ],
        )?;
        Ok(())
    }

    pub fn find(
        &self,
        voter_id: i64,
        category_a: i64,
        category_b: i64,
        stage: WeightStage,
    ) -> RepositoryResult<Option<PairwiseVote>> {
        let conn = self.get_conn()?;
        let vote = conn
            .query_row(
                r#"
                SELECT voter_id, category_a, category_b, verdict, stage, voted_at
                FROM pairwise_vote
                WHERE voter_id = ?1 AND category_a = ?2 AND category_b = ?3 AND stage = ?4
                "#,
                params![voter_id, category_a, category_b, stage.as_str()],
                map_vote,
            )
            .optional()?;
        Ok(vote)
    }

    /// All votes of one stage, oldest first.
    pub fn list_by_stage(&self, stage: WeightStage) -> RepositoryResult<Vec<PairwiseVote>> {
        let conn = self.get_conn()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT voter_id, category_a, category_b, verdict, stage, voted_at
            FROM pairwise_vote
            WHERE stage = ?1
            ORDER BY id
            "#,
        )?;
        let votes = stmt
            .query_map(params![stage.as_str()], map_vote)?
            .collect::<SqliteResult<Vec<_>>>()?;
        Ok(votes)
    }

    /// `(votes, distinct voters)` for one stage.
    pub fn count_by_stage(&self, stage: WeightStage) -> RepositoryResult<(usize, usize)> {
        let conn = self.get_conn()?;
        let (votes, voters): (i64, i64) = conn.query_row(
            "SELECT COUNT(*), COUNT(DISTINCT voter_id) FROM pairwise_vote WHERE stage = ?1",
            params![stage.as_str()],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )?;
        Ok((votes as usize, voters as usize))
    }
}
