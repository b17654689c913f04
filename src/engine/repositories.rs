// ==========================================
// Duty Roster Engine - repository bundle
// ==========================================
// Responsibility: hand every repository the engines need in one value
// ==========================================

use std::sync::{Arc, Mutex};

use rusqlite::Connection;

use crate::repository::{
    AssignmentRepository, CategoryRepository, HistoryRepository, PersonRepository, RosterRepository,
    VoteRepository, WeightRepository,
};

/// Repositories shared by the weight and allocation engines.
///
/// All members usually wrap the same connection.
#[derive(Clone)]
pub struct DutyRepositories {
    pub category_repo: Arc<CategoryRepository>,
    pub vote_repo: Arc<VoteRepository>,
    pub weight_repo: Arc<WeightRepository>,
    pub roster_repo: Arc<RosterRepository>,
    pub person_repo: Arc<PersonRepository>,
    pub history_repo: Arc<HistoryRepository>,
    pub assignment_repo: Arc<AssignmentRepository>,
}

impl DutyRepositories {
    /// Builds every repository on a shared connection.
    pub fn from_connection(conn: Arc<Mutex<Connection>>) -> Self {
        Self {
            category_repo: Arc::new(CategoryRepository::new(conn.clone())),
            vote_repo: Arc::new(VoteRepository::new(conn.clone())),
            weight_repo: Arc::new(WeightRepository::new(conn.clone())),
            roster_repo: Arc::new(RosterRepository::new(conn.clone())),
            person_repo: Arc::new(PersonRepository::new(conn.clone())),
            history_repo: Arc::new(HistoryRepository::new(conn.clone())),
            assignment_repo: Arc::new(AssignmentRepository::new(conn)),
        }
    }
}
