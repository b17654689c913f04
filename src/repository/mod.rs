// ==========================================
// Duty Roster Engine - repository layer
// ==========================================
// Rule: repositories hold no business logic
// Rule: every query is parameterized
// ==========================================

pub mod assignment_repo;
pub mod category_repo;
pub mod db_utils;
pub mod error;
pub mod history_repo;
pub mod person_repo;
pub mod roster_repo;
pub mod vote_repo;
pub mod weight_repo;

pub use assignment_repo::{AssignmentRepository, WriteOutcome};
pub use category_repo::CategoryRepository;
pub use error::{RepositoryError, RepositoryResult};
pub use history_repo::HistoryRepository;
pub use person_repo::PersonRepository;
pub use roster_repo::RosterRepository;
pub use vote_repo::VoteRepository;
pub use weight_repo::WeightRepository;
