// ==========================================
// Duty Roster Engine - core library
// ==========================================
// Duty allocation and fairness weighting for student cohorts
// Stack: Rust + SQLite (rusqlite) + tokio poll loop
// ==========================================

// ==========================================
// Modules
// ==========================================

// domain layer - entities and value types
pub mod domain;

// repository layer - data access
pub mod repository;

// engine layer - weighting and allocation rules
pub mod engine;

// configuration layer
pub mod config;

// database infrastructure (connection PRAGMAs, schema)
pub mod db;

// logging
pub mod logging;

// API layer - caller-facing operations
pub mod api;

// application layer - wiring, seeding, scheduler
pub mod app;

// ==========================================
// Re-exports
// ==========================================

pub use domain::{
    ActorRole, AssignmentHistoryRecord, CategoryKind, CategoryWeight, DutyCategory, PairwiseVote, Person,
    RosterEntry, ShiftAssignment, StationAssignment, Verdict, WeightStage,
};

pub use engine::{
    AllocationOrchestrator, AllocationReport, FairnessScoreService, KeyStatus, ShiftPartitioner, StationAllocator,
    WeightCalculator,
};

pub use api::{ApiError, ApiResult, DutyApi, SurveyApi};

// ==========================================
// Constants
// ==========================================

pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub const APP_NAME: &str = "Duty Roster Engine";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version() {
        assert!(!VERSION.is_empty());
    }
}
