// ==========================================
// Duty Roster Engine - domain layer
// ==========================================
// Responsibility: entities and value types
// Rule: no data access, no engine logic
// ==========================================

pub mod assignment;
pub mod category;
pub mod roster;
pub mod types;
pub mod vote;

pub use assignment::{AssignmentHistoryRecord, ShiftAssignment, StationAssignment, FIXED_ROLE_SHIFT};
pub use category::{CategoryWeight, DutyCategory, DEFAULT_WEIGHT};
pub use roster::{Person, RosterEntry};
pub use types::{normalize_code, ActorRole, CategoryKind, Gender, Verdict, WeightStage};
pub use vote::{PairwiseVote, SurveyPair, SurveyProgress};
