// ==========================================
// Duty Roster Engine - engine layer
// ==========================================
// Responsibility: weighting and allocation rules
// Rule: engines never build SQL, they go through repositories
// ==========================================

pub mod error;
pub mod fairness;
pub mod orchestrator;
pub mod permutation;
pub mod repositories;
pub mod shift_partitioner;
pub mod station_allocator;
pub mod weight_calculator;

pub use error::{EngineError, EngineResult};
pub use fairness::{FairnessScoreService, StationWeights};
pub use orchestrator::{AllocationKey, AllocationOrchestrator, AllocationReport, KeyOutcome, KeyStatus};
pub use permutation::{IdentityPermutation, PermutationSource, RngPermutation};
pub use repositories::DutyRepositories;
pub use shift_partitioner::ShiftPartitioner;
pub use station_allocator::{ScoredPerson, StationAllocator, WeightedStation};
pub use weight_calculator::{compute_round, StageWeights, WeightCalculator};
