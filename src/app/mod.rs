// ==========================================
// Duty Roster Engine - application layer
// ==========================================
// Responsibility: process wiring, seeding and the poll-loop scheduler
// ==========================================

pub mod scheduler;
pub mod seed;
pub mod state;

pub use scheduler::{distribution_window, is_in_distribution_window, target_duty_date, DistributionScheduler};
pub use seed::seed_default_categories;
pub use state::{get_default_db_path, AppState};
