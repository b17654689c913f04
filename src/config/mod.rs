// ==========================================
// Duty Roster Engine - configuration layer
// ==========================================
// Responsibility: runtime configuration with database overrides
// Storage: config_kv table
// ==========================================

pub mod config_manager;

pub use config_manager::{config_keys, defaults, AllocationSettings, ConfigManager, SchedulerSettings};
