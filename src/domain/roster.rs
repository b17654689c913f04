// ==========================================
// Duty Roster Engine - roster input
// ==========================================
// Produced by the external roster importer; read-only here
// ==========================================

use crate::domain::types::Gender;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// One person rostered on one category for one day.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RosterEntry {
    pub person: String,
    pub date: NaiveDate,
    /// Role code of the duty category
    pub category: String,
    pub group_name: String,
    pub gender: Gender,
    /// Enrollment year of the cohort
    pub cohort: i32,
}

/// Person metadata maintained outside this core.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Person {
    pub person: String,
    pub cohort: i32,
    pub global_score: f64,
}
