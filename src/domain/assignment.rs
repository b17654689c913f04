// ==========================================
// Duty Roster Engine - assignment rows
// ==========================================
// ShiftAssignment / StationAssignment: overwritten on forced re-run
// AssignmentHistoryRecord: append-only, never updated
// ==========================================

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Shift number of the fixed (non-rotating) role.
pub const FIXED_ROLE_SHIFT: i32 = 0;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShiftAssignment {
    pub date: NaiveDate,
    pub category: String,
    pub cohort: i32,
    pub person: String,
    /// 0 = fixed role or floater, 1..N = rotating shift
    pub shift: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StationAssignment {
    pub date: NaiveDate,
    /// Role code of the parent category (the canteen)
    pub category: String,
    pub cohort: i32,
    pub person: String,
    pub station: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssignmentHistoryRecord {
    pub person: String,
    pub date: NaiveDate,
    pub category: String,
    pub cohort: i32,
    pub shift: Option<i32>,
    pub station: Option<String>,
    pub recorded_at: NaiveDateTime,
}

impl AssignmentHistoryRecord {
    pub fn from_shift(a: &ShiftAssignment, recorded_at: NaiveDateTime) -> Self {
        Self {
            person: a.person.clone(),
            date: a.date,
            category: a.category.clone(),
            cohort: a.cohort,
            shift: Some(a.shift),
            station: None,
            recorded_at,
        }
    }

    pub fn from_station(a: &StationAssignment, recorded_at: NaiveDateTime) -> Self {
        Self {
            person: a.person.clone(),
            date: a.date,
            category: a.category.clone(),
            cohort: a.cohort,
            shift: None,
            station: Some(a.station.clone()),
            recorded_at,
        }
    }
}
