// ==========================================
// Duty Roster Engine - duty categories and weights
// ==========================================
// Invariant: a child category belongs to exactly one parent
// ==========================================

use crate::domain::types::CategoryKind;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

/// Weight used whenever a category has no computed weight yet.
pub const DEFAULT_WEIGHT: f64 = 10.0;

/// Duty category (top-level duty or a sub-station of one)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DutyCategory {
    pub id: i64,
    pub name: String,
    /// Roster role code (`к`, `гбр`, `с`, ...). Sub-stations usually have none.
    pub code: Option<String>,
    pub parent_id: Option<i64>,
}

impl DutyCategory {
    pub fn is_top_level(&self) -> bool {
        self.parent_id.is_none()
    }

    pub fn kind(&self) -> CategoryKind {
        self.code
            .as_deref()
            .map(CategoryKind::from_code)
            .unwrap_or(CategoryKind::Other)
    }
}

/// Computed category weight
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CategoryWeight {
    pub category_id: i64,
    pub weight: f64,
    pub computed_at: NaiveDateTime,
}
