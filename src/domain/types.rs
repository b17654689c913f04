// ==========================================
// Duty Roster Engine - domain value types
// ==========================================
// Storage format: lowercase tags, identical to the database columns
// ==========================================

use serde::{Deserialize, Serialize};
use std::fmt;

// ==========================================
// Category kind
// ==========================================
// Derived from the roster role code, decides which partitioner applies
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CategoryKind {
    Course,        // course duty (к)
    RapidReaction, // rapid-reaction group (гбр)
    Canteen,       // canteen duty (с), split into stations
    RemoteBase,    // remote base (зуб)
    Other,
}

/// Canonical form of a roster role code: trimmed, Unicode lowercase.
///
/// Codes are stored and compared in this form only.
pub fn normalize_code(code: &str) -> String {
    code.trim().to_lowercase()
}

impl CategoryKind {
    /// Maps a roster role code to its kind. Unknown codes map to `Other`.
    pub fn from_code(code: &str) -> Self {
        match normalize_code(code).as_str() {
            "к" | "дк" => CategoryKind::Course,
            "гбр" => CategoryKind::RapidReaction,
            "с" | "дс" => CategoryKind::Canteen,
            "зуб" => CategoryKind::RemoteBase,
            _ => CategoryKind::Other,
        }
    }
}

impl fmt::Display for CategoryKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CategoryKind::Course => write!(f, "course"),
            CategoryKind::RapidReaction => write!(f, "rapid_reaction"),
            CategoryKind::Canteen => write!(f, "canteen"),
            CategoryKind::RemoteBase => write!(f, "remote_base"),
            CategoryKind::Other => write!(f, "other"),
        }
    }
}

// ==========================================
// Pairwise verdict
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    AHarder,
    BHarder,
    Equal,
}

impl Verdict {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verdict::AHarder => "a",
            Verdict::BHarder => "b",
            Verdict::Equal => "equal",
        }
    }

    /// Accepts the survey UI choices (`a`, `b`, `equal`).
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "a" => Some(Verdict::AHarder),
            "b" => Some(Verdict::BHarder),
            "equal" | "=" => Some(Verdict::Equal),
            _ => None,
        }
    }

    /// Verdict seen from the other side of the pair.
    pub fn transposed(self) -> Self {
        match self {
            Verdict::AHarder => Verdict::BHarder,
            Verdict::BHarder => Verdict::AHarder,
            Verdict::Equal => Verdict::Equal,
        }
    }

    /// Score contribution `(to_a, to_b)`.
    pub fn points(self) -> (f64, f64) {
        match self {
            Verdict::AHarder => (2.0, 0.0),
            Verdict::BHarder => (0.0, 2.0),
            Verdict::Equal => (1.0, 1.0),
        }
    }
}

impl fmt::Display for Verdict {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// Weight stage (comparison round)
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WeightStage {
    /// top-level categories
    Main,
    /// children of the canteen category
    Canteen,
    /// children of the female duty category
    Female,
}

impl WeightStage {
    /// Stages in computation order: parents before children.
    pub const ALL: [WeightStage; 3] = [WeightStage::Main, WeightStage::Canteen, WeightStage::Female];

    pub fn as_str(&self) -> &'static str {
        match self {
            WeightStage::Main => "main",
            WeightStage::Canteen => "canteen",
            WeightStage::Female => "female",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "main" => Some(WeightStage::Main),
            "canteen" => Some(WeightStage::Canteen),
            "female" => Some(WeightStage::Female),
            _ => None,
        }
    }

    /// Upper clamp for the difficulty ratio `k`.
    pub fn max_k(&self) -> f64 {
        match self {
            WeightStage::Main => 2.0,
            WeightStage::Canteen | WeightStage::Female => 1.6,
        }
    }
}

impl fmt::Display for WeightStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

// ==========================================
// Gender
// ==========================================
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Gender {
    Male,
    Female,
}

impl Gender {
    pub fn as_str(&self) -> &'static str {
        match self {
            Gender::Male => "male",
            Gender::Female => "female",
        }
    }

    /// Anything other than `female` is stored as male, matching the importer default.
    pub fn parse(s: &str) -> Self {
        match s.trim().to_lowercase().as_str() {
            "female" => Gender::Female,
            _ => Gender::Male,
        }
    }
}

// ==========================================
// Actor role
// ==========================================
// Governs who may force re-allocation or finalize a survey
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActorRole {
    User,
    Sergeant,
    Assistant,
    Admin,
    FemaleEditor,
}

impl ActorRole {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActorRole::User => "user",
            ActorRole::Sergeant => "sergeant",
            ActorRole::Assistant => "assistant",
            ActorRole::Admin => "admin",
            ActorRole::FemaleEditor => "female_editor",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "user" => Some(ActorRole::User),
            "sergeant" => Some(ActorRole::Sergeant),
            "assistant" => Some(ActorRole::Assistant),
            "admin" => Some(ActorRole::Admin),
            "female_editor" => Some(ActorRole::FemaleEditor),
            _ => None,
        }
    }

    /// Manual allocation trigger without overwrite.
    pub fn can_trigger_allocation(&self) -> bool {
        matches!(self, ActorRole::Admin | ActorRole::Sergeant | ActorRole::Assistant)
    }

    pub fn can_force_allocation(&self) -> bool {
        matches!(self, ActorRole::Admin | ActorRole::Sergeant)
    }

    pub fn can_finalize(&self, stage: WeightStage) -> bool {
        match self {
            ActorRole::Admin => true,
            ActorRole::FemaleEditor => stage == WeightStage::Female,
            _ => false,
        }
    }
}

impl fmt::Display for ActorRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
