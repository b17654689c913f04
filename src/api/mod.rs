// ==========================================
// Duty Roster Engine - API layer
// ==========================================
// Responsibility: caller-facing operations for bot handlers and the CLI
// ==========================================

pub mod duty_api;
pub mod error;
pub mod survey_api;

pub use duty_api::{DutyApi, DutyMates};
pub use error::{ApiError, ApiResult};
pub use survey_api::SurveyApi;
