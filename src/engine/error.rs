// ==========================================
// Duty Roster Engine - engine errors
// ==========================================

use crate::repository::error::RepositoryError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum EngineError {
    #[error("storage error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("no stations configured for category {0}")]
    NoStations(String),

    #[error("allocation worker failed: {0}")]
    Worker(String),
}

pub type EngineResult<T> = Result<T, EngineError>;
