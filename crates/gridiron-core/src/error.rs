// Error taxonomy surfaced by core operations.

use thiserror::Error;

use crate::lineup::LineupViolation;

pub type Result<T, E = CoreError> = std::result::Result<T, E>;

/// Failures raised by a `LeagueStore` implementation.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A conditional write lost against a concurrent writer.
    #[error("stale write: {0}")]
    Stale(String),

    #[error(transparent)]
    Backend(#[from] anyhow::Error),
}

#[derive(Debug, Error)]
pub enum CoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("forbidden: {0}")]
    Forbidden(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("invalid lineup: {} violation(s)", .0.len())]
    InvalidLineup(Vec<LineupViolation>),

    #[error("invalid input: {0}")]
    Invalid(String),

    #[error("storage failure: {0}")]
    Store(#[source] StoreError),
}

impl CoreError {
    /// Stable tag for the boundary layer.
    pub fn kind(&self) -> &'static str {
        match self {
            CoreError::NotFound(_) => "not_found",
            CoreError::Forbidden(_) => "forbidden",
            CoreError::Conflict(_) => "conflict",
            CoreError::InvalidLineup(_) => "invalid_lineup",
            CoreError::Invalid(_) => "invalid",
            CoreError::Store(_) => "storage",
        }
    }

    pub fn not_found(what: impl Into<String>) -> Self {
        CoreError::NotFound(what.into())
    }

    pub fn forbidden(why: impl Into<String>) -> Self {
        CoreError::Forbidden(why.into())
    }

    pub fn conflict(why: impl Into<String>) -> Self {
        CoreError::Conflict(why.into())
    }
}

impl From<StoreError> for CoreError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::Stale(message) => CoreError::Conflict(message),
            other => CoreError::Store(other),
        }
    }
}

impl From<anyhow::Error> for CoreError {
    fn from(err: anyhow::Error) -> Self {
        CoreError::Store(StoreError::Backend(err))
    }
}
