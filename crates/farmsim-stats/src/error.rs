//! Estimator error types.

use thiserror::Error;

/// Errors that can occur while feeding or reading the estimators.
#[derive(Debug, Error)]
pub enum StatsError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("confidence level must be strictly inside (0, 1), got {0}")]
    InvalidConfidence(f64),
}

pub type StatsResult<T> = Result<T, StatsError>;
