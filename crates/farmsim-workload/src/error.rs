//! Workload error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WorkloadError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("failed to read trace file: {0}")]
    Io(#[from] std::io::Error),

    #[error("malformed trace line {line}: {content:?}")]
    MalformedTrace { line: usize, content: String },

    #[error("config error: {0}")]
    Config(#[from] farmsim_core::ConfigError),
}

pub type WorkloadResult<T> = Result<T, WorkloadError>;
