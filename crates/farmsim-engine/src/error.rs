//! Engine error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("cluster error: {0}")]
    Cluster(#[from] farmsim_cluster::ClusterError),

    #[error("stats error: {0}")]
    Stats(#[from] farmsim_stats::StatsError),

    #[error("workload error: {0}")]
    Workload(#[from] farmsim_workload::WorkloadError),

    #[error("config error: {0}")]
    Config(#[from] farmsim_core::ConfigError),

    #[error("output error: {0}")]
    Io(#[from] std::io::Error),
}

pub type EngineResult<T> = Result<T, EngineError>;
