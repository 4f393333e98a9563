//! Cluster error types.

use farmsim_core::{JobId, ServerId};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ClusterError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("invalid state: {0}")]
    InvalidState(String),

    #[error("no server available for assignment")]
    NoServerAvailable,

    #[error("unknown server: {0}")]
    UnknownServer(ServerId),

    #[error("job {job} not found on server {server}")]
    UnknownJob { job: JobId, server: ServerId },

    #[error("job {job} departed with residual work {remaining}, beyond drift tolerance")]
    ExcessiveResidual { job: JobId, remaining: f64 },
}

pub type ClusterResult<T> = Result<T, ClusterError>;
