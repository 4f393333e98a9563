//! Identifier newtypes and numerical tolerances shared across crates.

use serde::{Deserialize, Serialize};

/// Tolerance for residual work at departure. A departing job whose
/// remaining size is within this band of zero is considered complete.
pub const EPSILON: f64 = 1e-9;

/// Residual drift up to `DRIFT_ABORT_FACTOR * EPSILON` is clamped and
/// counted; anything larger aborts the run as an accounting bug.
pub const DRIFT_ABORT_FACTOR: f64 = 10.0;

/// Monotonic job identifier, unique within one simulation run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct JobId(pub u64);

impl std::fmt::Display for JobId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "job-{}", self.0)
    }
}

/// Server identifier. Ids are allocated lowest-first and reused after a
/// server is fully decommissioned.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ServerId(pub u32);

impl std::fmt::Display for ServerId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "srv-{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_display_with_prefix() {
        assert_eq!(JobId(7).to_string(), "job-7");
        assert_eq!(ServerId(0).to_string(), "srv-0");
    }
}
