//! Confidence-interval half-width.
//!
//! `t(quantile) * stddev / sqrt(n)` with a Student-t inverse CDF, or the
//! Normal inverse CDF once the sample count is large enough that the two
//! are indistinguishable.

use statrs::distribution::{ContinuousCDF, Normal, StudentsT};

use crate::error::{StatsError, StatsResult};

/// Above this sample count the Student-t quantile is replaced by the
/// Normal quantile.
const NORMAL_APPROX_THRESHOLD: u64 = 2_500_000;

/// Two-sided confidence-interval half-width for a sample of size `n`
/// with sample standard deviation `stddev`.
///
/// `confidence` must be strictly inside `(0, 1)`; `n` must be at least 2.
pub fn half_width(n: u64, stddev: f64, confidence: f64) -> StatsResult<f64> {
    if !(confidence > 0.0 && confidence < 1.0) {
        return Err(StatsError::InvalidConfidence(confidence));
    }
    if n < 2 {
        return Err(StatsError::InvalidArgument(format!(
            "half-width needs at least 2 samples, got {n}"
        )));
    }
    if stddev < 0.0 {
        return Err(StatsError::InvalidArgument(format!(
            "negative stddev: {stddev}"
        )));
    }

    let upper_tail = 1.0 - (1.0 - confidence) / 2.0;
    let quantile = if n <= NORMAL_APPROX_THRESHOLD {
        StudentsT::new(0.0, 1.0, (n - 1) as f64)
            .map_err(|e| StatsError::InvalidArgument(e.to_string()))?
            .inverse_cdf(upper_tail)
    } else {
        Normal::new(0.0, 1.0)
            .map_err(|e| StatsError::InvalidArgument(e.to_string()))?
            .inverse_cdf(upper_tail)
    };

    Ok(quantile * stddev / (n as f64).sqrt())
}
