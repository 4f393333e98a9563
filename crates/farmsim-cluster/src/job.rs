//! A unit of simulated work.
//!
//! A job is owned by exactly one server while active and holds only a
//! non-owning id handle back to it. Its remaining size is mutated solely
//! by processing and never goes negative.

use farmsim_core::{JobId, ServerId};

use crate::error::{ClusterError, ClusterResult};

#[derive(Debug, Clone)]
pub struct Job {
    id: JobId,
    remaining: f64,
    server: Option<ServerId>,
}

impl Job {
    pub fn new(id: JobId, size: f64) -> ClusterResult<Self> {
        if size <= 0.0 || !size.is_finite() {
            return Err(ClusterError::InvalidArgument(format!(
                "job size must be positive and finite, got {size}"
            )));
        }
        Ok(Self {
            id,
            remaining: size,
            server: None,
        })
    }

    pub fn id(&self) -> JobId {
        self.id
    }

    pub fn remaining(&self) -> f64 {
        self.remaining
    }

    /// The server currently owning this job, if assigned.
    pub fn server(&self) -> Option<ServerId> {
        self.server
    }

    pub(crate) fn set_server(&mut self, server: ServerId) {
        self.server = Some(server);
    }

    pub(crate) fn clear_server(&mut self) {
        self.server = None;
    }

    /// Consume `amount` work units, clamping at zero on overshoot.
    pub fn process(&mut self, amount: f64) -> ClusterResult<()> {
        if amount < 0.0 {
            return Err(ClusterError::InvalidArgument(format!(
                "cannot process a negative amount: {amount}"
            )));
        }
        self.remaining = (self.remaining - amount).max(0.0);
        Ok(())
    }

    /// Zero out sub-tolerance residual work at departure.
    pub(crate) fn clamp_residual(&mut self) {
        self.remaining = 0.0;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn remaining_is_monotone_and_never_negative() {
        let mut job = Job::new(JobId(1), 3.0).unwrap();
        let mut last = job.remaining();
        for amount in [0.5, 0.0, 1.0, 2.5, 10.0] {
            job.process(amount).unwrap();
            assert!(job.remaining() <= last);
            assert!(job.remaining() >= 0.0);
            last = job.remaining();
        }
        assert_eq!(job.remaining(), 0.0);
    }

    #[test]
    fn overshoot_clamps_to_zero() {
        let mut job = Job::new(JobId(2), 1.0).unwrap();
        job.process(5.0).unwrap();
        assert_eq!(job.remaining(), 0.0);
    }

    #[test]
    fn negative_amount_is_rejected() {
        let mut job = Job::new(JobId(3), 1.0).unwrap();
        assert!(matches!(
            job.process(-0.1),
            Err(ClusterError::InvalidArgument(_))
        ));
    }

    #[test]
    fn non_positive_size_is_rejected() {
        assert!(Job::new(JobId(4), 0.0).is_err());
        assert!(Job::new(JobId(5), -1.0).is_err());
        assert!(Job::new(JobId(6), f64::NAN).is_err());
    }
}
