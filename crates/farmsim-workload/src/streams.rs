//! Multi-stream uniform/variate service.
//!
//! Six conventionally reserved streams, each an independently seeded RNG,
//! so the interarrival process and the service process draw from disjoint
//! deterministic sequences. Replanting the seed restores every stream.

use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use rand_distr::{Distribution, Exp};

use crate::error::{WorkloadError, WorkloadResult};

/// Named variate streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Stream {
    /// Phase choice for hyperexponential interarrivals.
    ArrivalPhase = 0,
    /// Branch-1 interarrival exponential.
    ArrivalFast = 1,
    /// Branch-2 interarrival exponential.
    ArrivalSlow = 2,
    /// Phase choice for hyperexponential service demands.
    ServicePhase = 3,
    /// Branch-1 service exponential.
    ServiceFast = 4,
    /// Branch-2 service exponential.
    ServiceSlow = 5,
}

const STREAM_COUNT: usize = 6;

/// Per-stream seed spacing (splitmix64 increment).
const STREAM_SALT: u64 = 0x9e37_79b9_7f4a_7c15;

/// The reproducible multi-stream RNG service.
pub struct Streams {
    rngs: Vec<StdRng>,
}

impl Streams {
    pub fn new(seed: u64) -> Self {
        let mut streams = Self { rngs: Vec::new() };
        streams.plant_seeds(seed);
        streams
    }

    /// Deterministically reseed every stream from one master seed.
    pub fn plant_seeds(&mut self, seed: u64) {
        self.rngs = (0..STREAM_COUNT)
            .map(|i| StdRng::seed_from_u64(seed.wrapping_add(STREAM_SALT.wrapping_mul(i as u64 + 1))))
            .collect();
    }

    /// Uniform draw in `[0, 1)` from the named stream.
    pub fn uniform(&mut self, stream: Stream) -> f64 {
        self.rngs[stream as usize].r#gen::<f64>()
    }

    /// Exponential draw with the given mean.
    pub fn exponential(&mut self, stream: Stream, mean: f64) -> WorkloadResult<f64> {
        if mean <= 0.0 {
            return Err(WorkloadError::InvalidArgument(format!(
                "exponential mean must be positive, got {mean}"
            )));
        }
        let exp = Exp::new(1.0 / mean)
            .map_err(|e| WorkloadError::InvalidArgument(e.to_string()))?;
        Ok(exp.sample(&mut self.rngs[stream as usize]))
    }

    /// Two-phase hyperexponential draw: with probability `p` an
    /// exponential of mean `mean_fast` on `fast`, otherwise of mean
    /// `mean_slow` on `slow`. The phase choice burns `phase` only.
    pub fn hyper_exponential(
        &mut self,
        p: f64,
        mean_fast: f64,
        mean_slow: f64,
        phase: Stream,
        fast: Stream,
        slow: Stream,
    ) -> WorkloadResult<f64> {
        if !(0.0..=1.0).contains(&p) {
            return Err(WorkloadError::InvalidArgument(format!(
                "phase probability must be in [0, 1], got {p}"
            )));
        }
        if self.uniform(phase) < p {
            self.exponential(fast, mean_fast)
        } else {
            self.exponential(slow, mean_slow)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_seed_reproduces_each_stream() {
        let mut a = Streams::new(1234);
        let mut b = Streams::new(1234);
        for _ in 0..50 {
            assert_eq!(a.uniform(Stream::ArrivalFast), b.uniform(Stream::ArrivalFast));
            assert_eq!(a.uniform(Stream::ServicePhase), b.uniform(Stream::ServicePhase));
        }
    }

    #[test]
    fn streams_are_independent_of_draw_order() {
        // Draining one stream must not perturb another.
        let mut a = Streams::new(99);
        let mut b = Streams::new(99);
        for _ in 0..1000 {
            a.uniform(Stream::ArrivalFast);
        }
        assert_eq!(a.uniform(Stream::ServiceFast), b.uniform(Stream::ServiceFast));
    }

    #[test]
    fn plant_seeds_restores_the_sequence() {
        let mut s = Streams::new(7);
        let first = s.uniform(Stream::ArrivalPhase);
        s.uniform(Stream::ArrivalPhase);
        s.plant_seeds(7);
        assert_eq!(s.uniform(Stream::ArrivalPhase), first);
    }

    #[test]
    fn exponential_mean_is_plausible() {
        let mut s = Streams::new(42);
        let n = 20_000;
        let total: f64 = (0..n)
            .map(|_| s.exponential(Stream::ServiceFast, 2.0).unwrap())
            .sum();
        let mean = total / n as f64;
        assert!((mean - 2.0).abs() < 0.1, "sample mean {mean}");
    }

    #[test]
    fn exponential_rejects_non_positive_mean() {
        let mut s = Streams::new(1);
        assert!(matches!(
            s.exponential(Stream::ArrivalFast, 0.0),
            Err(WorkloadError::InvalidArgument(_))
        ));
    }

    #[test]
    fn hyper_exponential_degenerate_phase_uses_one_branch() {
        // p = 1 must never touch the slow branch stream.
        let mut a = Streams::new(5);
        let mut b = Streams::new(5);
        for _ in 0..100 {
            a.hyper_exponential(
                1.0,
                1.0,
                100.0,
                Stream::ArrivalPhase,
                Stream::ArrivalFast,
                Stream::ArrivalSlow,
            )
            .unwrap();
        }
        assert_eq!(a.uniform(Stream::ArrivalSlow), b.uniform(Stream::ArrivalSlow));
    }
}
