//! Running mean and variance via the Welford recurrence.
//!
//! Reported variance is always the sample variance `m2 / (n - 1)`; the
//! population form is never exposed.

/// One-pass running mean/variance accumulator.
#[derive(Debug, Clone, Default)]
pub struct Welford {
    n: u64,
    mean: f64,
    m2: f64,
}

impl Welford {
    pub fn new() -> Self {
        Self::default()
    }

    /// Absorb one sample.
    pub fn record(&mut self, x: f64) {
        self.n += 1;
        let delta = x - self.mean;
        self.mean += delta / self.n as f64;
        let delta2 = x - self.mean;
        self.m2 += delta * delta2;
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    /// Running mean; zero before the first sample.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Sample variance `m2 / (n - 1)`; zero for fewer than two samples.
    pub fn variance(&self) -> f64 {
        if self.n > 1 {
            self.m2 / (self.n - 1) as f64
        } else {
            0.0
        }
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Forget everything; used at batch and replication boundaries.
    pub fn reset(&mut self) {
        *self = Self::default();
    }
}
