//! Streaming autocorrelation up to a fixed maximum lag.
//!
//! One-pass algorithm over a circular buffer of the `K+1` most recent
//! values: once the buffer is full, each new sample first contributes the
//! lagged products of the value it is about to evict, then overwrites it.
//! `finish()` drains the buffer with `K+1` zero-fill passes so the tail
//! products are counted exactly once, mirroring the classical batch
//! autocorrelation routine.

use crate::error::{StatsError, StatsResult};

#[derive(Debug, Clone)]
pub struct Autocorrelation {
    max_lag: usize,
    hold: Vec<f64>,
    head: usize,
    filled: usize,
    n: u64,
    sum: f64,
    cosum: Vec<f64>,
    finished: bool,
}

impl Autocorrelation {
    /// Track lags `0..=max_lag`. `max_lag` must be at least 1.
    pub fn new(max_lag: usize) -> StatsResult<Self> {
        if max_lag == 0 {
            return Err(StatsError::InvalidArgument(
                "max_lag must be at least 1".into(),
            ));
        }
        Ok(Self {
            max_lag,
            hold: vec![0.0; max_lag + 1],
            head: 0,
            filled: 0,
            n: 0,
            sum: 0.0,
            cosum: vec![0.0; max_lag + 1],
            finished: false,
        })
    }

    pub fn max_lag(&self) -> usize {
        self.max_lag
    }

    pub fn count(&self) -> u64 {
        self.n
    }

    /// Absorb one sample.
    pub fn record(&mut self, x: f64) -> StatsResult<()> {
        if self.finished {
            return Err(StatsError::InvalidState(
                "record after finish()".into(),
            ));
        }
        if self.filled <= self.max_lag {
            // Bootstrap: the first K+1 samples just fill the buffer.
            self.hold[self.filled] = x;
            self.filled += 1;
        } else {
            self.accumulate();
            self.hold[self.head] = x;
            self.head = (self.head + 1) % (self.max_lag + 1);
        }
        self.n += 1;
        self.sum += x;
        Ok(())
    }

    /// Lagged products of the value currently at the head against the
    /// buffer contents.
    fn accumulate(&mut self) {
        let size = self.max_lag + 1;
        for j in 0..=self.max_lag {
            self.cosum[j] += self.hold[self.head] * self.hold[(self.head + j) % size];
        }
    }

    /// Drain the buffer. Required before any covariance is read.
    pub fn finish(&mut self) -> StatsResult<()> {
        if self.finished {
            return Err(StatsError::InvalidState("finish() called twice".into()));
        }
        if self.n <= self.max_lag as u64 {
            return Err(StatsError::InvalidArgument(format!(
                "need more than {} samples for lag {}, got {}",
                self.max_lag, self.max_lag, self.n
            )));
        }
        let size = self.max_lag + 1;
        for _ in 0..size {
            self.accumulate();
            self.hold[self.head] = 0.0;
            self.head = (self.head + 1) % size;
        }
        self.finished = true;
        Ok(())
    }

    pub fn mean(&self) -> f64 {
        if self.n == 0 { 0.0 } else { self.sum / self.n as f64 }
    }

    /// `cosum[j] / (n - j) - mean^2`. Only valid after `finish()`.
    pub fn autocovariance(&self, lag: usize) -> StatsResult<f64> {
        if !self.finished {
            return Err(StatsError::InvalidState(
                "autocovariance read before finish()".into(),
            ));
        }
        if lag > self.max_lag {
            return Err(StatsError::InvalidArgument(format!(
                "lag {} exceeds max lag {}",
                lag, self.max_lag
            )));
        }
        let mean = self.mean();
        Ok(self.cosum[lag] / (self.n - lag as u64) as f64 - mean * mean)
    }

    /// Autocorrelation at `lag`; identically 1 at lag 0.
    pub fn autocorrelation(&self, lag: usize) -> StatsResult<f64> {
        if lag == 0 {
            if !self.finished {
                return Err(StatsError::InvalidState(
                    "autocorrelation read before finish()".into(),
                ));
            }
            return Ok(1.0);
        }
        Ok(self.autocovariance(lag)? / self.autocovariance(0)?)
    }

    /// The full spectrum `acf[0..=max_lag]`.
    pub fn spectrum(&self) -> StatsResult<Vec<f64>> {
        (0..=self.max_lag)
            .map(|lag| self.autocorrelation(lag))
            .collect()
    }

    /// Cutoff heuristic: the smallest lag `L >= 1` such that the next
    /// `window` lags (L itself included) all stay inside the ±2/√n
    /// significance band. `None` if no such run fits below `max_lag`.
    pub fn cutoff(&self, window: usize) -> StatsResult<Option<usize>> {
        if window == 0 {
            return Err(StatsError::InvalidArgument(
                "cutoff window must be at least 1".into(),
            ));
        }
        let band = 2.0 / (self.n as f64).sqrt();
        let mut run = 0usize;
        for lag in 1..=self.max_lag {
            if self.autocorrelation(lag)?.abs() < band {
                run += 1;
                if run >= window {
                    return Ok(Some(lag + 1 - window));
                }
            } else {
                run = 0;
            }
        }
        Ok(None)
    }
}
