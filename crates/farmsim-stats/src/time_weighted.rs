//! Time-weighted running moments of a right-continuous step function.
//!
//! The tracked quantity (jobs in system, pool size) holds its value
//! between updates. Each `update(new_value, new_time)` first absorbs the
//! *previous* value weighted by the elapsed interval, then holds the new
//! value. This is West's weighted-increment Welford recurrence with the
//! interval length as the weight, so mean and variance are integrals
//! over time rather than per-sample moments.

use crate::error::{StatsError, StatsResult};

#[derive(Debug, Clone)]
pub struct TimeWeighted {
    time: f64,
    held: Option<f64>,
    weight: f64,
    mean: f64,
    m2: f64,
}

impl TimeWeighted {
    /// Start tracking at `start_time` with no held value.
    pub fn new(start_time: f64) -> Self {
        Self {
            time: start_time,
            held: None,
            weight: 0.0,
            mean: 0.0,
            m2: 0.0,
        }
    }

    /// Record that the step function takes `new_value` from `new_time` on.
    ///
    /// Time must not run backwards.
    pub fn update(&mut self, new_value: f64, new_time: f64) -> StatsResult<()> {
        if new_time < self.time {
            return Err(StatsError::InvalidArgument(format!(
                "time went backwards: {} -> {}",
                self.time, new_time
            )));
        }
        if let Some(held) = self.held {
            self.absorb(held, new_time - self.time);
        }
        self.held = Some(new_value);
        self.time = new_time;
        Ok(())
    }

    /// Absorb the final segment up to `end_time`. The held value stays
    /// held, so `close` is idempotent for a fixed `end_time`.
    pub fn close(&mut self, end_time: f64) -> StatsResult<()> {
        if end_time < self.time {
            return Err(StatsError::InvalidArgument(format!(
                "time went backwards: {} -> {}",
                self.time, end_time
            )));
        }
        if let Some(held) = self.held {
            self.absorb(held, end_time - self.time);
        }
        self.time = end_time;
        Ok(())
    }

    fn absorb(&mut self, value: f64, duration: f64) {
        if duration <= 0.0 {
            return;
        }
        self.weight += duration;
        let delta = value - self.mean;
        self.mean += delta * duration / self.weight;
        self.m2 += duration * delta * (value - self.mean);
    }

    /// Total observed time with a held value.
    pub fn elapsed(&self) -> f64 {
        self.weight
    }

    /// Time-average of the step function; zero before any interval closes.
    pub fn mean(&self) -> f64 {
        self.mean
    }

    /// Time-weighted variance `m2 / total_time`.
    pub fn variance(&self) -> f64 {
        if self.weight > 0.0 {
            self.m2 / self.weight
        } else {
            0.0
        }
    }

    pub fn stddev(&self) -> f64 {
        self.variance().sqrt()
    }

    /// Forget accumulated moments but keep the held value and clock, so
    /// tracking continues seamlessly across a batch boundary.
    pub fn reset(&mut self) {
        self.weight = 0.0;
        self.mean = 0.0;
        self.m2 = 0.0;
    }
}
