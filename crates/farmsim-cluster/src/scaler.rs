//! Horizontal scaler — sliding-window control loop.
//!
//! Watches the mean of the most recent response times and requests
//! scale-out above `r0_max`, scale-in below `r0_min`. The cooldown veto
//! takes precedence over both thresholds, and the cooldown clock is only
//! committed by the balancer when the pool actually performed the action,
//! so a refused scale-in never delays the next attempt.

use std::collections::VecDeque;

use tracing::trace;

use crate::error::{ClusterError, ClusterResult};

/// Outcome of a control-loop evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScaleAction {
    None,
    ScaleOut,
    ScaleIn,
}

pub struct HorizontalScaler {
    window: VecDeque<f64>,
    window_size: usize,
    r0_min: f64,
    r0_max: f64,
    cooldown: f64,
    last_action_at: f64,
}

impl HorizontalScaler {
    /// `r0_min < r0_max` strictly; equality would let the loop oscillate.
    pub fn new(
        window_size: usize,
        r0_min: f64,
        r0_max: f64,
        cooldown: f64,
    ) -> ClusterResult<Self> {
        if window_size == 0 {
            return Err(ClusterError::InvalidArgument(
                "scaler window must hold at least one sample".into(),
            ));
        }
        if !(r0_min < r0_max) {
            return Err(ClusterError::InvalidArgument(format!(
                "hysteresis requires r0_min < r0_max, got {r0_min} >= {r0_max}"
            )));
        }
        if cooldown < 0.0 {
            return Err(ClusterError::InvalidArgument(format!(
                "cooldown must be non-negative, got {cooldown}"
            )));
        }
        Ok(Self {
            window: VecDeque::with_capacity(window_size),
            window_size,
            r0_min,
            r0_max,
            cooldown,
            last_action_at: f64::NEG_INFINITY,
        })
    }

    /// Feed one completed job's response time and evaluate the loop.
    pub fn notify_departure(
        &mut self,
        response_time: f64,
        now: f64,
    ) -> ClusterResult<ScaleAction> {
        if response_time < 0.0 {
            return Err(ClusterError::InvalidArgument(format!(
                "negative response time: {response_time}"
            )));
        }
        if self.window.len() == self.window_size {
            self.window.pop_front();
        }
        self.window.push_back(response_time);

        // Cooldown veto before any threshold comparison.
        if now - self.last_action_at < self.cooldown {
            return Ok(ScaleAction::None);
        }

        let mean = self.window_mean();
        trace!(mean, samples = self.window.len(), "scaler window evaluated");
        if mean > self.r0_max {
            Ok(ScaleAction::ScaleOut)
        } else if mean < self.r0_min {
            Ok(ScaleAction::ScaleIn)
        } else {
            Ok(ScaleAction::None)
        }
    }

    /// Commit the cooldown clock. Called only after the pool accepted the
    /// requested action.
    pub fn record_action(&mut self, now: f64) {
        self.last_action_at = now;
    }

    pub fn window_mean(&self) -> f64 {
        if self.window.is_empty() {
            0.0
        } else {
            self.window.iter().sum::<f64>() / self.window.len() as f64
        }
    }
}
