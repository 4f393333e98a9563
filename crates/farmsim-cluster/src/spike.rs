//! Spike routing — overflow decision for a newly admitted job.
//!
//! The spike server is a burst-capacity fallback with different effective
//! capacity (typically a higher multiplier at a reduced grant). The
//! router only decides; attaching the job is the balancer's business.

use crate::server::Server;

/// Routing decision for a new job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Route {
    /// Keep the job on the scheduling policy's candidate.
    AssignToChosen,
    /// Divert the job to the dedicated spike server.
    RouteToSpike,
}

pub trait SpikeRouter {
    fn decide(&self, candidate: &Server, now: f64) -> Route;
}

/// Spike tier disabled: every job stays on the chosen server.
pub struct Disabled;

impl SpikeRouter for Disabled {
    fn decide(&self, _candidate: &Server, _now: f64) -> Route {
        Route::AssignToChosen
    }
}

/// Routes to the spike server once the candidate's concurrency reaches a
/// fixed threshold.
pub struct SimpleThreshold {
    si_max: usize,
}

impl SimpleThreshold {
    pub fn new(si_max: usize) -> Self {
        Self { si_max }
    }
}

impl SpikeRouter for SimpleThreshold {
    fn decide(&self, candidate: &Server, _now: f64) -> Route {
        if candidate.concurrency() >= self.si_max {
            Route::RouteToSpike
        } else {
            Route::AssignToChosen
        }
    }
}
