//! Load balancer — the job-admission / job-completion contract.
//!
//! Composes the server pool, the optional spike server, and the three
//! pluggable policies. Admission asks the scheduling policy for a
//! candidate and the spike router for a routing decision; completion
//! validates residual work, detaches the job, and drives the horizontal
//! scaler, committing its cooldown clock only for actions the pool
//! actually performed.

use farmsim_core::{DRIFT_ABORT_FACTOR, EPSILON, JobId, ServerId};
use tracing::{debug, warn};

use crate::error::{ClusterError, ClusterResult};
use crate::job::Job;
use crate::pool::ServerPool;
use crate::scaler::{HorizontalScaler, ScaleAction};
use crate::scheduling::SchedulingPolicy;
use crate::server::Server;
use crate::spike::{Route, SpikeRouter};

/// Reserved id for the spike server; pool ids grow from zero and never
/// reach it.
pub const SPIKE_SERVER_ID: ServerId = ServerId(u32::MAX);

/// Which tier served a completed job.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tier {
    Pool,
    Spike,
}

/// A job released by `complete_job`.
#[derive(Debug)]
pub struct CompletedJob {
    pub job: Job,
    pub tier: Tier,
    /// Residual work was nonzero but within tolerance and was clamped.
    pub drift_corrected: bool,
}

pub struct LoadBalancer {
    pool: ServerPool,
    spike: Option<Server>,
    scheduling: Box<dyn SchedulingPolicy>,
    router: Box<dyn SpikeRouter>,
    scaler: HorizontalScaler,
    drift_corrections: u64,
    scale_outs: u64,
    scale_ins: u64,
    refused_scale_ins: u64,
}

impl LoadBalancer {
    pub fn new(
        pool: ServerPool,
        spike: Option<Server>,
        scheduling: Box<dyn SchedulingPolicy>,
        router: Box<dyn SpikeRouter>,
        scaler: HorizontalScaler,
    ) -> Self {
        Self {
            pool,
            spike,
            scheduling,
            router,
            scaler,
            drift_corrections: 0,
            scale_outs: 0,
            scale_ins: 0,
            refused_scale_ins: 0,
        }
    }

    /// Admit a new job: candidate from the scheduling policy, routing
    /// decision from the spike router, then attach. Returns the id of
    /// the server that took the job.
    pub fn assign_job(&mut self, job: Job, now: f64) -> ClusterResult<ServerId> {
        let candidate_idx = self.scheduling.select(self.pool.servers())?;
        let candidate = &self.pool.servers()[candidate_idx];
        let candidate_id = candidate.id();

        match self.router.decide(candidate, now) {
            Route::AssignToChosen => {
                self.pool
                    .server_mut(candidate_id)
                    .ok_or(ClusterError::UnknownServer(candidate_id))?
                    .push_job(job);
                Ok(candidate_id)
            }
            Route::RouteToSpike => {
                let spike = self.spike.as_mut().ok_or_else(|| {
                    ClusterError::InvalidState(
                        "router diverted to spike but no spike server is configured".into(),
                    )
                })?;
                debug!(candidate = %candidate_id, "overflow routed to spike server");
                spike.push_job(job);
                Ok(spike.id())
            }
        }
    }

    /// Complete a job: validate residual work, detach it from its server
    /// (reclaiming a drained server's id if that emptied it), then run
    /// the scaling control loop.
    pub fn complete_job(
        &mut self,
        job: JobId,
        server: ServerId,
        now: f64,
        response_time: f64,
    ) -> ClusterResult<CompletedJob> {
        if now < 0.0 {
            return Err(ClusterError::InvalidArgument(format!(
                "completion time must be non-negative, got {now}"
            )));
        }
        if response_time <= 0.0 {
            return Err(ClusterError::InvalidArgument(format!(
                "response time must be positive, got {response_time}"
            )));
        }

        let (mut released, tier) = match &mut self.spike {
            Some(spike) if spike.id() == server => (spike.remove_job(job)?, Tier::Spike),
            _ => (self.pool.complete_job(server, job)?, Tier::Pool),
        };

        let residual = released.remaining();
        if residual.abs() >= DRIFT_ABORT_FACTOR * EPSILON {
            return Err(ClusterError::ExcessiveResidual {
                job,
                remaining: residual,
            });
        }
        let drift_corrected = residual != 0.0;
        if drift_corrected {
            self.drift_corrections += 1;
            if residual.abs() >= EPSILON {
                warn!(%job, residual, "residual work above epsilon, clamped");
            }
            released.clamp_residual();
        }

        match self.scaler.notify_departure(response_time, now)? {
            ScaleAction::ScaleOut => {
                self.pool.scale_out();
                self.scaler.record_action(now);
                self.scale_outs += 1;
            }
            ScaleAction::ScaleIn => {
                if self.pool.scale_in().is_some() {
                    self.scaler.record_action(now);
                    self.scale_ins += 1;
                } else {
                    // Refused at the floor: the cooldown clock stays put.
                    self.refused_scale_ins += 1;
                }
            }
            ScaleAction::None => {}
        }

        Ok(CompletedJob {
            job: released,
            tier,
            drift_corrected,
        })
    }

    /// Advance every server, pool and spike alike.
    pub fn process_jobs(&mut self, elapsed: f64) -> ClusterResult<()> {
        self.pool.process_jobs(elapsed)?;
        if let Some(spike) = &mut self.spike {
            spike.process_jobs(elapsed)?;
        }
        Ok(())
    }

    /// Look up any server: active, draining, or spike.
    pub fn server(&self, id: ServerId) -> Option<&Server> {
        match &self.spike {
            Some(spike) if spike.id() == id => Some(spike),
            _ => self.pool.server(id),
        }
    }

    pub fn pool(&self) -> &ServerPool {
        &self.pool
    }

    pub fn spike(&self) -> Option<&Server> {
        self.spike.as_ref()
    }

    /// Jobs in flight across pool, draining, and spike servers.
    pub fn jobs_in_system(&self) -> usize {
        self.pool.total_concurrency()
            + self.spike.as_ref().map_or(0, |s| s.concurrency())
    }

    pub fn drift_corrections(&self) -> u64 {
        self.drift_corrections
    }

    pub fn scale_outs(&self) -> u64 {
        self.scale_outs
    }

    pub fn scale_ins(&self) -> u64 {
        self.scale_ins
    }

    pub fn refused_scale_ins(&self) -> u64 {
        self.refused_scale_ins
    }
}
