//! Processor-sharing server.
//!
//! All active jobs on a server receive an equal share of its effective
//! capacity simultaneously. The per-job rate is constant between events
//! because it only changes when concurrency changes, and the engine
//! re-derives departure estimates at every such change.

use farmsim_core::{JobId, ServerId};

use crate::error::{ClusterError, ClusterResult};
use crate::job::Job;

#[derive(Debug, Clone)]
pub struct Server {
    id: ServerId,
    cpu_multiplier: f64,
    cpu_percentage: f64,
    jobs: Vec<Job>,
}

impl Server {
    /// A normal server: multiplier 1, full capacity granted.
    pub fn new(id: ServerId) -> Self {
        Self {
            id,
            cpu_multiplier: 1.0,
            cpu_percentage: 1.0,
            jobs: Vec::new(),
        }
    }

    /// A server with explicit relative capacity, e.g. the spike server
    /// (multiplier above 1, percentage below 1).
    pub fn with_capacity(
        id: ServerId,
        cpu_multiplier: f64,
        cpu_percentage: f64,
    ) -> ClusterResult<Self> {
        if cpu_multiplier <= 0.0 || cpu_percentage <= 0.0 {
            return Err(ClusterError::InvalidArgument(format!(
                "capacity factors must be positive, got multiplier {cpu_multiplier}, percentage {cpu_percentage}"
            )));
        }
        Ok(Self {
            id,
            cpu_multiplier,
            cpu_percentage,
            jobs: Vec::new(),
        })
    }

    pub fn id(&self) -> ServerId {
        self.id
    }

    pub fn cpu_multiplier(&self) -> f64 {
        self.cpu_multiplier
    }

    pub fn cpu_percentage(&self) -> f64 {
        self.cpu_percentage
    }

    /// Effective capacity in work units per time unit.
    pub fn capacity(&self) -> f64 {
        self.cpu_percentage * self.cpu_multiplier
    }

    pub fn concurrency(&self) -> usize {
        self.jobs.len()
    }

    /// Instantaneous per-job service rate; zero when idle.
    pub fn rate(&self) -> f64 {
        if self.jobs.is_empty() {
            0.0
        } else {
            self.capacity() / self.jobs.len() as f64
        }
    }

    pub fn jobs(&self) -> &[Job] {
        &self.jobs
    }

    pub fn job(&self, id: JobId) -> Option<&Job> {
        self.jobs.iter().find(|j| j.id() == id)
    }

    pub(crate) fn job_mut(&mut self, id: JobId) -> Option<&mut Job> {
        self.jobs.iter_mut().find(|j| j.id() == id)
    }

    /// Attach a job; the server takes ownership and stamps itself as the
    /// job's handle.
    pub fn push_job(&mut self, mut job: Job) {
        job.set_server(self.id);
        self.jobs.push(job);
    }

    /// Detach a job, releasing ownership back to the caller.
    pub fn remove_job(&mut self, id: JobId) -> ClusterResult<Job> {
        let pos = self
            .jobs
            .iter()
            .position(|j| j.id() == id)
            .ok_or(ClusterError::UnknownJob {
                job: id,
                server: self.id,
            })?;
        let mut job = self.jobs.remove(pos);
        job.clear_server();
        Ok(job)
    }

    /// Advance all active jobs by `elapsed` at the shared rate.
    pub fn process_jobs(&mut self, elapsed: f64) -> ClusterResult<()> {
        if elapsed < 0.0 {
            return Err(ClusterError::InvalidArgument(format!(
                "elapsed time must be non-negative, got {elapsed}"
            )));
        }
        if self.jobs.is_empty() {
            return Ok(());
        }
        let amount = self.rate() * elapsed;
        for job in &mut self.jobs {
            job.process(amount)?;
        }
        Ok(())
    }
}
