//! Elastic server pool with graceful draining.
//!
//! The pool holds the schedulable servers plus a disjoint draining set:
//! servers removed from scheduling that keep processing their remaining
//! jobs. A draining server's id is reclaimed only once its last job
//! completes, so scale-in never drops work. Ids are reused lowest-first.

use std::cmp::Reverse;
use std::collections::BinaryHeap;

use farmsim_core::{JobId, ServerId};
use tracing::{debug, info};

use crate::error::{ClusterError, ClusterResult};
use crate::job::Job;
use crate::server::Server;

/// Picks the victim for a scale-in among the active servers.
pub trait RemovalPolicy {
    fn select_victim(&self, servers: &[Server]) -> Option<usize>;
}

/// Default removal policy: the server with the fewest active jobs, ties
/// broken by iteration order.
pub struct LeastLoadedRemoval;

impl RemovalPolicy for LeastLoadedRemoval {
    fn select_victim(&self, servers: &[Server]) -> Option<usize> {
        servers
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.concurrency())
            .map(|(i, _)| i)
    }
}

/// Lowest-first id allocator with reuse of freed ids.
#[derive(Debug, Default)]
struct IdAllocator {
    next: u32,
    free: BinaryHeap<Reverse<u32>>,
}

impl IdAllocator {
    fn allocate(&mut self) -> ServerId {
        if let Some(Reverse(id)) = self.free.pop() {
            ServerId(id)
        } else {
            let id = self.next;
            self.next += 1;
            ServerId(id)
        }
    }

    fn release(&mut self, id: ServerId) {
        self.free.push(Reverse(id.0));
    }
}

pub struct ServerPool {
    active: Vec<Server>,
    draining: Vec<Server>,
    ids: IdAllocator,
    removal: Box<dyn RemovalPolicy>,
}

impl ServerPool {
    /// A pool of `initial` normal servers with the default removal policy.
    pub fn new(initial: u32) -> ClusterResult<Self> {
        Self::with_removal_policy(initial, Box::new(LeastLoadedRemoval))
    }

    pub fn with_removal_policy(
        initial: u32,
        removal: Box<dyn RemovalPolicy>,
    ) -> ClusterResult<Self> {
        if initial == 0 {
            return Err(ClusterError::InvalidArgument(
                "pool must start with at least one server".into(),
            ));
        }
        let mut pool = Self {
            active: Vec::new(),
            draining: Vec::new(),
            ids: IdAllocator::default(),
            removal,
        };
        for _ in 0..initial {
            pool.scale_out();
        }
        Ok(pool)
    }

    /// Schedulable servers, in stable order.
    pub fn servers(&self) -> &[Server] {
        &self.active
    }

    pub fn draining(&self) -> &[Server] {
        &self.draining
    }

    pub fn active_count(&self) -> usize {
        self.active.len()
    }

    pub fn draining_count(&self) -> usize {
        self.draining.len()
    }

    /// Look up a server in either set.
    pub fn server(&self, id: ServerId) -> Option<&Server> {
        self.active
            .iter()
            .chain(self.draining.iter())
            .find(|s| s.id() == id)
    }

    pub fn server_mut(&mut self, id: ServerId) -> Option<&mut Server> {
        self.active
            .iter_mut()
            .chain(self.draining.iter_mut())
            .find(|s| s.id() == id)
    }

    /// Add a fresh normal server with the smallest free id. Always
    /// succeeds.
    pub fn scale_out(&mut self) -> ServerId {
        let id = self.ids.allocate();
        self.active.push(Server::new(id));
        info!(server = %id, active = self.active.len(), "scaled out");
        id
    }

    /// Remove one server from scheduling. Refused (returns `None`) at the
    /// one-server floor. A victim without jobs is decommissioned at once;
    /// a busy victim drains until empty.
    pub fn scale_in(&mut self) -> Option<ServerId> {
        if self.active.len() <= 1 {
            debug!("scale-in refused: pool at one-server floor");
            return None;
        }
        let victim_idx = self.removal.select_victim(&self.active)?;
        let victim = self.active.remove(victim_idx);
        let id = victim.id();
        if victim.concurrency() == 0 {
            self.ids.release(id);
            info!(server = %id, active = self.active.len(), "scaled in, id freed");
        } else {
            info!(
                server = %id,
                jobs = victim.concurrency(),
                "scaled in, draining until empty"
            );
            self.draining.push(victim);
        }
        Some(id)
    }

    /// Detach a finished job from the server owning it. When this empties
    /// a draining server, the server is decommissioned and its id freed.
    pub fn complete_job(&mut self, server: ServerId, job: JobId) -> ClusterResult<Job> {
        if let Some(srv) = self.active.iter_mut().find(|s| s.id() == server) {
            return srv.remove_job(job);
        }
        let idx = self
            .draining
            .iter()
            .position(|s| s.id() == server)
            .ok_or(ClusterError::UnknownServer(server))?;
        let released = self.draining[idx].remove_job(job)?;
        if self.draining[idx].concurrency() == 0 {
            self.draining.remove(idx);
            self.ids.release(server);
            info!(server = %server, "draining server empty, id reclaimed");
        }
        Ok(released)
    }

    /// Advance active and draining servers identically.
    pub fn process_jobs(&mut self, elapsed: f64) -> ClusterResult<()> {
        for srv in self.active.iter_mut().chain(self.draining.iter_mut()) {
            srv.process_jobs(elapsed)?;
        }
        Ok(())
    }

    /// Jobs currently active across both sets.
    pub fn total_concurrency(&self) -> usize {
        self.active
            .iter()
            .chain(self.draining.iter())
            .map(|s| s.concurrency())
            .sum()
    }

    /// Servers currently processing at least one job.
    pub fn busy_count(&self) -> usize {
        self.active
            .iter()
            .chain(self.draining.iter())
            .filter(|s| s.concurrency() > 0)
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn job(id: u64, size: f64) -> Job {
        Job::new(JobId(id), size).unwrap()
    }

    #[test]
    fn scale_out_always_grows_by_one() {
        let mut pool = ServerPool::new(1).unwrap();
        for expected in 2..6 {
            pool.scale_out();
            assert_eq!(pool.active_count(), expected);
        }
    }

    #[test]
    fn scale_in_refused_at_floor() {
        let mut pool = ServerPool::new(1).unwrap();
        assert_eq!(pool.scale_in(), None);
        assert_eq!(pool.active_count(), 1);
    }

    #[test]
    fn ids_are_allocated_lowest_first_and_reused() {
        let mut pool = ServerPool::new(3).unwrap();
        let ids: Vec<_> = pool.servers().iter().map(|s| s.id()).collect();
        assert_eq!(ids, vec![ServerId(0), ServerId(1), ServerId(2)]);

        // All empty, least-loaded removal picks the first: id 0 freed.
        assert_eq!(pool.scale_in(), Some(ServerId(0)));
        // Next scale-out must reuse the lowest freed id.
        assert_eq!(pool.scale_out(), ServerId(0));
    }

    #[test]
    fn least_loaded_victim_is_selected() {
        let mut pool = ServerPool::new(3).unwrap();
        pool.server_mut(ServerId(0)).unwrap().push_job(job(1, 1.0));
        pool.server_mut(ServerId(0)).unwrap().push_job(job(2, 1.0));
        pool.server_mut(ServerId(1)).unwrap().push_job(job(3, 1.0));
        // Server 2 is idle and must be the victim.
        assert_eq!(pool.scale_in(), Some(ServerId(2)));
        assert_eq!(pool.draining_count(), 0);
    }

    #[test]
    fn busy_victim_drains_until_last_job_completes() {
        let mut pool = ServerPool::new(2).unwrap();
        let srv = pool.server_mut(ServerId(0)).unwrap();
        srv.push_job(job(1, 1.0));
        srv.push_job(job(2, 1.0));
        srv.push_job(job(3, 1.0));
        pool.server_mut(ServerId(1)).unwrap().push_job(job(4, 1.0));
        pool.server_mut(ServerId(1)).unwrap().push_job(job(5, 1.0));

        // Server 0 has 3 jobs, server 1 has 2: server 1 is the victim.
        assert_eq!(pool.scale_in(), Some(ServerId(1)));
        assert_eq!(pool.active_count(), 1);
        assert_eq!(pool.draining_count(), 1);

        // Reclaimed only after exactly its 2 jobs complete, never earlier.
        pool.complete_job(ServerId(1), JobId(4)).unwrap();
        assert_eq!(pool.draining_count(), 1);
        pool.complete_job(ServerId(1), JobId(5)).unwrap();
        assert_eq!(pool.draining_count(), 0);

        // Its id is free again, lowest-first.
        assert_eq!(pool.scale_out(), ServerId(1));
    }

    #[test]
    fn draining_servers_keep_processing() {
        let mut pool = ServerPool::new(2).unwrap();
        pool.server_mut(ServerId(0)).unwrap().push_job(job(1, 2.0));
        pool.server_mut(ServerId(0)).unwrap().push_job(job(2, 2.0));
        // Server 1 carries one job: least loaded, and busy enough to drain.
        pool.server_mut(ServerId(1)).unwrap().push_job(job(3, 2.0));
        assert_eq!(pool.scale_in(), Some(ServerId(1)));
        assert_eq!(pool.draining_count(), 1);

        pool.process_jobs(1.0).unwrap();
        let remaining = pool.server(ServerId(1)).unwrap().job(JobId(3)).unwrap().remaining();
        assert!((remaining - 1.0).abs() < 1e-12);
    }

    #[test]
    fn complete_job_on_unknown_server_fails() {
        let mut pool = ServerPool::new(1).unwrap();
        assert!(matches!(
            pool.complete_job(ServerId(9), JobId(1)),
            Err(ClusterError::UnknownServer(_))
        ));
    }

    #[test]
    fn a_server_is_never_in_both_sets() {
        let mut pool = ServerPool::new(3).unwrap();
        pool.server_mut(ServerId(0)).unwrap().push_job(job(1, 1.0));
        pool.server_mut(ServerId(1)).unwrap().push_job(job(2, 1.0));
        pool.server_mut(ServerId(2)).unwrap().push_job(job(3, 1.0));
        let victim = pool.scale_in().unwrap();
        assert!(pool.servers().iter().all(|s| s.id() != victim));
        assert!(pool.draining().iter().any(|s| s.id() == victim));
    }
}
