//! Scheduling policies — candidate selection for a new job.

use farmsim_core::SchedulingKind;

use crate::error::{ClusterError, ClusterResult};
use crate::server::Server;

pub trait SchedulingPolicy {
    /// Index of the candidate server in the active pool. Fails on an
    /// empty pool.
    fn select(&mut self, servers: &[Server]) -> ClusterResult<usize>;
}

/// Picks the minimum-concurrency server, ties broken by iteration order.
pub struct LeastLoad;

impl SchedulingPolicy for LeastLoad {
    fn select(&mut self, servers: &[Server]) -> ClusterResult<usize> {
        servers
            .iter()
            .enumerate()
            .min_by_key(|(_, s)| s.concurrency())
            .map(|(i, _)| i)
            .ok_or(ClusterError::NoServerAvailable)
    }
}

/// Cycles a stored cursor modulo the current pool size, self-correcting
/// if the pool shrank since the last call.
#[derive(Default)]
pub struct RoundRobin {
    cursor: usize,
}

impl SchedulingPolicy for RoundRobin {
    fn select(&mut self, servers: &[Server]) -> ClusterResult<usize> {
        if servers.is_empty() {
            return Err(ClusterError::NoServerAvailable);
        }
        let idx = self.cursor % servers.len();
        self.cursor = idx + 1;
        Ok(idx)
    }
}

pub fn build_scheduling(kind: SchedulingKind) -> Box<dyn SchedulingPolicy> {
    match kind {
        SchedulingKind::LeastLoad => Box::new(LeastLoad),
        SchedulingKind::RoundRobin => Box::new(RoundRobin::default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::Job;
    use farmsim_core::{JobId, ServerId};

    fn servers_with_loads(loads: &[usize]) -> Vec<Server> {
        let mut next_job = 0u64;
        loads
            .iter()
            .enumerate()
            .map(|(i, &load)| {
                let mut srv = Server::new(ServerId(i as u32));
                for _ in 0..load {
                    srv.push_job(Job::new(JobId(next_job), 1.0).unwrap());
                    next_job += 1;
                }
                srv
            })
            .collect()
    }

    #[test]
    fn least_load_picks_minimum_concurrency() {
        let servers = servers_with_loads(&[3, 1, 2]);
        assert_eq!(LeastLoad.select(&servers).unwrap(), 1);
    }

    #[test]
    fn least_load_breaks_ties_by_order() {
        let servers = servers_with_loads(&[2, 1, 1]);
        assert_eq!(LeastLoad.select(&servers).unwrap(), 1);
    }

    #[test]
    fn round_robin_cycles() {
        let servers = servers_with_loads(&[0, 0, 0]);
        let mut rr = RoundRobin::default();
        assert_eq!(rr.select(&servers).unwrap(), 0);
        assert_eq!(rr.select(&servers).unwrap(), 1);
        assert_eq!(rr.select(&servers).unwrap(), 2);
        assert_eq!(rr.select(&servers).unwrap(), 0);
    }

    #[test]
    fn round_robin_self_corrects_after_shrink() {
        let mut rr = RoundRobin::default();
        let four = servers_with_loads(&[0, 0, 0, 0]);
        rr.select(&four).unwrap();
        rr.select(&four).unwrap();
        rr.select(&four).unwrap(); // cursor now 3

        let two = servers_with_loads(&[0, 0]);
        assert_eq!(rr.select(&two).unwrap(), 1); // 3 % 2
        assert_eq!(rr.select(&two).unwrap(), 0);
    }

    #[test]
    fn empty_pool_fails() {
        assert!(matches!(
            LeastLoad.select(&[]),
            Err(ClusterError::NoServerAvailable)
        ));
        assert!(matches!(
            RoundRobin::default().select(&[]),
            Err(ClusterError::NoServerAvailable)
        ));
    }
}
