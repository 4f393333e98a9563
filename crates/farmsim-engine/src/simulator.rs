//! The next-event loop.
//!
//! Single-threaded and cooperative: each iteration selects the next
//! event, advances the clock, applies processor sharing to every server
//! for the elapsed interval (the only place simulated time physically
//! advances), then mutates job state and re-derives departure estimates.
//! Once the clock reaches the configured duration the pending arrival is
//! forced to infinity and the loop drains departures until no job is in
//! flight, so every admitted job lands in the output statistics.

use farmsim_core::JobId;
use farmsim_cluster::{Job, LoadBalancer};
use farmsim_workload::WorkloadGenerator;
use tracing::{debug, info};

use crate::error::{EngineError, EngineResult};
use crate::events::{Event, FutureEventSet, JobRecord};
use crate::policy::{RunPolicy, SystemView};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Running,
    Draining,
    Terminated,
}

pub struct Simulator {
    clock: f64,
    duration: f64,
    balancer: LoadBalancer,
    workload: Box<dyn WorkloadGenerator>,
    fes: FutureEventSet,
    next_job_id: u64,
    phase: Phase,
    arrivals: u64,
    completed: u64,
}

impl Simulator {
    pub fn new(
        balancer: LoadBalancer,
        mut workload: Box<dyn WorkloadGenerator>,
        duration: f64,
    ) -> EngineResult<Self> {
        if duration <= 0.0 {
            return Err(EngineError::InvalidArgument(format!(
                "duration must be positive, got {duration}"
            )));
        }
        let first_arrival = workload.next_arrival(0.0)?;
        Ok(Self {
            clock: 0.0,
            duration,
            balancer,
            workload,
            fes: FutureEventSet::new(first_arrival),
            next_job_id: 0,
            phase: Phase::Running,
            arrivals: 0,
            completed: 0,
        })
    }

    pub fn clock(&self) -> f64 {
        self.clock
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn arrivals(&self) -> u64 {
        self.arrivals
    }

    pub fn completed(&self) -> u64 {
        self.completed
    }

    pub fn balancer(&self) -> &LoadBalancer {
        &self.balancer
    }

    /// Run to completion: process events until the duration is exhausted
    /// and the system has drained.
    pub fn run(&mut self, policy: &mut dyn RunPolicy) -> EngineResult<()> {
        if self.phase == Phase::Terminated {
            return Err(EngineError::InvalidState(
                "simulator already terminated".into(),
            ));
        }
        loop {
            let Some(event) = self.fes.next_event()? else {
                break;
            };
            if self.phase == Phase::Running && event.at() >= self.duration {
                debug!(
                    clock = event.at(),
                    in_flight = self.fes.len(),
                    "duration reached, draining"
                );
                self.phase = Phase::Draining;
                self.fes.suppress_arrivals();
                if matches!(event, Event::Arrival { .. }) {
                    continue;
                }
            }

            let elapsed = event.at() - self.clock;
            self.balancer.process_jobs(elapsed)?;
            self.clock = event.at();

            match event {
                Event::Arrival { .. } => self.handle_arrival(policy)?,
                Event::Departure { job, .. } => self.handle_departure(job, policy)?,
            }
        }
        self.phase = Phase::Terminated;
        info!(
            clock = self.clock,
            arrivals = self.arrivals,
            completed = self.completed,
            drift_corrections = self.balancer.drift_corrections(),
            "simulation terminated"
        );
        Ok(())
    }

    fn handle_arrival(&mut self, policy: &mut dyn RunPolicy) -> EngineResult<()> {
        let size = self.workload.next_job_size()?;
        let id = JobId(self.next_job_id);
        self.next_job_id += 1;

        let job = Job::new(id, size)?;
        let server = self.balancer.assign_job(job, self.clock)?;
        self.fes.insert(
            id,
            JobRecord {
                arrival: self.clock,
                size,
                server,
                estimated_departure: None,
            },
        );
        // Concurrency changed on the target server: every sibling's rate
        // is stale, so all estimates are re-derived.
        self.reestimate()?;

        let next = self.workload.next_arrival(self.clock)?;
        self.fes.set_next_arrival(next);
        self.arrivals += 1;
        policy.on_arrival(self.clock, &self.system_view())
    }

    fn handle_departure(
        &mut self,
        job: JobId,
        policy: &mut dyn RunPolicy,
    ) -> EngineResult<()> {
        let record = self
            .fes
            .remove(job)
            .ok_or_else(|| EngineError::InvalidState(format!("no record for departing {job}")))?;
        let response_time = self.clock - record.arrival;

        // Residual-work validation (clamp or abort) happens inside the
        // balancer before the job is released.
        let done = self
            .balancer
            .complete_job(job, record.server, self.clock, response_time)?;
        debug_assert_eq!(done.job.remaining(), 0.0);

        self.completed += 1;
        self.reestimate()?;
        policy.on_departure(self.clock, response_time, done.tier, &self.system_view())
    }

    /// Re-derive `estimated_departure` for every in-flight job from its
    /// server's current rate.
    fn reestimate(&mut self) -> EngineResult<()> {
        let clock = self.clock;
        let Self { fes, balancer, .. } = self;
        for (&job, record) in fes.records_mut() {
            let server = balancer.server(record.server).ok_or_else(|| {
                EngineError::InvalidState(format!("{job} references missing {}", record.server))
            })?;
            let remaining = server
                .job(job)
                .ok_or_else(|| {
                    EngineError::InvalidState(format!("{job} not owned by {}", record.server))
                })?
                .remaining();
            let rate = server.rate();
            if rate <= 0.0 {
                return Err(EngineError::InvalidState(format!(
                    "{} has jobs but no service rate",
                    record.server
                )));
            }
            record.estimated_departure = Some(clock + remaining / rate);
        }
        Ok(())
    }

    fn system_view(&self) -> SystemView {
        let pool = self.balancer.pool();
        let spike_busy = self
            .balancer
            .spike()
            .map_or(0, |s| usize::from(s.concurrency() > 0));
        SystemView {
            jobs_in_system: self.balancer.jobs_in_system(),
            active_servers: pool.active_count(),
            draining_servers: pool.draining_count(),
            busy_servers: pool.busy_count() + spike_busy,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use farmsim_cluster::{
        HorizontalScaler, ServerPool, Tier,
        scheduling::LeastLoad,
        spike::Disabled,
    };
    use farmsim_workload::TraceWorkload;

    /// Captures every departure the simulator reports.
    #[derive(Default)]
    struct Recorder {
        departures: Vec<(f64, f64)>,
        arrivals: Vec<f64>,
    }

    impl RunPolicy for Recorder {
        fn on_arrival(&mut self, now: f64, _system: &SystemView) -> EngineResult<()> {
            self.arrivals.push(now);
            Ok(())
        }

        fn on_departure(
            &mut self,
            now: f64,
            response_time: f64,
            _tier: Tier,
            _system: &SystemView,
        ) -> EngineResult<()> {
            self.departures.push((now, response_time));
            Ok(())
        }

        fn on_run_end(&mut self, _now: f64) -> EngineResult<()> {
            Ok(())
        }

        fn on_finalize(&mut self, _now: f64) -> EngineResult<()> {
            Ok(())
        }
    }

    fn single_server_balancer() -> LoadBalancer {
        LoadBalancer::new(
            ServerPool::new(1).unwrap(),
            None,
            Box::new(LeastLoad),
            Box::new(Disabled),
            // Thresholds wide enough that scaling never triggers.
            HorizontalScaler::new(8, 1e-12, 1e12, 0.0).unwrap(),
        )
    }

    #[test]
    fn processor_sharing_delays_the_small_job() {
        // Two jobs of size 1.0 and 2.0 arrive together on one unit-rate
        // server. Sharing halves the rate, so the small job departs at
        // t = 2.0, not 1.0; the big one at t = 3.0.
        let trace = TraceWorkload::new(vec![(0.0, 1.0), (0.0, 2.0)]);
        let mut sim =
            Simulator::new(single_server_balancer(), Box::new(trace), 100.0).unwrap();
        let mut recorder = Recorder::default();
        sim.run(&mut recorder).unwrap();

        assert_eq!(sim.completed(), 2);
        assert_eq!(recorder.departures.len(), 2);
        let (t1, rt1) = recorder.departures[0];
        let (t2, rt2) = recorder.departures[1];
        assert!((t1 - 2.0).abs() < 1e-9, "first departure at {t1}");
        assert!((rt1 - 2.0).abs() < 1e-9);
        assert!((t2 - 3.0).abs() < 1e-9, "second departure at {t2}");
        assert!((rt2 - 3.0).abs() < 1e-9);
        assert_eq!(sim.phase(), Phase::Terminated);
    }

    #[test]
    fn draining_accounts_for_every_admitted_job() {
        // Duration cuts arrivals after the first two jobs; both are still
        // in flight then and must drain to completion. The third trace
        // entry is never admitted.
        let trace = TraceWorkload::new(vec![(0.0, 1.0), (0.0, 2.0), (10.0, 5.0)]);
        let mut sim =
            Simulator::new(single_server_balancer(), Box::new(trace), 1.5).unwrap();
        let mut recorder = Recorder::default();
        sim.run(&mut recorder).unwrap();

        assert_eq!(sim.arrivals(), 2);
        assert_eq!(sim.completed(), 2);
        assert!(sim.clock() > 1.5);
        assert_eq!(sim.phase(), Phase::Terminated);
    }

    #[test]
    fn empty_trace_terminates_immediately() {
        let trace = TraceWorkload::new(vec![]);
        let mut sim =
            Simulator::new(single_server_balancer(), Box::new(trace), 10.0).unwrap();
        let mut recorder = Recorder::default();
        sim.run(&mut recorder).unwrap();
        assert_eq!(sim.completed(), 0);
        assert_eq!(sim.clock(), 0.0);
        assert_eq!(sim.phase(), Phase::Terminated);
    }

    #[test]
    fn sequential_jobs_do_not_interact() {
        // Second job arrives after the first finished: both run alone.
        let trace = TraceWorkload::new(vec![(0.0, 1.0), (2.0, 1.0)]);
        let mut sim =
            Simulator::new(single_server_balancer(), Box::new(trace), 100.0).unwrap();
        let mut recorder = Recorder::default();
        sim.run(&mut recorder).unwrap();

        assert_eq!(recorder.departures.len(), 2);
        assert!((recorder.departures[0].1 - 1.0).abs() < 1e-9);
        assert!((recorder.departures[1].1 - 1.0).abs() < 1e-9);
    }

    #[test]
    fn rerunning_a_terminated_simulator_fails() {
        let trace = TraceWorkload::new(vec![]);
        let mut sim =
            Simulator::new(single_server_balancer(), Box::new(trace), 1.0).unwrap();
        let mut recorder = Recorder::default();
        sim.run(&mut recorder).unwrap();
        assert!(matches!(
            sim.run(&mut recorder),
            Err(EngineError::InvalidState(_))
        ));
    }

    #[test]
    fn zero_duration_is_rejected() {
        let trace = TraceWorkload::new(vec![]);
        assert!(Simulator::new(single_server_balancer(), Box::new(trace), 0.0).is_err());
    }
}
