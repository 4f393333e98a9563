//! Experiment orchestration.
//!
//! Builds the cluster, workload, and run policy from a `SimConfig` and
//! drives one or more simulation runs against one output sink. Each
//! replication gets a fresh cluster and its own deterministic seed
//! offset, so runs share no state beyond the emitted rows.

use farmsim_core::{RunKind, SimConfig};
use farmsim_cluster::{
    Disabled, HorizontalScaler, LoadBalancer, SPIKE_SERVER_ID, Server, ServerPool,
    SimpleThreshold, SpikeRouter, build_scheduling,
};
use farmsim_workload::build_workload;
use serde::Serialize;
use tracing::info;

use crate::error::{EngineError, EngineResult};
use crate::policy::{AutocorrelationDiagnostic, BatchMeans, Replication, RunPolicy};
use crate::report::ReportSink;
use crate::simulator::Simulator;

/// Seed spacing between replications, so each run draws from its own
/// stream partition.
const REPLICATION_SEED_STRIDE: u64 = 6_364_136_223_846_793_005;

/// Aggregate outcome across all runs of one experiment.
#[derive(Debug, Clone, Default, Serialize)]
pub struct RunSummary {
    pub runs: u32,
    pub arrivals: u64,
    pub completed: u64,
    pub final_clock: f64,
    pub drift_corrections: u64,
    pub scale_outs: u64,
    pub scale_ins: u64,
    pub refused_scale_ins: u64,
    pub servers_remaining: usize,
}

pub struct Experiment {
    config: SimConfig,
}

impl Experiment {
    pub fn new(config: SimConfig) -> EngineResult<Self> {
        config.validate()?;
        Ok(Self { config })
    }

    /// Run the configured experiment, writing rows to `sink`.
    pub fn run(&self, sink: Box<dyn ReportSink>) -> EngineResult<RunSummary> {
        let confidence = self.config.run.confidence.unwrap_or(0.95);
        match self.config.run_kind()? {
            RunKind::BatchMeans => {
                let batch_size = self.config.run.batch_size.ok_or_else(|| {
                    EngineError::InvalidArgument("batch-means needs run.batch_size".into())
                })?;
                if batch_size == 0 {
                    return Err(EngineError::InvalidArgument(
                        "run.batch_size must be positive".into(),
                    ));
                }
                let mut policy = BatchMeans::new(sink, batch_size, confidence)?;
                self.run_repetitions(1, &mut policy)
            }
            RunKind::Replication => {
                let replications = self.config.run.replications.ok_or_else(|| {
                    EngineError::InvalidArgument("replication needs run.replications".into())
                })?;
                if replications == 0 {
                    return Err(EngineError::InvalidArgument(
                        "run.replications must be positive".into(),
                    ));
                }
                let mut policy = Replication::new(sink, confidence)?;
                self.run_repetitions(replications, &mut policy)
            }
            RunKind::Autocorrelation => {
                let max_lag = self.config.run.max_lag.unwrap_or(50);
                let band_window = self.config.run.band_window.unwrap_or(10);
                let mut policy = AutocorrelationDiagnostic::new(
                    sink,
                    max_lag,
                    band_window,
                    self.config.run.warmup_time,
                    self.config.run.warmup_jobs,
                )?;
                self.run_repetitions(1, &mut policy)
            }
        }
    }

    fn run_repetitions(
        &self,
        runs: u32,
        policy: &mut dyn RunPolicy,
    ) -> EngineResult<RunSummary> {
        let mut summary = RunSummary::default();
        let mut last_clock = 0.0;

        for run in 0..runs {
            let seed = self
                .config
                .simulation
                .seed
                .wrapping_add(REPLICATION_SEED_STRIDE.wrapping_mul(run as u64));
            let workload = build_workload(&self.config.workload, seed)?;
            let balancer = self.build_balancer()?;
            let mut sim =
                Simulator::new(balancer, workload, self.config.simulation.duration)?;
            sim.run(policy)?;
            policy.on_run_end(sim.clock())?;

            let balancer = sim.balancer();
            info!(
                run,
                seed,
                clock = sim.clock(),
                arrivals = sim.arrivals(),
                completed = sim.completed(),
                servers = balancer.pool().active_count(),
                scale_outs = balancer.scale_outs(),
                scale_ins = balancer.scale_ins(),
                refused_scale_ins = balancer.refused_scale_ins(),
                drift_corrections = balancer.drift_corrections(),
                "run finished"
            );

            summary.runs += 1;
            summary.arrivals += sim.arrivals();
            summary.completed += sim.completed();
            summary.drift_corrections += balancer.drift_corrections();
            summary.scale_outs += balancer.scale_outs();
            summary.scale_ins += balancer.scale_ins();
            summary.refused_scale_ins += balancer.refused_scale_ins();
            summary.servers_remaining = balancer.pool().active_count();
            last_clock = sim.clock();
        }

        summary.final_clock = last_clock;
        policy.on_finalize(last_clock)?;
        Ok(summary)
    }

    fn build_balancer(&self) -> EngineResult<LoadBalancer> {
        let pool = ServerPool::new(self.config.cluster.initial_servers)?;
        let scheduling = build_scheduling(self.config.scheduling_kind()?);
        let (spike, router): (Option<Server>, Box<dyn SpikeRouter>) =
            match &self.config.cluster.spike {
                Some(s) => (
                    Some(Server::with_capacity(
                        SPIKE_SERVER_ID,
                        s.cpu_multiplier,
                        s.cpu_percentage,
                    )?),
                    Box::new(SimpleThreshold::new(s.threshold as usize)),
                ),
                None => (None, Box::new(Disabled)),
            };
        let scaler = HorizontalScaler::new(
            self.config.scaling.window,
            self.config.scaling.r0_min,
            self.config.scaling.r0_max,
            self.config.scaling.cooldown,
        )?;
        Ok(LoadBalancer::new(pool, spike, scheduling, router, scaler))
    }
}
