//! Run policies — what gets estimated, when it resets, what it emits.
//!
//! Driven by the simulator on every arrival and departure. `BatchMeans`
//! is the steady-state design: one long run split into fixed-size
//! batches, one summary row each. `Replication` emits one row per
//! independent run. `AutocorrelationDiagnostic` discards a warm-up and
//! emits the lag spectrum with a batch-size recommendation.

use farmsim_cluster::Tier;
use farmsim_stats::{Autocorrelation, TimeWeighted, Welford, half_width};
use tracing::{debug, info};

use crate::error::EngineResult;
use crate::report::ReportSink;

/// Cluster-wide state snapshot handed to the policy with every event.
#[derive(Debug, Clone, Copy)]
pub struct SystemView {
    pub jobs_in_system: usize,
    pub active_servers: usize,
    pub draining_servers: usize,
    pub busy_servers: usize,
}

pub trait RunPolicy {
    fn on_arrival(&mut self, now: f64, system: &SystemView) -> EngineResult<()>;

    fn on_departure(
        &mut self,
        now: f64,
        response_time: f64,
        tier: Tier,
        system: &SystemView,
    ) -> EngineResult<()>;

    /// One simulation run finished draining. Replication designs emit
    /// and reset here.
    fn on_run_end(&mut self, now: f64) -> EngineResult<()>;

    /// All runs finished; emit any terminal output and close the sink.
    fn on_finalize(&mut self, now: f64) -> EngineResult<()>;
}

fn fresh_clock() -> EngineResult<TimeWeighted> {
    let mut tw = TimeWeighted::new(0.0);
    // The system starts empty at time zero.
    tw.update(0.0, 0.0)?;
    Ok(tw)
}

/// Steady-state batch-means design.
pub struct BatchMeans {
    sink: Box<dyn ReportSink>,
    batch_size: u64,
    confidence: f64,
    batch_index: u64,
    batch_start: f64,
    response: Welford,
    pool_response: Welford,
    spike_response: Welford,
    jobs_in_system: TimeWeighted,
    active_servers: TimeWeighted,
    busy_servers: TimeWeighted,
}

impl BatchMeans {
    pub const COLUMNS: &'static [&'static str] = &[
        "batch",
        "completions",
        "mean_response",
        "stddev_response",
        "variance_response",
        "half_width",
        "pool_throughput",
        "spike_throughput",
        "blended_response",
        "mean_jobs_in_system",
        "mean_active_servers",
        "mean_busy_servers",
    ];

    pub fn new(
        mut sink: Box<dyn ReportSink>,
        batch_size: u64,
        confidence: f64,
    ) -> EngineResult<Self> {
        sink.write_header(Self::COLUMNS)?;
        Ok(Self {
            sink,
            batch_size,
            confidence,
            batch_index: 0,
            batch_start: 0.0,
            response: Welford::new(),
            pool_response: Welford::new(),
            spike_response: Welford::new(),
            jobs_in_system: fresh_clock()?,
            active_servers: fresh_clock()?,
            busy_servers: fresh_clock()?,
        })
    }

    fn emit_batch(&mut self, now: f64) -> EngineResult<()> {
        let n = self.response.count();
        let elapsed = (now - self.batch_start).max(f64::MIN_POSITIVE);
        let pool_throughput = self.pool_response.count() as f64 / elapsed;
        let spike_throughput = self.spike_response.count() as f64 / elapsed;
        let total_throughput = pool_throughput + spike_throughput;
        let blended = if total_throughput > 0.0 {
            (pool_throughput * self.pool_response.mean()
                + spike_throughput * self.spike_response.mean())
                / total_throughput
        } else {
            0.0
        };
        let hw = if n >= 2 {
            half_width(n, self.response.stddev(), self.confidence)?
        } else {
            0.0
        };
        self.jobs_in_system.close(now)?;
        self.active_servers.close(now)?;
        self.busy_servers.close(now)?;

        self.sink.write_row(&[
            self.batch_index.to_string(),
            n.to_string(),
            format!("{:.6}", self.response.mean()),
            format!("{:.6}", self.response.stddev()),
            format!("{:.6}", self.response.variance()),
            format!("{hw:.6}"),
            format!("{pool_throughput:.6}"),
            format!("{spike_throughput:.6}"),
            format!("{blended:.6}"),
            format!("{:.6}", self.jobs_in_system.mean()),
            format!("{:.6}", self.active_servers.mean()),
            format!("{:.6}", self.busy_servers.mean()),
        ])?;

        self.response.reset();
        self.pool_response.reset();
        self.spike_response.reset();
        self.jobs_in_system.reset();
        self.active_servers.reset();
        self.busy_servers.reset();
        self.batch_index += 1;
        self.batch_start = now;
        Ok(())
    }
}

impl RunPolicy for BatchMeans {
    fn on_arrival(&mut self, now: f64, system: &SystemView) -> EngineResult<()> {
        self.jobs_in_system.update(system.jobs_in_system as f64, now)?;
        self.active_servers.update(system.active_servers as f64, now)?;
        self.busy_servers.update(system.busy_servers as f64, now)?;
        Ok(())
    }

    fn on_departure(
        &mut self,
        now: f64,
        response_time: f64,
        tier: Tier,
        system: &SystemView,
    ) -> EngineResult<()> {
        self.jobs_in_system.update(system.jobs_in_system as f64, now)?;
        self.active_servers.update(system.active_servers as f64, now)?;
        self.busy_servers.update(system.busy_servers as f64, now)?;
        self.response.record(response_time);
        match tier {
            Tier::Pool => self.pool_response.record(response_time),
            Tier::Spike => self.spike_response.record(response_time),
        }
        if self.response.count() == self.batch_size {
            self.emit_batch(now)?;
        }
        Ok(())
    }

    fn on_run_end(&mut self, _now: f64) -> EngineResult<()> {
        if self.response.count() > 0 {
            debug!(
                leftover = self.response.count(),
                "partial batch at end of run, not emitted"
            );
        }
        Ok(())
    }

    fn on_finalize(&mut self, _now: f64) -> EngineResult<()> {
        self.sink.close()
    }
}

/// Finite-horizon design: one summary row per independent run.
pub struct Replication {
    sink: Box<dyn ReportSink>,
    confidence: f64,
    replication_index: u32,
    response: Welford,
    jobs_in_system: TimeWeighted,
}

impl Replication {
    pub const COLUMNS: &'static [&'static str] = &[
        "replication",
        "completions",
        "mean_response",
        "stddev_response",
        "variance_response",
        "half_width",
        "mean_jobs_in_system",
    ];

    pub fn new(mut sink: Box<dyn ReportSink>, confidence: f64) -> EngineResult<Self> {
        sink.write_header(Self::COLUMNS)?;
        Ok(Self {
            sink,
            confidence,
            replication_index: 0,
            response: Welford::new(),
            jobs_in_system: fresh_clock()?,
        })
    }
}

impl RunPolicy for Replication {
    fn on_arrival(&mut self, now: f64, system: &SystemView) -> EngineResult<()> {
        self.jobs_in_system.update(system.jobs_in_system as f64, now)?;
        Ok(())
    }

    fn on_departure(
        &mut self,
        now: f64,
        response_time: f64,
        _tier: Tier,
        system: &SystemView,
    ) -> EngineResult<()> {
        self.jobs_in_system.update(system.jobs_in_system as f64, now)?;
        self.response.record(response_time);
        Ok(())
    }

    fn on_run_end(&mut self, now: f64) -> EngineResult<()> {
        let n = self.response.count();
        let hw = if n >= 2 {
            half_width(n, self.response.stddev(), self.confidence)?
        } else {
            0.0
        };
        self.jobs_in_system.close(now)?;

        self.sink.write_row(&[
            self.replication_index.to_string(),
            n.to_string(),
            format!("{:.6}", self.response.mean()),
            format!("{:.6}", self.response.stddev()),
            format!("{:.6}", self.response.variance()),
            format!("{hw:.6}"),
            format!("{:.6}", self.jobs_in_system.mean()),
        ])?;

        self.replication_index += 1;
        self.response.reset();
        // Each replication restarts the simulated clock at zero.
        self.jobs_in_system = fresh_clock()?;
        Ok(())
    }

    fn on_finalize(&mut self, _now: f64) -> EngineResult<()> {
        self.sink.close()
    }
}

/// Warm-up filtered lag-spectrum diagnostic used to justify a batch size.
pub struct AutocorrelationDiagnostic {
    sink: Box<dyn ReportSink>,
    acf: Autocorrelation,
    band_window: usize,
    warmup_time: Option<f64>,
    warmup_jobs: Option<u64>,
    departures_seen: u64,
    collected: u64,
    cutoff: Option<usize>,
}

impl AutocorrelationDiagnostic {
    pub const COLUMNS: &'static [&'static str] = &["lag", "autocorrelation"];

    pub fn new(
        mut sink: Box<dyn ReportSink>,
        max_lag: usize,
        band_window: usize,
        warmup_time: Option<f64>,
        warmup_jobs: Option<u64>,
    ) -> EngineResult<Self> {
        sink.write_header(Self::COLUMNS)?;
        Ok(Self {
            sink,
            acf: Autocorrelation::new(max_lag)?,
            band_window,
            warmup_time,
            warmup_jobs,
            departures_seen: 0,
            collected: 0,
            cutoff: None,
        })
    }

    fn in_warmup(&self, now: f64) -> bool {
        if let Some(t) = self.warmup_time
            && now < t
        {
            return true;
        }
        if let Some(jobs) = self.warmup_jobs
            && self.departures_seen <= jobs
        {
            return true;
        }
        false
    }

    /// Recommended truncation lag, available after finalize.
    pub fn cutoff(&self) -> Option<usize> {
        self.cutoff
    }

    pub fn collected(&self) -> u64 {
        self.collected
    }
}

impl RunPolicy for AutocorrelationDiagnostic {
    fn on_arrival(&mut self, _now: f64, _system: &SystemView) -> EngineResult<()> {
        Ok(())
    }

    fn on_departure(
        &mut self,
        now: f64,
        response_time: f64,
        _tier: Tier,
        _system: &SystemView,
    ) -> EngineResult<()> {
        self.departures_seen += 1;
        if self.in_warmup(now) {
            return Ok(());
        }
        self.acf.record(response_time)?;
        self.collected += 1;
        Ok(())
    }

    fn on_run_end(&mut self, _now: f64) -> EngineResult<()> {
        Ok(())
    }

    fn on_finalize(&mut self, _now: f64) -> EngineResult<()> {
        self.acf.finish()?;
        for lag in 0..=self.acf.max_lag() {
            let value = self.acf.autocorrelation(lag)?;
            self.sink
                .write_row(&[lag.to_string(), format!("{value:.6}")])?;
        }
        self.cutoff = self.acf.cutoff(self.band_window)?;
        match self.cutoff {
            Some(lag) => info!(
                samples = self.collected,
                cutoff = lag,
                "autocorrelation cutoff found; batch size should exceed it"
            ),
            None => info!(
                samples = self.collected,
                max_lag = self.acf.max_lag(),
                "no autocorrelation cutoff within the tracked lags"
            ),
        }
        self.sink.close()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::MemorySink;

    fn view(jobs: usize) -> SystemView {
        SystemView {
            jobs_in_system: jobs,
            active_servers: 1,
            draining_servers: 0,
            busy_servers: usize::from(jobs > 0),
        }
    }

    #[test]
    fn batch_means_emits_one_row_per_full_batch() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let sink = Rc::new(RefCell::new(MemorySink::new()));
        let mut policy = BatchMeans::new(Box::new(sink.clone()), 3, 0.95).unwrap();
        for i in 0..7u64 {
            let now = i as f64 + 1.0;
            policy
                .on_departure(now, 2.0, Tier::Pool, &view(1))
                .unwrap();
        }
        policy.on_run_end(8.0).unwrap();
        policy.on_finalize(8.0).unwrap();

        // 7 departures with batch size 3: two full batches, one leftover.
        let sink = sink.borrow();
        assert_eq!(sink.rows.len(), 2);
        assert!(sink.is_closed());
        assert_eq!(sink.rows[0][0], "0");
        assert_eq!(sink.rows[1][0], "1");
        // Constant response times: batch mean is exactly 2.
        assert_eq!(sink.rows[0][2], "2.000000");
        // All completions on the pool tier, so the blended response
        // equals the plain mean.
        assert_eq!(sink.rows[0][8], "2.000000");
        assert_eq!(sink.rows[0][7], "0.000000");
    }

    #[test]
    fn replication_rows_carry_run_statistics() {
        use std::cell::RefCell;
        use std::rc::Rc;

        let sink = Rc::new(RefCell::new(MemorySink::new()));
        let mut policy = Replication::new(Box::new(sink.clone()), 0.95).unwrap();
        for x in [1.0, 2.0, 3.0, 4.0, 5.0] {
            policy.on_departure(x, x, Tier::Pool, &view(1)).unwrap();
        }
        policy.on_run_end(6.0).unwrap();
        policy.on_finalize(6.0).unwrap();

        let sink = sink.borrow();
        assert_eq!(sink.rows.len(), 1);
        assert_eq!(sink.rows[0][1], "5");
        assert_eq!(sink.rows[0][2], "3.000000"); // mean of 1..=5
        assert_eq!(sink.rows[0][4], "2.500000"); // sample variance
    }

    #[test]
    fn replication_emits_one_row_per_run() {
        let mut policy = Replication::new(Box::new(MemorySink::new()), 0.95).unwrap();
        for rep in 0..3 {
            for i in 0..5u64 {
                let now = i as f64 + 1.0;
                policy
                    .on_departure(now, 2.0, Tier::Pool, &view(1))
                    .unwrap();
            }
            policy.on_run_end(10.0).unwrap();
            assert_eq!(policy.replication_index, rep + 1);
            assert_eq!(policy.response.count(), 0);
        }
    }

    #[test]
    fn autocorrelation_diagnostic_skips_warmup_jobs() {
        let mut policy = AutocorrelationDiagnostic::new(
            Box::new(MemorySink::new()),
            2,
            1,
            None,
            Some(10),
        )
        .unwrap();
        for i in 0..30u64 {
            policy
                .on_departure(i as f64, (i % 5) as f64, Tier::Pool, &view(1))
                .unwrap();
        }
        assert_eq!(policy.collected(), 20);
    }

    #[test]
    fn autocorrelation_diagnostic_finalize_reports_spectrum() {
        let mut policy = AutocorrelationDiagnostic::new(
            Box::new(MemorySink::new()),
            3,
            2,
            None,
            None,
        )
        .unwrap();
        let mut state: u64 = 7;
        for i in 0..2000u64 {
            state = (state * 48271) % 0x7fff_ffff;
            let rt = 0.5 + state as f64 / 0x7fff_ffffu64 as f64;
            policy.on_departure(i as f64, rt, Tier::Pool, &view(1)).unwrap();
        }
        policy.on_finalize(2000.0).unwrap();
        assert_eq!(policy.cutoff(), Some(1));
    }
}
