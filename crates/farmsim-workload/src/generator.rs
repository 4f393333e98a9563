//! Interchangeable workload strategies.
//!
//! A generator answers two questions: when does the next job arrive, and
//! how much work does it carry. Trace playback returns `+inf` once the
//! trace is exhausted, which the engine treats as "no further arrivals".

use std::path::Path;

use farmsim_core::config::WorkloadSection;
use farmsim_core::{ConfigError, WorkloadKind};
use tracing::debug;

use crate::error::{WorkloadError, WorkloadResult};
use crate::streams::{Stream, Streams};

pub trait WorkloadGenerator {
    /// Absolute time of the next arrival given the current clock.
    fn next_arrival(&mut self, now: f64) -> WorkloadResult<f64>;

    /// Work units carried by the job that just arrived.
    fn next_job_size(&mut self) -> WorkloadResult<f64>;
}

/// Poisson arrivals, exponential job sizes.
pub struct ExponentialWorkload {
    streams: Streams,
    arrival_mean: f64,
    service_mean: f64,
}

impl ExponentialWorkload {
    pub fn new(streams: Streams, arrival_mean: f64, service_mean: f64) -> WorkloadResult<Self> {
        if arrival_mean <= 0.0 || service_mean <= 0.0 {
            return Err(WorkloadError::InvalidArgument(
                "means must be positive".into(),
            ));
        }
        Ok(Self {
            streams,
            arrival_mean,
            service_mean,
        })
    }
}

impl WorkloadGenerator for ExponentialWorkload {
    fn next_arrival(&mut self, now: f64) -> WorkloadResult<f64> {
        Ok(now + self.streams.exponential(Stream::ArrivalFast, self.arrival_mean)?)
    }

    fn next_job_size(&mut self) -> WorkloadResult<f64> {
        self.streams.exponential(Stream::ServiceFast, self.service_mean)
    }
}

/// Two-phase hyperexponential interarrivals and job sizes. Produces a
/// burstier process than the pure exponential at the same means.
pub struct HyperExponentialWorkload {
    streams: Streams,
    p: f64,
    arrival_mean_fast: f64,
    arrival_mean_slow: f64,
    service_mean_fast: f64,
    service_mean_slow: f64,
}

impl HyperExponentialWorkload {
    pub fn new(
        streams: Streams,
        p: f64,
        arrival_mean_fast: f64,
        arrival_mean_slow: f64,
        service_mean_fast: f64,
        service_mean_slow: f64,
    ) -> WorkloadResult<Self> {
        if !(0.0..=1.0).contains(&p) {
            return Err(WorkloadError::InvalidArgument(format!(
                "phase probability must be in [0, 1], got {p}"
            )));
        }
        if arrival_mean_fast <= 0.0
            || arrival_mean_slow <= 0.0
            || service_mean_fast <= 0.0
            || service_mean_slow <= 0.0
        {
            return Err(WorkloadError::InvalidArgument(
                "means must be positive".into(),
            ));
        }
        Ok(Self {
            streams,
            p,
            arrival_mean_fast,
            arrival_mean_slow,
            service_mean_fast,
            service_mean_slow,
        })
    }
}

impl WorkloadGenerator for HyperExponentialWorkload {
    fn next_arrival(&mut self, now: f64) -> WorkloadResult<f64> {
        let dt = self.streams.hyper_exponential(
            self.p,
            self.arrival_mean_fast,
            self.arrival_mean_slow,
            Stream::ArrivalPhase,
            Stream::ArrivalFast,
            Stream::ArrivalSlow,
        )?;
        Ok(now + dt)
    }

    fn next_job_size(&mut self) -> WorkloadResult<f64> {
        self.streams.hyper_exponential(
            self.p,
            self.service_mean_fast,
            self.service_mean_slow,
            Stream::ServicePhase,
            Stream::ServiceFast,
            Stream::ServiceSlow,
        )
    }
}

/// Plays back a recorded trace of `(interarrival, size)` pairs.
pub struct TraceWorkload {
    interarrivals: std::collections::VecDeque<f64>,
    sizes: std::collections::VecDeque<f64>,
}

impl TraceWorkload {
    pub fn new(pairs: Vec<(f64, f64)>) -> Self {
        let (interarrivals, sizes) = pairs.into_iter().unzip();
        Self {
            interarrivals,
            sizes,
        }
    }

    /// Load a trace file of `interarrival,size` lines. Blank lines and
    /// `#` comments are skipped.
    pub fn from_file(path: &Path) -> WorkloadResult<Self> {
        let content = std::fs::read_to_string(path)?;
        let mut pairs = Vec::new();
        for (i, line) in content.lines().enumerate() {
            let line = line.trim();
            if line.is_empty() || line.starts_with('#') {
                continue;
            }
            let mut fields = line.split(',');
            let parsed = (|| {
                let dt: f64 = fields.next()?.trim().parse().ok()?;
                let size: f64 = fields.next()?.trim().parse().ok()?;
                Some((dt, size))
            })();
            match parsed {
                Some((dt, size)) if dt >= 0.0 && size > 0.0 => pairs.push((dt, size)),
                _ => {
                    return Err(WorkloadError::MalformedTrace {
                        line: i + 1,
                        content: line.to_string(),
                    });
                }
            }
        }
        debug!(jobs = pairs.len(), "loaded workload trace");
        Ok(Self::new(pairs))
    }
}

impl WorkloadGenerator for TraceWorkload {
    fn next_arrival(&mut self, now: f64) -> WorkloadResult<f64> {
        match self.interarrivals.pop_front() {
            Some(dt) => Ok(now + dt),
            None => Ok(f64::INFINITY),
        }
    }

    fn next_job_size(&mut self) -> WorkloadResult<f64> {
        self.sizes.pop_front().ok_or_else(|| {
            WorkloadError::InvalidArgument("trace exhausted before job size draw".into())
        })
    }
}

/// Build the generator selected by the config section.
pub fn build_workload(
    section: &WorkloadSection,
    seed: u64,
) -> WorkloadResult<Box<dyn WorkloadGenerator>> {
    let kind = match section.kind.as_str() {
        "hyperexponential" => WorkloadKind::HyperExponential,
        "exponential" => WorkloadKind::Exponential,
        "trace" => WorkloadKind::Trace,
        other => return Err(ConfigError::UnknownWorkload(other.to_string()).into()),
    };
    match kind {
        WorkloadKind::Exponential => Ok(Box::new(ExponentialWorkload::new(
            Streams::new(seed),
            section.arrival_mean,
            section.service_mean,
        )?)),
        WorkloadKind::HyperExponential => {
            let p = section.p.ok_or_else(|| {
                WorkloadError::InvalidArgument("hyperexponential workload needs `p`".into())
            })?;
            Ok(Box::new(HyperExponentialWorkload::new(
                Streams::new(seed),
                p,
                section.arrival_mean,
                section.arrival_mean_slow.unwrap_or(section.arrival_mean),
                section.service_mean,
                section.service_mean_slow.unwrap_or(section.service_mean),
            )?))
        }
        WorkloadKind::Trace => {
            let path = section.trace_path.as_ref().ok_or_else(|| {
                WorkloadError::InvalidArgument("trace workload needs `trace_path`".into())
            })?;
            Ok(Box::new(TraceWorkload::from_file(Path::new(path))?))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn trace_returns_infinity_at_end() {
        let mut trace = TraceWorkload::new(vec![(1.0, 2.0), (0.5, 1.0)]);
        assert_eq!(trace.next_arrival(0.0).unwrap(), 1.0);
        assert_eq!(trace.next_job_size().unwrap(), 2.0);
        assert_eq!(trace.next_arrival(1.0).unwrap(), 1.5);
        assert_eq!(trace.next_job_size().unwrap(), 1.0);
        assert_eq!(trace.next_arrival(1.5).unwrap(), f64::INFINITY);
    }

    #[test]
    fn exponential_arrivals_advance_the_clock() {
        let mut wl = ExponentialWorkload::new(Streams::new(3), 2.0, 1.0).unwrap();
        let t1 = wl.next_arrival(10.0).unwrap();
        assert!(t1 > 10.0);
        let t2 = wl.next_arrival(t1).unwrap();
        assert!(t2 > t1);
    }

    #[test]
    fn hyperexponential_sizes_are_positive() {
        let mut wl = HyperExponentialWorkload::new(Streams::new(8), 0.3, 0.2, 2.0, 0.5, 4.0)
            .unwrap();
        for _ in 0..1000 {
            assert!(wl.next_job_size().unwrap() > 0.0);
        }
    }

    #[test]
    fn invalid_phase_probability_is_rejected() {
        let err = HyperExponentialWorkload::new(Streams::new(8), 1.5, 1.0, 1.0, 1.0, 1.0);
        assert!(matches!(err, Err(WorkloadError::InvalidArgument(_))));
    }

    #[test]
    fn same_seed_gives_identical_workloads() {
        let mut a = HyperExponentialWorkload::new(Streams::new(11), 0.4, 0.3, 3.0, 1.0, 5.0)
            .unwrap();
        let mut b = HyperExponentialWorkload::new(Streams::new(11), 0.4, 0.3, 3.0, 1.0, 5.0)
            .unwrap();
        for _ in 0..100 {
            assert_eq!(a.next_arrival(0.0).unwrap(), b.next_arrival(0.0).unwrap());
            assert_eq!(a.next_job_size().unwrap(), b.next_job_size().unwrap());
        }
    }
}
