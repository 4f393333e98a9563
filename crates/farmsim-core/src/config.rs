//! farmsim.toml configuration parser.
//!
//! The config file selects the cluster shape, the scaling control loop,
//! the workload generator, and the run policy. Policy names are matched
//! as strings; an unknown name is fatal at load time, never coerced.

use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

/// Errors raised while loading or validating a configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("unknown scheduling policy: {0}")]
    UnknownScheduling(String),

    #[error("unknown workload kind: {0}")]
    UnknownWorkload(String),

    #[error("unknown run policy: {0}")]
    UnknownRunPolicy(String),

    #[error("invalid value for {field}: {reason}")]
    Invalid { field: &'static str, reason: String },
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimConfig {
    pub simulation: SimulationSection,
    pub cluster: ClusterSection,
    pub scaling: ScalingSection,
    pub workload: WorkloadSection,
    pub run: RunSection,
    pub output: Option<OutputSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulationSection {
    /// Simulated duration after which arrivals stop and the system drains.
    pub duration: f64,
    /// Seed planted across all RNG streams.
    pub seed: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClusterSection {
    /// Servers in the pool at time zero.
    pub initial_servers: u32,
    /// Scheduling policy name: "least-load" or "round-robin".
    pub scheduling: String,
    pub spike: Option<SpikeSection>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SpikeSection {
    /// Concurrency at or above which the candidate overflows to the
    /// spike server.
    pub threshold: u32,
    /// Relative capacity of the spike server.
    pub cpu_multiplier: f64,
    /// Fraction of that capacity actually granted.
    pub cpu_percentage: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScalingSection {
    /// Response-time samples kept in the sliding window.
    pub window: usize,
    /// Window mean below this triggers scale-in.
    pub r0_min: f64,
    /// Window mean above this triggers scale-out.
    pub r0_max: f64,
    /// Minimum simulated time between two scaling actions.
    pub cooldown: f64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkloadSection {
    /// "hyperexponential", "exponential", or "trace".
    pub kind: String,
    /// Phase-selection probability for hyperexponential variants.
    pub p: Option<f64>,
    /// Mean interarrival time (branch 1 for hyperexponential).
    pub arrival_mean: f64,
    /// Branch-2 mean interarrival time (hyperexponential only).
    pub arrival_mean_slow: Option<f64>,
    /// Mean job size (branch 1 for hyperexponential).
    pub service_mean: f64,
    /// Branch-2 mean job size (hyperexponential only).
    pub service_mean_slow: Option<f64>,
    /// Path to a trace file of `interarrival,size` lines (trace only).
    pub trace_path: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RunSection {
    /// "batch-means", "replication", or "autocorrelation".
    pub policy: String,
    /// Departures accumulated per batch (batch-means).
    pub batch_size: Option<u64>,
    /// Independent replications to run (replication).
    pub replications: Option<u32>,
    /// Maximum autocorrelation lag (autocorrelation).
    pub max_lag: Option<usize>,
    /// Consecutive in-band lags required by the cutoff heuristic.
    pub band_window: Option<usize>,
    /// Warm-up elapsed time discarded before collecting (autocorrelation).
    pub warmup_time: Option<f64>,
    /// Warm-up departures discarded before collecting (autocorrelation).
    pub warmup_jobs: Option<u64>,
    /// Confidence level for interval half-widths.
    pub confidence: Option<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputSection {
    /// CSV file the run policy writes its rows to.
    pub path: String,
}

/// Parsed scheduling policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulingKind {
    LeastLoad,
    RoundRobin,
}

/// Parsed workload selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorkloadKind {
    HyperExponential,
    Exponential,
    Trace,
}

/// Parsed run-policy selector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunKind {
    BatchMeans,
    Replication,
    Autocorrelation,
}

impl SimConfig {
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path)?;
        let config: SimConfig = toml::from_str(&content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_toml_str(s: &str) -> Result<Self, ConfigError> {
        let config: SimConfig = toml::from_str(s)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate cross-field constraints. Called on every load.
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.scheduling_kind()?;
        self.workload_kind()?;
        self.run_kind()?;

        if self.simulation.duration <= 0.0 {
            return Err(ConfigError::Invalid {
                field: "simulation.duration",
                reason: "must be positive".into(),
            });
        }
        if self.cluster.initial_servers == 0 {
            return Err(ConfigError::Invalid {
                field: "cluster.initial_servers",
                reason: "pool floor is one server".into(),
            });
        }
        if self.scaling.r0_min >= self.scaling.r0_max {
            return Err(ConfigError::Invalid {
                field: "scaling.r0_min",
                reason: format!(
                    "hysteresis requires r0_min < r0_max (got {} >= {})",
                    self.scaling.r0_min, self.scaling.r0_max
                ),
            });
        }
        if self.scaling.window == 0 {
            return Err(ConfigError::Invalid {
                field: "scaling.window",
                reason: "window must hold at least one sample".into(),
            });
        }
        if self.scaling.cooldown < 0.0 {
            return Err(ConfigError::Invalid {
                field: "scaling.cooldown",
                reason: "must be non-negative".into(),
            });
        }
        if let Some(confidence) = self.run.confidence
            && !(confidence > 0.0 && confidence < 1.0)
        {
            return Err(ConfigError::Invalid {
                field: "run.confidence",
                reason: format!("must be strictly inside (0, 1), got {confidence}"),
            });
        }
        if let Some(spike) = &self.cluster.spike {
            if spike.cpu_multiplier <= 0.0 || spike.cpu_percentage <= 0.0 {
                return Err(ConfigError::Invalid {
                    field: "cluster.spike",
                    reason: "cpu_multiplier and cpu_percentage must be positive".into(),
                });
            }
        }
        Ok(())
    }

    pub fn scheduling_kind(&self) -> Result<SchedulingKind, ConfigError> {
        match self.cluster.scheduling.as_str() {
            "least-load" => Ok(SchedulingKind::LeastLoad),
            "round-robin" => Ok(SchedulingKind::RoundRobin),
            other => Err(ConfigError::UnknownScheduling(other.to_string())),
        }
    }

    pub fn workload_kind(&self) -> Result<WorkloadKind, ConfigError> {
        match self.workload.kind.as_str() {
            "hyperexponential" => Ok(WorkloadKind::HyperExponential),
            "exponential" => Ok(WorkloadKind::Exponential),
            "trace" => Ok(WorkloadKind::Trace),
            other => Err(ConfigError::UnknownWorkload(other.to_string())),
        }
    }

    pub fn run_kind(&self) -> Result<RunKind, ConfigError> {
        match self.run.policy.as_str() {
            "batch-means" => Ok(RunKind::BatchMeans),
            "replication" => Ok(RunKind::Replication),
            "autocorrelation" => Ok(RunKind::Autocorrelation),
            other => Err(ConfigError::UnknownRunPolicy(other.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal_toml() -> String {
        r#"
[simulation]
duration = 1000.0
seed = 42

[cluster]
initial_servers = 2
scheduling = "least-load"

[scaling]
window = 16
r0_min = 0.5
r0_max = 2.0
cooldown = 30.0

[workload]
kind = "exponential"
arrival_mean = 0.5
service_mean = 1.0

[run]
policy = "batch-means"
batch_size = 256
"#
        .to_string()
    }

    #[test]
    fn parses_minimal_config() {
        let config = SimConfig::from_toml_str(&minimal_toml()).unwrap();
        assert_eq!(config.cluster.initial_servers, 2);
        assert_eq!(config.scheduling_kind().unwrap(), SchedulingKind::LeastLoad);
        assert_eq!(config.run_kind().unwrap(), RunKind::BatchMeans);
    }

    #[test]
    fn unknown_scheduling_policy_is_fatal() {
        let toml_str = minimal_toml().replace("least-load", "most-load");
        let err = SimConfig::from_toml_str(&toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownScheduling(name) if name == "most-load"));
    }

    #[test]
    fn unknown_run_policy_is_fatal() {
        let toml_str = minimal_toml().replace("batch-means", "warp-means");
        let err = SimConfig::from_toml_str(&toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::UnknownRunPolicy(_)));
    }

    #[test]
    fn hysteresis_must_be_strict() {
        let toml_str = minimal_toml().replace("r0_min = 0.5", "r0_min = 2.0");
        let err = SimConfig::from_toml_str(&toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field, .. } if field == "scaling.r0_min"));
    }

    #[test]
    fn confidence_outside_unit_interval_is_fatal() {
        let toml_str = minimal_toml() + "confidence = 1.0\n";
        let err = SimConfig::from_toml_str(&toml_str).unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { field, .. } if field == "run.confidence"));
    }
}
