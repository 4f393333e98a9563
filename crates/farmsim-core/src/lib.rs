//! farmsim-core — shared types and configuration for the farmsim workspace.
//!
//! Holds the `farmsim.toml` configuration model, the identifier newtypes
//! used across crates, and the numerical tolerance constants the engine
//! relies on when validating job accounting.

pub mod config;
pub mod types;

pub use config::{ConfigError, RunKind, SchedulingKind, SimConfig, WorkloadKind};
pub use types::{DRIFT_ABORT_FACTOR, EPSILON, JobId, ServerId};
