//! farmsim-cluster — the simulated server farm.
//!
//! Processor-sharing servers grouped in an elastic pool, plus the
//! pluggable decision logic: scheduling policy (which server gets a new
//! job), spike router (keep or divert to the overflow server), and the
//! horizontal scaler (sliding-window control loop with hysteresis and
//! cooldown). The [`LoadBalancer`] composes all of it into one
//! job-admission / job-completion contract for the engine.

pub mod balancer;
pub mod error;
pub mod job;
pub mod pool;
pub mod scaler;
pub mod scheduling;
pub mod server;
pub mod spike;

pub use balancer::{CompletedJob, LoadBalancer, SPIKE_SERVER_ID, Tier};
pub use error::{ClusterError, ClusterResult};
pub use job::Job;
pub use pool::{LeastLoadedRemoval, RemovalPolicy, ServerPool};
pub use scaler::{HorizontalScaler, ScaleAction};
pub use scheduling::{LeastLoad, RoundRobin, SchedulingPolicy, build_scheduling};
pub use server::Server;
pub use spike::{Disabled, Route, SimpleThreshold, SpikeRouter};
