//! farmsim-workload — arrival and job-size generation.
//!
//! The simulator consumes a [`WorkloadGenerator`]: "give me the next
//! arrival time and the next job size". Variates are drawn from named,
//! independently seeded RNG streams so a run is reproducible per stream
//! regardless of which generator is plugged in.

pub mod error;
pub mod generator;
pub mod streams;

pub use error::{WorkloadError, WorkloadResult};
pub use generator::{
    ExponentialWorkload, HyperExponentialWorkload, TraceWorkload, WorkloadGenerator,
    build_workload,
};
pub use streams::{Stream, Streams};
