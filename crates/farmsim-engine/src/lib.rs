//! farmsim-engine — the discrete-event simulation core.
//!
//! The [`Simulator`] pulls the next event from the [`FutureEventSet`],
//! advances simulated time, applies processor sharing to every server for
//! the elapsed interval, mutates job state, and feeds the active
//! [`RunPolicy`]. The [`Experiment`] wires configuration, workload,
//! cluster, policy, and output sink into one or more runs.
//!
//! # Components
//!
//! - **`events`** — pending arrival + in-flight departure estimates
//! - **`simulator`** — the next-event loop (running → draining → terminated)
//! - **`policy`** — batch means, replications, autocorrelation diagnostic
//! - **`report`** — append-only tabular sinks (CSV file, in-memory)
//! - **`experiment`** — end-to-end orchestration from a `SimConfig`

pub mod error;
pub mod events;
pub mod experiment;
pub mod policy;
pub mod report;
pub mod simulator;

pub use error::{EngineError, EngineResult};
pub use events::{Event, FutureEventSet, JobRecord};
pub use experiment::{Experiment, RunSummary};
pub use policy::{AutocorrelationDiagnostic, BatchMeans, Replication, RunPolicy, SystemView};
pub use report::{CsvSink, MemorySink, ReportSink};
pub use simulator::{Phase, Simulator};
