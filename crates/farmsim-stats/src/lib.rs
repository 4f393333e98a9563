//! farmsim-stats — online estimators consumed by the run policies.
//!
//! Every estimator keeps scalar running state only; no raw sample history
//! is retained except the autocorrelation estimator's fixed circular
//! buffer of the `K+1` most recent values.
//!
//! # Components
//!
//! - **`welford`** — running mean and sample variance (Welford recurrence)
//! - **`time_weighted`** — continuous-time-weighted moments of a step function
//! - **`autocorrelation`** — one-pass streaming autocorrelation up to lag K
//! - **`interval`** — Student-t / Normal confidence-interval half-widths

pub mod autocorrelation;
pub mod error;
pub mod interval;
pub mod time_weighted;
pub mod welford;

pub use autocorrelation::Autocorrelation;
pub use error::{StatsError, StatsResult};
pub use interval::half_width;
pub use time_weighted::TimeWeighted;
pub use welford::Welford;
