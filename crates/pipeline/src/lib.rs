//! Batch chart generation engine.
//!
//! [`BatchJobManager`] owns the job registry and drives each job through
//! its lifecycle. Admission is bounded at two levels by [`ConcurrencyGate`]:
//! one process-wide gate for jobs and one gate per job for its items.

pub mod config;
pub mod gate;
pub mod manager;

pub use config::BatchConfig;
pub use gate::{ConcurrencyGate, GateClosed, GatePermit};
pub use manager::BatchJobManager;
