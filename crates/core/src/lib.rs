//! Domain types for batch chart generation.
//!
//! Dependency-free of runtime concerns: everything here is plain data,
//! validation, and pure computation shared by the providers, the batch
//! engine, and the API.

pub mod batch;
pub mod chart;
pub mod dashboard;
pub mod error;
pub mod job_events;
pub mod templates;
pub mod types;
