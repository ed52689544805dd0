//! Batch job event bus.
//!
//! - [`EventBus`]: in-process publish/subscribe hub backed by
//!   `tokio::sync::broadcast`.
//! - [`BatchEvent`]: the envelope carried for every job lifecycle change.

pub mod bus;

pub use bus::{BatchEvent, EventBus};
