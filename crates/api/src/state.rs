use std::sync::Arc;

use chartgen_events::EventBus;
use chartgen_pipeline::BatchJobManager;

use crate::config::ServerConfig;

/// Shared application state available to all Axum handlers via `State<AppState>`.
///
/// Cheaply cloneable; everything inside is behind `Arc`.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<ServerConfig>,
    /// Batch job registry and engine.
    pub manager: Arc<BatchJobManager>,
    /// Lifecycle events, forwarded to WebSocket clients.
    pub event_bus: Arc<EventBus>,
}
