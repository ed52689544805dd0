pub mod batch;
pub mod health;

use axum::routing::get;
use axum::Router;

use crate::config::ServerConfig;
use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the `/api/v1` route tree.
///
/// Route hierarchy:
///
/// ```text
/// /ws                                   WebSocket event stream
///
/// /batch-jobs                           list, create
/// /batch-jobs/cleanup                   remove old terminal jobs (POST)
/// /batch-jobs/{id}                      status
/// /batch-jobs/{id}/process              start processing (POST)
/// /batch-jobs/{id}/results              results of a completed job
/// /batch-jobs/{id}/cancel               cancel (POST)
/// /batch-jobs/{id}/dashboard            derive dashboard (POST)
///
/// /batch-templates                      predefined request bundles
/// ```
///
/// Request timeouts are applied per route group in [`batch::router`]. The
/// WebSocket upgrade has none.
pub fn api_routes(config: &ServerConfig) -> Router<AppState> {
    Router::new()
        .route("/ws", get(ws::ws_handler))
        .nest("/batch-jobs", batch::router(config))
        .route("/batch-templates", get(handlers::batch::list_templates))
}
