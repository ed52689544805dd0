//! Route definitions for the `/batch-jobs` resource.

use std::time::Duration;

use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::Router;
use tower_http::timeout::TimeoutLayer;

use crate::config::ServerConfig;
use crate::handlers::batch;
use crate::state::AppState;

/// Routes mounted at `/batch-jobs`.
///
/// ```text
/// GET    /                  -> list_jobs
/// POST   /                  -> create_job
/// POST   /cleanup           -> cleanup_jobs
/// GET    /{id}              -> get_job
/// POST   /{id}/process      -> process_job       (process wait timeout)
/// GET    /{id}/results      -> get_results
/// POST   /{id}/cancel       -> cancel_job
/// POST   /{id}/dashboard    -> create_dashboard
/// ```
///
/// Everything except `process` runs under the regular request timeout.
/// `process` may block until the job is terminal, so it gets its own.
pub fn router(config: &ServerConfig) -> Router<AppState> {
    let process = Router::new()
        .route("/{id}/process", post(batch::process_job))
        .layer(timeout(config.process_wait_timeout_secs));

    Router::new()
        .route("/", get(batch::list_jobs).post(batch::create_job))
        .route("/cleanup", post(batch::cleanup_jobs))
        .route("/{id}", get(batch::get_job))
        .route("/{id}/results", get(batch::get_results))
        .route("/{id}/cancel", post(batch::cancel_job))
        .route("/{id}/dashboard", post(batch::create_dashboard))
        .layer(timeout(config.request_timeout_secs))
        .merge(process)
}

fn timeout(secs: u64) -> TimeoutLayer {
    TimeoutLayer::with_status_code(StatusCode::REQUEST_TIMEOUT, Duration::from_secs(secs))
}
