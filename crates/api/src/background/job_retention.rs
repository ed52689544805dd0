//! Periodic removal of old terminal batch jobs.
//!
//! Runs [`BatchJobManager::cleanup`] on a fixed interval so the in-memory
//! registry does not grow without bound.

use std::sync::Arc;
use std::time::Duration;

use chartgen_pipeline::BatchJobManager;
use tokio_util::sync::CancellationToken;

/// Run the retention loop until `cancel` is triggered.
///
/// Removes jobs that completed more than `retention_hours` ago, checking
/// every `interval`.
pub async fn run(
    manager: Arc<BatchJobManager>,
    retention_hours: i64,
    interval: Duration,
    cancel: CancellationToken,
) {
    tracing::info!(
        retention_hours,
        interval_secs = interval.as_secs(),
        "Batch job retention task started",
    );

    let mut ticker = tokio::time::interval(interval);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                tracing::info!("Batch job retention task stopping");
                break;
            }
            _ = ticker.tick() => {
                let removed = manager.cleanup(retention_hours).await;
                if removed == 0 {
                    tracing::debug!("Batch job retention: nothing to remove");
                }
            }
        }
    }
}
