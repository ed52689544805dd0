//! In-process event bus backed by a `tokio::sync::broadcast` channel.
//!
//! [`EventBus`] is the publish/subscribe hub for [`BatchEvent`]s. It is
//! shared via `Arc<EventBus>` between the batch manager and the API.

use chartgen_core::batch::{BatchJob, BatchStatus};
use chartgen_core::types::{DbId, JobId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

// ---------------------------------------------------------------------------
// BatchEvent
// ---------------------------------------------------------------------------

/// A lifecycle change of one batch job.
///
/// Built with [`BatchEvent::for_job`], which snapshots the job's counters,
/// and optionally enriched with [`with_payload`](BatchEvent::with_payload).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchEvent {
    /// One of the `EVENT_JOB_*` constants in `chartgen_core::job_events`.
    pub event_type: String,
    pub job_id: JobId,
    pub workspace_id: DbId,
    pub user_id: DbId,
    pub status: BatchStatus,
    pub progress: f64,
    pub completed_requests: usize,
    pub failed_requests: usize,
    pub total_requests: usize,

    /// Free-form JSON payload carrying event-specific data.
    pub payload: serde_json::Value,

    pub timestamp: DateTime<Utc>,
}

impl BatchEvent {
    pub fn for_job(event_type: impl Into<String>, job: &BatchJob) -> Self {
        Self {
            event_type: event_type.into(),
            job_id: job.job_id,
            workspace_id: job.workspace_id,
            user_id: job.user_id,
            status: job.status,
            progress: job.progress,
            completed_requests: job.completed_requests,
            failed_requests: job.failed_requests,
            total_requests: job.total_requests,
            payload: serde_json::Value::Object(Default::default()),
            timestamp: Utc::now(),
        }
    }

    /// Set the JSON payload for the event.
    pub fn with_payload(mut self, payload: serde_json::Value) -> Self {
        self.payload = payload;
        self
    }
}

// ---------------------------------------------------------------------------
// EventBus
// ---------------------------------------------------------------------------

/// Default buffer capacity for the broadcast channel.
const DEFAULT_CAPACITY: usize = 1024;

/// In-process fan-out event bus.
///
/// ```rust
/// use chartgen_events::EventBus;
///
/// let bus = EventBus::default();
/// let rx = bus.subscribe();
/// assert_eq!(bus.subscriber_count(), 1);
/// # drop(rx);
/// ```
pub struct EventBus {
    sender: broadcast::Sender<BatchEvent>,
}

impl EventBus {
    /// Create a bus with a specific channel capacity.
    ///
    /// When the buffer is full, the oldest un-consumed messages are dropped
    /// and slow receivers will observe a `RecvError::Lagged`.
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Publish an event to all current subscribers.
    ///
    /// If there are no active subscribers the event is silently dropped.
    pub fn publish(&self, event: BatchEvent) {
        // A SendError only means there are zero receivers.
        let _ = self.sender.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<BatchEvent> {
        self.sender.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use chartgen_core::batch::NewGenerationItem;
    use chartgen_core::job_events::{EVENT_JOB_CREATED, EVENT_JOB_STARTED};

    use super::*;

    fn job() -> BatchJob {
        BatchJob::create(3, 4, vec![NewGenerationItem::new("p")], Utc::now()).unwrap()
    }

    #[tokio::test]
    async fn publish_and_receive_single_subscriber() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        let job = job();

        bus.publish(
            BatchEvent::for_job(EVENT_JOB_CREATED, &job)
                .with_payload(serde_json::json!({ "key": "value" })),
        );

        let received = rx.recv().await.expect("should receive the event");
        assert_eq!(received.event_type, EVENT_JOB_CREATED);
        assert_eq!(received.job_id, job.job_id);
        assert_eq!(received.workspace_id, 3);
        assert_eq!(received.user_id, 4);
        assert_eq!(received.status, BatchStatus::Pending);
        assert_eq!(received.payload["key"], "value");
    }

    #[tokio::test]
    async fn multiple_subscribers_receive_same_event() {
        let bus = EventBus::default();
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();

        bus.publish(BatchEvent::for_job(EVENT_JOB_STARTED, &job()));

        let e1 = rx1.recv().await.expect("subscriber 1 should receive");
        let e2 = rx2.recv().await.expect("subscriber 2 should receive");
        assert_eq!(e1.event_type, EVENT_JOB_STARTED);
        assert_eq!(e2.event_type, EVENT_JOB_STARTED);
    }

    #[test]
    fn publish_with_no_subscribers_does_not_panic() {
        let bus = EventBus::default();
        bus.publish(BatchEvent::for_job(EVENT_JOB_CREATED, &job()));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn default_event_has_empty_payload() {
        let event = BatchEvent::for_job(EVENT_JOB_CREATED, &job());
        assert!(event.payload.is_object());
        assert_eq!(event.total_requests, 1);
        assert_eq!(event.progress, 0.0);
    }
}
