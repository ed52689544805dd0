//! WebSocket stream of batch job lifecycle events.
//!
//! Every connection gets its own [`EventBus`](chartgen_events::EventBus)
//! subscription. Events are sent as JSON text frames, optionally narrowed
//! to one job or one workspace with query parameters.

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::{Query, State};
use axum::response::IntoResponse;
use chartgen_core::types::{DbId, JobId};
use chartgen_events::BatchEvent;
use futures::{SinkExt, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast::{self, error::RecvError};

use crate::state::AppState;

/// Optional narrowing of the event stream.
#[derive(Debug, Default, Clone, Copy, Deserialize)]
pub struct EventFilter {
    pub job_id: Option<JobId>,
    pub workspace_id: Option<DbId>,
}

impl EventFilter {
    pub fn matches(&self, event: &BatchEvent) -> bool {
        self.job_id.map_or(true, |id| event.job_id == id)
            && self.workspace_id.map_or(true, |ws| event.workspace_id == ws)
    }
}

/// GET /api/v1/ws -- upgrade to a WebSocket event stream.
pub async fn ws_handler(
    ws: WebSocketUpgrade,
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> impl IntoResponse {
    let events = state.event_bus.subscribe();
    ws.on_upgrade(move |socket| handle_socket(socket, events, filter))
}

/// Forward bus events to the socket until either side goes away.
async fn handle_socket(
    socket: WebSocket,
    mut events: broadcast::Receiver<BatchEvent>,
    filter: EventFilter,
) {
    let conn_id = uuid::Uuid::new_v4();
    tracing::info!(%conn_id, ?filter, "WebSocket connected");

    let (mut sink, mut stream) = socket.split();

    let send_task = tokio::spawn(async move {
        loop {
            let event = match events.recv().await {
                Ok(event) => event,
                Err(RecvError::Lagged(skipped)) => {
                    tracing::warn!(%conn_id, skipped, "WebSocket client lagging, events dropped");
                    continue;
                }
                Err(RecvError::Closed) => break,
            };
            if !filter.matches(&event) {
                continue;
            }

            let text = match serde_json::to_string(&event) {
                Ok(text) => text,
                Err(e) => {
                    tracing::error!(%conn_id, error = %e, "Failed to serialize event");
                    continue;
                }
            };
            if sink.send(Message::Text(text.into())).await.is_err() {
                tracing::debug!(%conn_id, "WebSocket sink closed");
                break;
            }
        }
    });

    // Inbound frames are ignored apart from close.
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                tracing::debug!(%conn_id, error = %e, "WebSocket receive error");
                break;
            }
        }
    }

    send_task.abort();
    tracing::info!(%conn_id, "WebSocket disconnected");
}

#[cfg(test)]
mod tests {
    use chartgen_core::batch::{BatchJob, NewGenerationItem};
    use chartgen_core::job_events::EVENT_JOB_CREATED;

    use super::*;

    fn event(workspace_id: DbId) -> BatchEvent {
        let job = BatchJob::create(
            workspace_id,
            1,
            vec![NewGenerationItem::new("p")],
            chrono::Utc::now(),
        )
        .unwrap();
        BatchEvent::for_job(EVENT_JOB_CREATED, &job)
    }

    #[test]
    fn empty_filter_passes_everything() {
        assert!(EventFilter::default().matches(&event(1)));
    }

    #[test]
    fn filters_by_workspace_and_job() {
        let e = event(3);
        let by_ws = EventFilter {
            workspace_id: Some(3),
            ..Default::default()
        };
        let other_ws = EventFilter {
            workspace_id: Some(4),
            ..Default::default()
        };
        let other_job = EventFilter {
            job_id: Some(JobId::new_v4()),
            ..Default::default()
        };
        assert!(by_ws.matches(&e));
        assert!(!other_ws.matches(&e));
        assert!(!other_job.matches(&e));
    }
}
