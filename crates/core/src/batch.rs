//! Batch job data model and lifecycle state machine.
//!
//! A [`BatchJob`] groups independent chart generation requests submitted
//! together. Its status moves through
//! `pending -> processing -> {completed, failed}`, and either non-terminal
//! state may move to `cancelled`. Nothing leaves a terminal state.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::chart::GenerationArtifact;
use crate::error::CoreError;
use crate::types::{DbId, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Priority assigned to requests that do not specify one.
pub const DEFAULT_PRIORITY: i32 = 1;

/// Maximum number of requests accepted in a single batch.
pub const MAX_BATCH_SIZE: usize = 200;

/// Request id used for the synthetic result recorded when a job fails as a whole.
pub const BATCH_ERROR_REQUEST_ID: &str = "batch_error";

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Lifecycle status of a batch job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    Pending,
    Processing,
    Completed,
    Failed,
    Cancelled,
}

impl BatchStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Processing => "processing",
            Self::Completed => "completed",
            Self::Failed => "failed",
            Self::Cancelled => "cancelled",
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed | Self::Cancelled)
    }

    /// Whether the state machine permits moving from `self` to `next`.
    pub fn can_transition_to(self, next: BatchStatus) -> bool {
        matches!(
            (self, next),
            (Self::Pending, Self::Processing)
                | (Self::Processing, Self::Completed)
                | (Self::Processing, Self::Failed)
                | (Self::Pending, Self::Cancelled)
                | (Self::Processing, Self::Cancelled)
        )
    }
}

impl std::fmt::Display for BatchStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

fn default_priority() -> i32 {
    DEFAULT_PRIORITY
}

/// A generation request as submitted by a caller, before it joins a job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Validate)]
pub struct NewGenerationItem {
    #[validate(length(min = 1, max = 4000, message = "prompt must be 1-4000 characters"))]
    pub prompt: String,
    #[serde(default)]
    pub data_source_id: Option<String>,
    #[serde(default)]
    pub chart_type_hint: Option<String>,
    #[serde(default = "default_priority")]
    pub priority: i32,
}

impl NewGenerationItem {
    pub fn new(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            data_source_id: None,
            chart_type_hint: None,
            priority: DEFAULT_PRIORITY,
        }
    }

    pub fn with_priority(mut self, priority: i32) -> Self {
        self.priority = priority;
        self
    }

    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.chart_type_hint = Some(hint.into());
        self
    }

    pub fn with_data_source(mut self, data_source_id: impl Into<String>) -> Self {
        self.data_source_id = Some(data_source_id.into());
        self
    }
}

/// Validate a submitted request list.
///
/// Rules:
/// - At least one request, at most [`MAX_BATCH_SIZE`].
/// - Every request carries a prompt that is not blank.
pub fn validate_items(items: &[NewGenerationItem]) -> Result<(), CoreError> {
    if items.is_empty() {
        return Err(CoreError::Validation(
            "A batch job must contain at least one request".to_string(),
        ));
    }
    if items.len() > MAX_BATCH_SIZE {
        return Err(CoreError::Validation(format!(
            "A batch job may contain at most {MAX_BATCH_SIZE} requests"
        )));
    }
    for (i, item) in items.iter().enumerate() {
        item.validate()
            .map_err(|e| CoreError::Validation(format!("Request at index {i}: {e}")))?;
        if item.prompt.trim().is_empty() {
            return Err(CoreError::Validation(format!(
                "Request at index {i}: prompt must not be blank"
            )));
        }
    }
    Ok(())
}

/// A request owned by a job. Immutable once created.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationItemRequest {
    /// `"{job_id}_{index}"` where `index` is the submission position.
    pub id: String,
    pub prompt: String,
    pub data_source_id: Option<String>,
    pub chart_type_hint: Option<String>,
    pub priority: i32,
}

// ---------------------------------------------------------------------------
// Results
// ---------------------------------------------------------------------------

/// Outcome of one generation request. Exactly one of `artifact` and `error`
/// is set; use the constructors to keep it that way.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GenerationItemResult {
    pub request_id: String,
    pub artifact: Option<GenerationArtifact>,
    pub error: Option<String>,
    pub processing_time_secs: f64,
    /// Always within `0.0..=1.0`.
    pub confidence: f64,
}

impl GenerationItemResult {
    pub fn success(
        request_id: impl Into<String>,
        artifact: GenerationArtifact,
        elapsed: Duration,
    ) -> Self {
        let confidence = if artifact.confidence.is_finite() {
            artifact.confidence.clamp(0.0, 1.0)
        } else {
            0.0
        };
        Self {
            request_id: request_id.into(),
            artifact: Some(artifact),
            error: None,
            processing_time_secs: elapsed.as_secs_f64(),
            confidence,
        }
    }

    pub fn failure(request_id: impl Into<String>, error: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            request_id: request_id.into(),
            artifact: None,
            error: Some(error.into()),
            processing_time_secs: elapsed.as_secs_f64(),
            confidence: 0.0,
        }
    }

    /// Synthetic result that surfaces a job-level failure.
    pub fn diagnostic(error: impl Into<String>) -> Self {
        Self::failure(BATCH_ERROR_REQUEST_ID, error, Duration::ZERO)
    }

    pub fn is_success(&self) -> bool {
        self.artifact.is_some() && self.error.is_none()
    }
}

// ---------------------------------------------------------------------------
// Job
// ---------------------------------------------------------------------------

/// The unit of batch work and of observable status.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BatchJob {
    pub job_id: JobId,
    pub workspace_id: DbId,
    pub user_id: DbId,
    /// Sorted by descending priority; ties keep submission order.
    pub requests: Vec<GenerationItemRequest>,
    /// In completion order, not request order.
    pub results: Vec<GenerationItemResult>,
    pub status: BatchStatus,
    pub created_at: Timestamp,
    pub started_at: Option<Timestamp>,
    pub completed_at: Option<Timestamp>,
    pub total_requests: usize,
    pub completed_requests: usize,
    pub failed_requests: usize,
    /// `completed_requests / total_requests * 100`.
    pub progress: f64,
}

impl BatchJob {
    /// Validate `items` and build a pending job from them.
    pub fn create(
        workspace_id: DbId,
        user_id: DbId,
        items: Vec<NewGenerationItem>,
        now: Timestamp,
    ) -> Result<Self, CoreError> {
        validate_items(&items)?;

        let job_id = JobId::new_v4();
        let mut requests: Vec<GenerationItemRequest> = items
            .into_iter()
            .enumerate()
            .map(|(i, item)| GenerationItemRequest {
                id: format!("{job_id}_{i}"),
                prompt: item.prompt,
                data_source_id: item.data_source_id,
                chart_type_hint: item.chart_type_hint,
                priority: item.priority,
            })
            .collect();

        // `sort_by` is stable, so equal priorities keep submission order.
        requests.sort_by(|a, b| b.priority.cmp(&a.priority));

        let total_requests = requests.len();
        Ok(Self {
            job_id,
            workspace_id,
            user_id,
            requests,
            results: Vec::with_capacity(total_requests),
            status: BatchStatus::Pending,
            created_at: now,
            started_at: None,
            completed_at: None,
            total_requests,
            completed_requests: 0,
            failed_requests: 0,
            progress: 0.0,
        })
    }

    fn transition(&mut self, next: BatchStatus, now: Timestamp) -> Result<(), CoreError> {
        if !self.status.can_transition_to(next) {
            return Err(CoreError::InvalidState(format!(
                "Batch job {} cannot move from {} to {next}",
                self.job_id, self.status
            )));
        }
        self.status = next;
        match next {
            BatchStatus::Processing => self.started_at = Some(now),
            BatchStatus::Completed | BatchStatus::Failed | BatchStatus::Cancelled => {
                self.completed_at = Some(now)
            }
            BatchStatus::Pending => {}
        }
        Ok(())
    }

    /// `pending -> processing`; records the start time.
    pub fn start(&mut self, now: Timestamp) -> Result<(), CoreError> {
        self.transition(BatchStatus::Processing, now)
    }

    /// Accept one item result while processing.
    ///
    /// The result that accounts for the last request also moves the job to
    /// `completed`, so a reader never observes 100% on a processing job.
    pub fn record_result(
        &mut self,
        result: GenerationItemResult,
        now: Timestamp,
    ) -> Result<(), CoreError> {
        if self.status != BatchStatus::Processing {
            return Err(CoreError::InvalidState(format!(
                "Batch job {} is {} and no longer accepts results",
                self.job_id, self.status
            )));
        }
        if self.completed_requests >= self.total_requests {
            return Err(CoreError::InvalidState(format!(
                "Batch job {} already has all {} results",
                self.job_id, self.total_requests
            )));
        }

        if !result.is_success() {
            self.failed_requests += 1;
        }
        self.results.push(result);
        self.completed_requests += 1;
        self.progress = self.completed_requests as f64 / self.total_requests as f64 * 100.0;

        if self.completed_requests == self.total_requests {
            self.transition(BatchStatus::Completed, now)?;
        }
        Ok(())
    }

    /// `processing -> failed`, appending a diagnostic result.
    pub fn fail(&mut self, reason: impl Into<String>, now: Timestamp) -> Result<(), CoreError> {
        self.transition(BatchStatus::Failed, now)?;
        self.results.push(GenerationItemResult::diagnostic(reason));
        Ok(())
    }

    /// Move to `cancelled` if the job is not terminal. Returns whether the
    /// transition happened.
    pub fn cancel(&mut self, now: Timestamp) -> bool {
        self.transition(BatchStatus::Cancelled, now).is_ok()
    }

    /// Results that carry an artifact, in completion order.
    pub fn successful_results(&self) -> impl Iterator<Item = &GenerationItemResult> {
        self.results.iter().filter(|r| r.is_success())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use assert_matches::assert_matches;
    use chrono::Utc;
    use serde_json::json;

    use super::*;

    fn artifact(confidence: f64) -> GenerationArtifact {
        GenerationArtifact {
            chart_type: "bar".to_string(),
            title: "Sales".to_string(),
            sql_query: "SELECT 1".to_string(),
            chart_config: json!({ "type": "bar" }),
            confidence,
            reasoning: String::new(),
        }
    }

    fn job_with_priorities(priorities: &[i32]) -> BatchJob {
        let items = priorities
            .iter()
            .enumerate()
            .map(|(i, p)| NewGenerationItem::new(format!("prompt {i}")).with_priority(*p))
            .collect();
        BatchJob::create(1, 2, items, Utc::now()).unwrap()
    }

    // -- status ---------------------------------------------------------------

    #[test]
    fn terminal_states() {
        assert!(!BatchStatus::Pending.is_terminal());
        assert!(!BatchStatus::Processing.is_terminal());
        assert!(BatchStatus::Completed.is_terminal());
        assert!(BatchStatus::Failed.is_terminal());
        assert!(BatchStatus::Cancelled.is_terminal());
    }

    #[test]
    fn no_transition_leaves_terminal_state() {
        let all = [
            BatchStatus::Pending,
            BatchStatus::Processing,
            BatchStatus::Completed,
            BatchStatus::Failed,
            BatchStatus::Cancelled,
        ];
        for from in all.iter().filter(|s| s.is_terminal()) {
            for to in all {
                assert!(!from.can_transition_to(to), "{from} -> {to}");
            }
        }
    }

    #[test]
    fn pending_cannot_complete_directly() {
        assert!(!BatchStatus::Pending.can_transition_to(BatchStatus::Completed));
        assert!(!BatchStatus::Pending.can_transition_to(BatchStatus::Failed));
    }

    #[test]
    fn status_serializes_snake_case() {
        assert_eq!(
            serde_json::to_value(BatchStatus::Cancelled).unwrap(),
            json!("cancelled")
        );
    }

    // -- validate_items -------------------------------------------------------

    #[test]
    fn empty_request_list_rejected() {
        assert_matches!(validate_items(&[]), Err(CoreError::Validation(_)));
    }

    #[test]
    fn blank_prompt_rejected() {
        let items = vec![NewGenerationItem::new("ok"), NewGenerationItem::new("   ")];
        assert_matches!(
            validate_items(&items),
            Err(CoreError::Validation(msg)) if msg.contains("index 1")
        );
    }

    #[test]
    fn empty_prompt_rejected() {
        let items = vec![NewGenerationItem::new("")];
        assert_matches!(validate_items(&items), Err(CoreError::Validation(_)));
    }

    #[test]
    fn oversized_batch_rejected() {
        let items = vec![NewGenerationItem::new("p"); MAX_BATCH_SIZE + 1];
        assert_matches!(validate_items(&items), Err(CoreError::Validation(_)));
    }

    #[test]
    fn missing_priority_defaults_on_deserialize() {
        let item: NewGenerationItem = serde_json::from_value(json!({ "prompt": "p" })).unwrap();
        assert_eq!(item.priority, DEFAULT_PRIORITY);
        assert!(item.chart_type_hint.is_none());
    }

    // -- create ---------------------------------------------------------------

    #[test]
    fn create_sorts_by_descending_priority() {
        let job = job_with_priorities(&[1, 5, 3]);
        let priorities: Vec<i32> = job.requests.iter().map(|r| r.priority).collect();
        assert_eq!(priorities, vec![5, 3, 1]);
    }

    #[test]
    fn create_keeps_submission_order_for_ties() {
        let job = job_with_priorities(&[2, 9, 2, 2]);
        let ids: Vec<String> = job.requests.iter().map(|r| r.id.clone()).collect();
        let prefix = job.job_id.to_string();
        assert_eq!(
            ids,
            vec![
                format!("{prefix}_1"),
                format!("{prefix}_0"),
                format!("{prefix}_2"),
                format!("{prefix}_3"),
            ]
        );
    }

    #[test]
    fn create_initializes_pending_job() {
        let job = job_with_priorities(&[1, 1]);
        assert_eq!(job.status, BatchStatus::Pending);
        assert_eq!(job.total_requests, 2);
        assert_eq!(job.completed_requests, 0);
        assert!(job.started_at.is_none());
        assert!(job.completed_at.is_none());
        assert_eq!(job.progress, 0.0);
    }

    // -- record_result --------------------------------------------------------

    #[test]
    fn record_result_requires_processing() {
        let mut job = job_with_priorities(&[1]);
        let result = GenerationItemResult::success("x", artifact(0.5), Duration::ZERO);
        assert_matches!(
            job.record_result(result, Utc::now()),
            Err(CoreError::InvalidState(_))
        );
    }

    #[test]
    fn last_result_completes_job() {
        let mut job = job_with_priorities(&[1, 1, 1, 1]);
        job.start(Utc::now()).unwrap();

        let ids: Vec<String> = job.requests.iter().map(|r| r.id.clone()).collect();
        for (i, id) in ids.iter().enumerate() {
            let result = if i == 2 {
                GenerationItemResult::failure(id.clone(), "boom", Duration::ZERO)
            } else {
                GenerationItemResult::success(id.clone(), artifact(0.9), Duration::ZERO)
            };
            job.record_result(result, Utc::now()).unwrap();
            assert!(job.completed_requests <= job.total_requests);
            if i < 3 {
                assert_eq!(job.status, BatchStatus::Processing);
                assert!(job.progress < 100.0);
            }
        }

        assert_eq!(job.status, BatchStatus::Completed);
        assert_eq!(job.progress, 100.0);
        assert_eq!(job.failed_requests, 1);
        assert_eq!(job.results.len(), job.total_requests);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn progress_is_monotonic() {
        let mut job = job_with_priorities(&[1, 1, 1]);
        job.start(Utc::now()).unwrap();
        let mut last = job.progress;
        for _ in 0..3 {
            job.record_result(GenerationItemResult::diagnostic("e"), Utc::now())
                .unwrap();
            assert!(job.progress >= last);
            last = job.progress;
        }
    }

    // -- fail / cancel --------------------------------------------------------

    #[test]
    fn fail_appends_diagnostic_result() {
        let mut job = job_with_priorities(&[1]);
        job.start(Utc::now()).unwrap();
        job.fail("context invalid", Utc::now()).unwrap();

        assert_eq!(job.status, BatchStatus::Failed);
        assert_eq!(job.results.len(), 1);
        assert_eq!(job.results[0].request_id, BATCH_ERROR_REQUEST_ID);
        assert_eq!(job.results[0].error.as_deref(), Some("context invalid"));
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn cancel_twice_returns_true_then_false() {
        let mut job = job_with_priorities(&[1]);
        assert!(job.cancel(Utc::now()));
        assert!(job.completed_at.is_some());
        assert!(!job.cancel(Utc::now()));
        assert_eq!(job.status, BatchStatus::Cancelled);
    }

    #[test]
    fn cancelled_job_rejects_results() {
        let mut job = job_with_priorities(&[1]);
        job.start(Utc::now()).unwrap();
        assert!(job.cancel(Utc::now()));
        let result = GenerationItemResult::diagnostic("late");
        assert!(job.record_result(result, Utc::now()).is_err());
        assert!(job.results.is_empty());
    }

    // -- results --------------------------------------------------------------

    #[test]
    fn success_clamps_confidence() {
        let r = GenerationItemResult::success("a", artifact(1.7), Duration::from_millis(1500));
        assert_eq!(r.confidence, 1.0);
        assert!((r.processing_time_secs - 1.5).abs() < f64::EPSILON);
        assert!(r.is_success());
    }

    #[test]
    fn failure_has_no_artifact() {
        let r = GenerationItemResult::failure("a", "nope", Duration::ZERO);
        assert!(r.artifact.is_none());
        assert_eq!(r.confidence, 0.0);
        assert!(!r.is_success());
    }
}
