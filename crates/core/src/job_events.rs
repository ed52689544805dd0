//! Event type names for batch job lifecycle events.
//!
//! Published on the event bus by the batch manager and forwarded verbatim
//! as the `event_type` of WebSocket frames.

/// A job was created in `pending` status.
pub const EVENT_JOB_CREATED: &str = "batch_job_created";

/// A job acquired its slot and moved to `processing`.
pub const EVENT_JOB_STARTED: &str = "batch_job_started";

/// One item result was accepted (progress percentage changed).
pub const EVENT_JOB_PROGRESS: &str = "batch_job_progress";

/// Every item finished; the job is `completed`.
pub const EVENT_JOB_COMPLETED: &str = "batch_job_completed";

/// Orchestration failed; the job is `failed`.
pub const EVENT_JOB_FAILED: &str = "batch_job_failed";

/// The job was cancelled by a caller.
pub const EVENT_JOB_CANCELLED: &str = "batch_job_cancelled";
