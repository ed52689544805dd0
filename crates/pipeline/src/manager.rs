//! Batch job registry and lifecycle driver.
//!
//! [`BatchJobManager`] is created once at startup and shared as
//! `Arc<BatchJobManager>`. It is the only writer of job state. Every status
//! change happens under the registry write lock, so a check of the current
//! status and the write that follows it are a single atomic step.
//!
//! Processing a job happens on a task that owns an `Arc` of the manager,
//! independent of whoever asked for it:
//!
//! 1. wait for a slot of the process-wide job gate (or for cancellation),
//! 2. claim the job `pending -> processing`,
//! 3. spawn a dispatcher that walks the requests in priority order, taking
//!    a slot of a fresh per-job item gate before spawning each item,
//! 4. fold results into the job in arrival order as they come back on an
//!    mpsc channel; the last one completes the job.
//!
//! Each job carries a [`CancellationToken`] that is a child of the
//! manager's token, so [`BatchJobManager::cancel`] stops one job and
//! [`BatchJobManager::shutdown`] stops all of them.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use chartgen_core::batch::{
    BatchJob, BatchStatus, GenerationItemRequest, GenerationItemResult, NewGenerationItem,
};
use chartgen_core::chart::SchemaContext;
use chartgen_core::dashboard::{self, DashboardDescriptor};
use chartgen_core::error::CoreError;
use chartgen_core::job_events::{
    EVENT_JOB_CANCELLED, EVENT_JOB_COMPLETED, EVENT_JOB_CREATED, EVENT_JOB_FAILED,
    EVENT_JOB_PROGRESS, EVENT_JOB_STARTED,
};
use chartgen_core::types::{DbId, JobId, Timestamp};
use chartgen_events::{BatchEvent, EventBus};
use chartgen_providers::ProviderFallbackClient;
use chrono::{TimeDelta, Utc};
use tokio::sync::{mpsc, RwLock};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::config::BatchConfig;
use crate::gate::ConcurrencyGate;

const JOB_ENTITY: &str = "BatchJob";

/// Owns every batch job and runs them.
pub struct BatchJobManager {
    jobs: RwLock<HashMap<JobId, JobEntry>>,
    generator: Arc<ProviderFallbackClient>,
    /// Bounds concurrently processing jobs across the whole process.
    job_gate: ConcurrencyGate,
    config: BatchConfig,
    event_bus: Arc<EventBus>,
    /// Master token; every job token is a child of it.
    cancel: CancellationToken,
}

struct JobEntry {
    job: BatchJob,
    cancel: CancellationToken,
}

/// Outcome of trying to move an admitted job into `processing`.
enum Claim {
    Started(Vec<GenerationItemRequest>),
    /// Cancelled while waiting for admission.
    Cancelled(BatchJob),
}

impl BatchJobManager {
    pub fn new(
        generator: Arc<ProviderFallbackClient>,
        event_bus: Arc<EventBus>,
        config: BatchConfig,
    ) -> Self {
        Self {
            jobs: RwLock::new(HashMap::new()),
            generator,
            job_gate: ConcurrencyGate::new(config.max_concurrent_jobs),
            config,
            event_bus,
            cancel: CancellationToken::new(),
        }
    }

    pub fn config(&self) -> &BatchConfig {
        &self.config
    }

    /// Jobs currently holding a slot of the job gate.
    pub fn jobs_in_flight(&self) -> usize {
        self.job_gate.in_flight()
    }

    // ---- commands ----

    /// Validate `items` and register a new pending job.
    ///
    /// No generation work starts until [`process`](Self::process) is called.
    pub async fn create(
        &self,
        workspace_id: DbId,
        user_id: DbId,
        items: Vec<NewGenerationItem>,
    ) -> Result<JobId, CoreError> {
        let job = BatchJob::create(workspace_id, user_id, items, Utc::now())?;
        let job_id = job.job_id;
        let event = BatchEvent::for_job(EVENT_JOB_CREATED, &job);

        tracing::info!(
            %job_id,
            workspace_id,
            user_id,
            total_requests = job.total_requests,
            "Batch job created",
        );

        self.jobs.write().await.insert(
            job_id,
            JobEntry {
                job,
                cancel: self.cancel.child_token(),
            },
        );
        self.event_bus.publish(event);
        Ok(job_id)
    }

    /// Run a pending job to a terminal state and return it.
    ///
    /// Suspends while the job gate is saturated. Item failures are recorded
    /// as failed results and never abort the job. Fails with `NotFound` for
    /// an unknown id and `InvalidState` when the job is not pending or is
    /// claimed by another caller first.
    ///
    /// The job runs on its own task, so dropping this future (a client
    /// timeout, a `select!` branch) does not strand it in `processing`.
    pub async fn process(
        self: &Arc<Self>,
        job_id: JobId,
        context: SchemaContext,
    ) -> Result<BatchJob, CoreError> {
        self.spawn_process(job_id, context)
            .await?
            .await
            .map_err(|e| CoreError::Internal(format!("Batch job {job_id} task aborted: {e}")))?
    }

    /// Start a pending job on a background task and return its handle.
    ///
    /// Unknown and non-pending jobs are rejected before spawning.
    pub async fn spawn_process(
        self: &Arc<Self>,
        job_id: JobId,
        context: SchemaContext,
    ) -> Result<JoinHandle<Result<BatchJob, CoreError>>, CoreError> {
        let cancel = {
            let jobs = self.jobs.read().await;
            let entry = jobs.get(&job_id).ok_or_else(|| not_found(job_id))?;
            ensure_pending(&entry.job)?;
            entry.cancel.clone()
        };

        let manager = Arc::clone(self);
        Ok(tokio::spawn(async move {
            let outcome = manager.run_job(job_id, context, cancel).await;
            if let Err(e) = &outcome {
                tracing::error!(%job_id, error = %e, "Batch processing failed");
            }
            outcome
        }))
    }

    /// Move a pending or processing job to `cancelled`.
    ///
    /// Returns `false` when the job does not exist or is already terminal.
    /// In-flight item generations are signalled to stop; anything they
    /// still deliver is discarded.
    pub async fn cancel(&self, job_id: JobId) -> bool {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(&job_id) else {
            return false;
        };
        if !entry.job.cancel(Utc::now()) {
            return false;
        }
        entry.cancel.cancel();

        tracing::info!(
            %job_id,
            completed_requests = entry.job.completed_requests,
            total_requests = entry.job.total_requests,
            "Batch job cancelled",
        );
        self.event_bus
            .publish(BatchEvent::for_job(EVENT_JOB_CANCELLED, &entry.job));
        true
    }

    /// Remove terminal jobs that completed more than `max_age_hours` ago.
    ///
    /// Returns the number of removed jobs.
    pub async fn cleanup(&self, max_age_hours: i64) -> usize {
        let cutoff = TimeDelta::try_hours(max_age_hours.max(0))
            .and_then(|age| Utc::now().checked_sub_signed(age));
        match cutoff {
            Some(cutoff) => self.remove_completed_before(cutoff).await,
            None => 0,
        }
    }

    /// Remove jobs whose completion time is strictly before `cutoff`.
    /// Jobs without a completion time are never removed.
    pub async fn remove_completed_before(&self, cutoff: Timestamp) -> usize {
        let mut jobs = self.jobs.write().await;
        let before = jobs.len();
        jobs.retain(|_, entry| !matches!(entry.job.completed_at, Some(t) if t < cutoff));
        let removed = before - jobs.len();

        if removed > 0 {
            tracing::info!(removed, remaining = jobs.len(), "Old batch jobs cleaned up");
        }
        removed
    }

    /// Stop every job and refuse further admissions.
    pub fn shutdown(&self) {
        tracing::info!("Shutting down batch job manager");
        self.job_gate.close();
        self.cancel.cancel();
    }

    // ---- queries ----

    pub async fn status(&self, job_id: JobId) -> Result<BatchJob, CoreError> {
        self.jobs
            .read()
            .await
            .get(&job_id)
            .map(|entry| entry.job.clone())
            .ok_or_else(|| not_found(job_id))
    }

    /// Results of a completed job, in completion order.
    pub async fn results(&self, job_id: JobId) -> Result<Vec<GenerationItemResult>, CoreError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&job_id).ok_or_else(|| not_found(job_id))?;
        if entry.job.status != BatchStatus::Completed {
            return Err(CoreError::NotReady(format!(
                "Batch job {job_id} is {}, results are available once completed",
                entry.job.status
            )));
        }
        Ok(entry.job.results.clone())
    }

    /// Jobs owned by a workspace, newest first.
    pub async fn jobs_for_workspace(&self, workspace_id: DbId) -> Vec<BatchJob> {
        self.jobs_matching(|job| job.workspace_id == workspace_id)
            .await
    }

    /// Jobs submitted by a user, newest first.
    pub async fn jobs_for_user(&self, user_id: DbId) -> Vec<BatchJob> {
        self.jobs_matching(|job| job.user_id == user_id).await
    }

    /// Lay out the successful charts of a completed job as a dashboard.
    pub async fn derive_dashboard(
        &self,
        job_id: JobId,
        name: &str,
    ) -> Result<DashboardDescriptor, CoreError> {
        let jobs = self.jobs.read().await;
        let entry = jobs.get(&job_id).ok_or_else(|| not_found(job_id))?;
        let descriptor = dashboard::derive_dashboard(&entry.job, name, Utc::now())?;

        tracing::info!(
            %job_id,
            dashboard_id = %descriptor.id,
            charts = descriptor.charts.len(),
            "Dashboard derived from batch job",
        );
        Ok(descriptor)
    }

    // ---- private helpers ----

    async fn jobs_matching(&self, predicate: impl Fn(&BatchJob) -> bool) -> Vec<BatchJob> {
        let mut matching: Vec<BatchJob> = self
            .jobs
            .read()
            .await
            .values()
            .filter(|entry| predicate(&entry.job))
            .map(|entry| entry.job.clone())
            .collect();
        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        matching
    }

    /// Admission, claim, fan-out and the final transition of one job.
    async fn run_job(
        &self,
        job_id: JobId,
        context: SchemaContext,
        cancel: CancellationToken,
    ) -> Result<BatchJob, CoreError> {
        // Held until this function returns, whatever the exit path.
        let _job_permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                tracing::info!(%job_id, "Batch job cancelled before admission");
                return self.status(job_id).await;
            }
            permit = self.job_gate.acquire() => permit.map_err(|e| {
                CoreError::Internal(format!("Cannot admit batch job {job_id}: {e}"))
            })?,
        };

        let requests = match self.claim(job_id).await? {
            Claim::Started(requests) => requests,
            Claim::Cancelled(job) => return Ok(job),
        };

        if let Err(e) = context.validate() {
            self.fail_job(job_id, format!("Invalid generation context: {e}"))
                .await;
            return self.status(job_id).await;
        }

        let (issued, received) = self.fan_out(job_id, requests, context, cancel.clone()).await;

        // No-op unless the job is still processing, i.e. results went missing.
        let reason = if cancel.is_cancelled() {
            "Batch processing interrupted by shutdown".to_string()
        } else {
            format!("Only {received} of {issued} issued items reported a result")
        };
        self.fail_job(job_id, reason).await;

        self.status(job_id).await
    }

    /// Compare-and-set `pending -> processing`.
    async fn claim(&self, job_id: JobId) -> Result<Claim, CoreError> {
        let mut jobs = self.jobs.write().await;
        let entry = jobs.get_mut(&job_id).ok_or_else(|| not_found(job_id))?;

        match entry.job.status {
            BatchStatus::Pending => {
                entry.job.start(Utc::now())?;
                tracing::info!(
                    %job_id,
                    total_requests = entry.job.total_requests,
                    "Batch job processing started",
                );
                self.event_bus
                    .publish(BatchEvent::for_job(EVENT_JOB_STARTED, &entry.job));
                Ok(Claim::Started(entry.job.requests.clone()))
            }
            BatchStatus::Cancelled => Ok(Claim::Cancelled(entry.job.clone())),
            _ => Err(not_pending(&entry.job)),
        }
    }

    /// Issue every request and fold the results in as they arrive.
    ///
    /// Returns `(issued, received)` counts.
    async fn fan_out(
        &self,
        job_id: JobId,
        requests: Vec<GenerationItemRequest>,
        context: SchemaContext,
        cancel: CancellationToken,
    ) -> (usize, usize) {
        let (tx, mut rx) = mpsc::channel(requests.len().max(1));
        let dispatcher = tokio::spawn(dispatch_items(
            requests,
            ConcurrencyGate::new(self.config.max_concurrent_items),
            Arc::clone(&self.generator),
            Arc::new(context),
            cancel,
            tx,
        ));

        let mut received = 0;
        while let Some(result) = rx.recv().await {
            received += 1;
            self.accept_result(job_id, result).await;
        }

        let issued = match dispatcher.await {
            Ok(issued) => issued,
            Err(e) => {
                tracing::error!(%job_id, error = %e, "Item dispatcher aborted");
                received
            }
        };
        (issued, received)
    }

    async fn accept_result(&self, job_id: JobId, result: GenerationItemResult) {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(&job_id) else {
            tracing::debug!(%job_id, request_id = %result.request_id, "Result for unknown job discarded");
            return;
        };

        let request_id = result.request_id.clone();
        if let Err(e) = entry.job.record_result(result, Utc::now()) {
            tracing::debug!(%job_id, %request_id, reason = %e, "Late result discarded");
            return;
        }

        let job = &entry.job;
        self.event_bus.publish(
            BatchEvent::for_job(EVENT_JOB_PROGRESS, job)
                .with_payload(serde_json::json!({ "request_id": request_id })),
        );

        if job.status == BatchStatus::Completed {
            tracing::info!(
                %job_id,
                completed_requests = job.completed_requests,
                failed_requests = job.failed_requests,
                "Batch job completed",
            );
            self.event_bus
                .publish(BatchEvent::for_job(EVENT_JOB_COMPLETED, job));
        }
    }

    /// Fail a processing job with a diagnostic result. No-op otherwise.
    async fn fail_job(&self, job_id: JobId, reason: String) {
        let mut jobs = self.jobs.write().await;
        let Some(entry) = jobs.get_mut(&job_id) else {
            return;
        };
        if entry.job.status != BatchStatus::Processing {
            return;
        }
        if let Err(e) = entry.job.fail(reason.clone(), Utc::now()) {
            tracing::error!(%job_id, error = %e, "Could not mark batch job failed");
            return;
        }

        tracing::error!(%job_id, %reason, "Batch job failed");
        self.event_bus.publish(
            BatchEvent::for_job(EVENT_JOB_FAILED, &entry.job)
                .with_payload(serde_json::json!({ "error": reason })),
        );
    }
}

/// Issue requests in order, one item-gate slot each, until done or cancelled.
///
/// The slot is taken before the item task is spawned, so issuance order is
/// exactly request order. Returns the number of issued items.
async fn dispatch_items(
    requests: Vec<GenerationItemRequest>,
    item_gate: ConcurrencyGate,
    generator: Arc<ProviderFallbackClient>,
    context: Arc<SchemaContext>,
    cancel: CancellationToken,
    results: mpsc::Sender<GenerationItemResult>,
) -> usize {
    let mut issued = 0;

    for request in requests {
        let permit = tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            permit = item_gate.acquire() => match permit {
                Ok(permit) => permit,
                Err(_) => break,
            },
        };
        issued += 1;

        let generator = Arc::clone(&generator);
        let context = Arc::clone(&context);
        let cancel = cancel.clone();
        let results = results.clone();
        tokio::spawn(async move {
            let _permit = permit;
            let result = tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                result = generate_item(&generator, &request, &context) => result,
            };
            // The receiver is gone only if the manager stopped collecting.
            let _ = results.send(result).await;
        });
    }

    issued
}

/// Generate one item. Always yields a result; failures are captured in it.
async fn generate_item(
    generator: &ProviderFallbackClient,
    request: &GenerationItemRequest,
    context: &SchemaContext,
) -> GenerationItemResult {
    let started = Instant::now();
    match generator.generate(&request.prompt, context).await {
        Ok(artifact) => GenerationItemResult::success(&request.id, artifact, started.elapsed()),
        Err(e) => {
            tracing::warn!(request_id = %request.id, error = %e, "Item generation failed");
            GenerationItemResult::failure(&request.id, e.to_string(), started.elapsed())
        }
    }
}

fn not_found(job_id: JobId) -> CoreError {
    CoreError::NotFound {
        entity: JOB_ENTITY,
        id: job_id.to_string(),
    }
}

fn not_pending(job: &BatchJob) -> CoreError {
    CoreError::InvalidState(format!(
        "Batch job {} is {}, only pending jobs can be processed",
        job.job_id, job.status
    ))
}

fn ensure_pending(job: &BatchJob) -> Result<(), CoreError> {
    if job.status == BatchStatus::Pending {
        Ok(())
    } else {
        Err(not_pending(job))
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
