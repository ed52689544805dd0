//! Handlers for the `/batch-jobs` and `/batch-templates` resources.

use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::Json;
use chartgen_core::batch::{BatchStatus, NewGenerationItem};
use chartgen_core::chart::SchemaContext;
use chartgen_core::templates::{BatchTemplate, ALL_TEMPLATES};
use chartgen_core::types::{DbId, JobId};
use serde::{Deserialize, Serialize};
use validator::Validate;

use crate::error::{AppError, AppResult};
use crate::response::DataResponse;
use crate::state::AppState;

// ---------------------------------------------------------------------------
// Request / response types
// ---------------------------------------------------------------------------

/// Body of `POST /batch-jobs`. Exactly one of `requests` and `template` is used.
#[derive(Debug, Deserialize, Validate)]
pub struct CreateBatchJob {
    #[validate(range(min = 1))]
    pub workspace_id: DbId,
    #[validate(range(min = 1))]
    pub user_id: DbId,
    #[serde(default)]
    pub requests: Vec<NewGenerationItem>,
    #[serde(default)]
    pub template: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct JobCreated {
    pub job_id: JobId,
    pub status: BatchStatus,
}

#[derive(Debug, Deserialize)]
pub struct JobListQuery {
    pub workspace_id: Option<DbId>,
    pub user_id: Option<DbId>,
}

/// Body of `POST /batch-jobs/{id}/process`.
#[derive(Debug, Default, Deserialize)]
pub struct ProcessBatchJob {
    #[serde(default)]
    pub context: SchemaContext,
    /// Block until the job is terminal instead of returning 202.
    #[serde(default)]
    pub wait: bool,
}

#[derive(Debug, Serialize)]
pub struct ProcessAccepted {
    pub job_id: JobId,
    pub status: BatchStatus,
}

#[derive(Debug, Serialize)]
pub struct CancelOutcome {
    pub cancelled: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateDashboard {
    #[validate(length(min = 1, max = 200))]
    pub name: String,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct CleanupJobs {
    /// Defaults to the configured retention.
    #[validate(range(min = 0))]
    pub max_age_hours: Option<i64>,
}

#[derive(Debug, Serialize)]
pub struct CleanupOutcome {
    pub removed: usize,
}

#[derive(Debug, Serialize)]
pub struct TemplateSummary {
    pub name: &'static str,
    pub requests: Vec<NewGenerationItem>,
}

// ---------------------------------------------------------------------------
// Create
// ---------------------------------------------------------------------------

/// POST /api/v1/batch-jobs
///
/// Register a pending job from explicit requests or a named template.
pub async fn create_job(
    State(state): State<AppState>,
    Json(input): Json<CreateBatchJob>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;

    let items = match (input.template.as_deref(), input.requests.is_empty()) {
        (Some(_), false) => {
            return Err(AppError::BadRequest(
                "Provide either 'requests' or 'template', not both".into(),
            ))
        }
        (Some(name), true) => BatchTemplate::from_name(name)?.requests(),
        (None, _) => input.requests,
    };

    let job_id = state
        .manager
        .create(input.workspace_id, input.user_id, items)
        .await?;

    Ok((
        StatusCode::CREATED,
        Json(DataResponse {
            data: JobCreated {
                job_id,
                status: BatchStatus::Pending,
            },
        }),
    ))
}

// ---------------------------------------------------------------------------
// Queries
// ---------------------------------------------------------------------------

/// GET /api/v1/batch-jobs?workspace_id=&user_id=
///
/// At least one filter is required. With both, jobs must match both.
pub async fn list_jobs(
    State(state): State<AppState>,
    Query(params): Query<JobListQuery>,
) -> AppResult<impl IntoResponse> {
    let jobs = match (params.workspace_id, params.user_id) {
        (Some(workspace_id), user_id) => state
            .manager
            .jobs_for_workspace(workspace_id)
            .await
            .into_iter()
            .filter(|job| user_id.map_or(true, |u| job.user_id == u))
            .collect(),
        (None, Some(user_id)) => state.manager.jobs_for_user(user_id).await,
        (None, None) => {
            return Err(AppError::BadRequest(
                "Either workspace_id or user_id is required".into(),
            ))
        }
    };

    Ok(Json(DataResponse { data: jobs }))
}

/// GET /api/v1/batch-jobs/{id}
pub async fn get_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let job = state.manager.status(job_id).await?;
    Ok(Json(DataResponse { data: job }))
}

/// GET /api/v1/batch-jobs/{id}/results
///
/// 409 until the job is completed.
pub async fn get_results(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    let results = state.manager.results(job_id).await?;
    Ok(Json(DataResponse { data: results }))
}

// ---------------------------------------------------------------------------
// Commands
// ---------------------------------------------------------------------------

/// POST /api/v1/batch-jobs/{id}/process
///
/// Starts processing in the background and returns 202. With
/// `"wait": true` the request blocks and returns the terminal job. If the
/// wait outlasts the process timeout the client gets 408 and the job keeps
/// running; poll `GET /batch-jobs/{id}` for the outcome.
pub async fn process_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(input): Json<ProcessBatchJob>,
) -> AppResult<axum::response::Response> {
    if input.wait {
        let job = state.manager.process(job_id, input.context).await?;
        return Ok(Json(DataResponse { data: job }).into_response());
    }

    state.manager.spawn_process(job_id, input.context).await?;
    tracing::info!(%job_id, "Batch job processing scheduled");

    let status = state.manager.status(job_id).await?.status;
    Ok((
        StatusCode::ACCEPTED,
        Json(DataResponse {
            data: ProcessAccepted { job_id, status },
        }),
    )
        .into_response())
}

/// POST /api/v1/batch-jobs/{id}/cancel
pub async fn cancel_job(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
) -> AppResult<impl IntoResponse> {
    // 404 for unknown ids; `cancel` itself only reports whether it transitioned.
    state.manager.status(job_id).await?;
    let cancelled = state.manager.cancel(job_id).await;
    Ok(Json(DataResponse {
        data: CancelOutcome { cancelled },
    }))
}

/// POST /api/v1/batch-jobs/{id}/dashboard
pub async fn create_dashboard(
    State(state): State<AppState>,
    Path(job_id): Path<JobId>,
    Json(input): Json<CreateDashboard>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let dashboard = state
        .manager
        .derive_dashboard(job_id, input.name.trim())
        .await?;
    Ok((StatusCode::CREATED, Json(DataResponse { data: dashboard })))
}

/// POST /api/v1/batch-jobs/cleanup
pub async fn cleanup_jobs(
    State(state): State<AppState>,
    Json(input): Json<CleanupJobs>,
) -> AppResult<impl IntoResponse> {
    input.validate()?;
    let max_age_hours = input
        .max_age_hours
        .unwrap_or(state.manager.config().job_retention_hours);
    let removed = state.manager.cleanup(max_age_hours).await;
    Ok(Json(DataResponse {
        data: CleanupOutcome { removed },
    }))
}

// ---------------------------------------------------------------------------
// Templates
// ---------------------------------------------------------------------------

/// GET /api/v1/batch-templates
pub async fn list_templates() -> Json<DataResponse<Vec<TemplateSummary>>> {
    let templates = ALL_TEMPLATES
        .iter()
        .map(|t| TemplateSummary {
            name: t.name(),
            requests: t.requests(),
        })
        .collect();
    Json(DataResponse { data: templates })
}
