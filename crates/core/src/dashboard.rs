//! Dashboard derivation from completed batch jobs.
//!
//! Pure layout computation: successful results are placed on a row-major
//! grid of at most [`MAX_COLUMNS`] columns, each cell [`CELL_WIDTH`] by
//! [`CELL_HEIGHT`] grid units.

use serde::{Deserialize, Serialize};

use crate::batch::{BatchJob, BatchStatus, GenerationItemResult};
use crate::error::CoreError;
use crate::types::{DbId, JobId, Timestamp};

// ---------------------------------------------------------------------------
// Constants
// ---------------------------------------------------------------------------

/// Maximum charts placed side by side.
pub const MAX_COLUMNS: usize = 3;

/// Width of one chart in grid units.
pub const CELL_WIDTH: u32 = 4;

/// Height of one chart in grid units.
pub const CELL_HEIGHT: u32 = 3;

/// Total grid columns of the rendered dashboard.
pub const GRID_SIZE: u32 = 12;

/// Pixel height of one grid row.
pub const ROW_HEIGHT_PX: u32 = 100;

/// Horizontal and vertical margin between charts, in pixels.
pub const MARGIN_PX: [u32; 2] = [10, 10];

// ---------------------------------------------------------------------------
// Types
// ---------------------------------------------------------------------------

/// Placement of one chart on the dashboard grid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct GridPosition {
    pub column: u32,
    pub row: u32,
    pub x: u32,
    pub y: u32,
    pub w: u32,
    pub h: u32,
}

/// Grid settings for the whole dashboard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DashboardLayout {
    pub grid_size: u32,
    pub row_height: u32,
    pub margin: [u32; 2],
    pub responsive: bool,
    pub auto_size: bool,
    pub columns: u32,
    pub rows: u32,
}

/// A successful result and where it sits on the grid.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardChart {
    pub result: GenerationItemResult,
    pub position: GridPosition,
}

/// Dashboard assembled from a completed batch job.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DashboardDescriptor {
    pub id: uuid::Uuid,
    pub name: String,
    pub description: String,
    pub source_job_id: JobId,
    pub workspace_id: DbId,
    pub created_by: DbId,
    pub created_at: Timestamp,
    pub charts: Vec<DashboardChart>,
    pub layout: DashboardLayout,
}

// ---------------------------------------------------------------------------
// Layout computation
// ---------------------------------------------------------------------------

/// Number of columns used for `total` charts.
pub fn column_count(total: usize) -> usize {
    total.clamp(1, MAX_COLUMNS)
}

/// Number of rows used for `total` charts.
pub fn row_count(total: usize) -> usize {
    total.div_ceil(column_count(total))
}

/// Position of the chart at `index` among `total` charts.
pub fn chart_position(index: usize, total: usize) -> GridPosition {
    let cols = column_count(total);
    let column = (index % cols) as u32;
    let row = (index / cols) as u32;
    GridPosition {
        column,
        row,
        x: column * CELL_WIDTH,
        y: row * CELL_HEIGHT,
        w: CELL_WIDTH,
        h: CELL_HEIGHT,
    }
}

/// Grid settings for `total` charts.
pub fn dashboard_layout(total: usize) -> DashboardLayout {
    DashboardLayout {
        grid_size: GRID_SIZE,
        row_height: ROW_HEIGHT_PX,
        margin: MARGIN_PX,
        responsive: true,
        auto_size: true,
        columns: column_count(total) as u32,
        rows: row_count(total) as u32,
    }
}

/// Build a dashboard from the successful results of a completed job.
///
/// Fails with `InvalidState` unless the job is completed, and with
/// `NoUsableResults` when no result carries an artifact.
pub fn derive_dashboard(
    job: &BatchJob,
    name: &str,
    now: Timestamp,
) -> Result<DashboardDescriptor, CoreError> {
    if job.status != BatchStatus::Completed {
        return Err(CoreError::InvalidState(format!(
            "Batch job {} is {}, dashboards require a completed job",
            job.job_id, job.status
        )));
    }

    let successful: Vec<&GenerationItemResult> = job.successful_results().collect();
    if successful.is_empty() {
        return Err(CoreError::NoUsableResults(format!(
            "Batch job {} has no successful charts",
            job.job_id
        )));
    }

    let total = successful.len();
    let charts = successful
        .into_iter()
        .enumerate()
        .map(|(i, result)| DashboardChart {
            result: result.clone(),
            position: chart_position(i, total),
        })
        .collect();

    Ok(DashboardDescriptor {
        id: uuid::Uuid::new_v4(),
        name: name.to_string(),
        description: format!("Auto-generated dashboard from batch job {}", job.job_id),
        source_job_id: job.job_id,
        workspace_id: job.workspace_id,
        created_by: job.user_id,
        created_at: now,
        charts,
        layout: dashboard_layout(total),
    })
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
