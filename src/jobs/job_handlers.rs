use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use super::job::{JobKind, JobSummary};
use crate::{
    error::{AppError, Result},
    state::AppState,
};

/// Trigger a job out of schedule; answers with the run summary,
/// under a 500 status when the run itself failed
pub async fn run_job(
    State(state): State<AppState>,
    Path(job): Path<String>,
) -> Result<(StatusCode, Json<JobSummary>)> {
    let kind: JobKind = job.parse().map_err(AppError::NotFound)?;
    let summary = state.job_runner.run(kind).await?;

    let status = if summary.success {
        StatusCode::OK
    } else {
        StatusCode::INTERNAL_SERVER_ERROR
    };

    Ok((status, Json(summary)))
}
