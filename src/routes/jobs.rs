use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::Json;
use uuid::Uuid;

use crate::app_state::AppState;
use crate::db::store::JobStore;
use crate::models::response::JobStatusResponse;
use crate::services::cleanup::JOB_TYPES;

/// GET /api/v1/jobs/{job_type}/{job_id}: status, errors and payload of a job.
pub async fn get_job(
    State(state): State<AppState>,
    Path((job_type, job_id)): Path<(String, Uuid)>,
) -> Result<Json<JobStatusResponse>, StatusCode> {
    if !JOB_TYPES.contains(&job_type.as_str()) {
        return Err(StatusCode::NOT_FOUND);
    }

    match state.store.get(&job_type, job_id).await {
        Ok(Some(record)) => Ok(Json(record.into())),
        Ok(None) => Err(StatusCode::NOT_FOUND),
        Err(e) => {
            tracing::error!(job_id = %job_id, job_type = %job_type, error = %e, "Failed to load job");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}
