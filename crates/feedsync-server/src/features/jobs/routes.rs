//! Job routes

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;
use uuid::Uuid;

use crate::api::response::ApiResponse;
use crate::error::AppError;
use crate::features::FeatureState;

/// Acknowledgement body of the legacy trigger.
pub const LEGACY_ACK: &str = "XML processing request received.";

/// Header carrying the id of the spawned job.
pub const JOB_ID_HEADER: &str = "x-job-id";

/// Query parameters for listing jobs
#[derive(Debug, Default, Deserialize)]
pub struct ListJobsQuery {
    /// Only jobs still in flight
    #[serde(default)]
    pub alive: bool,
}

/// Create job routes
///
/// The `:id` segment is the feed filename for POST and the job id otherwise.
pub fn jobs_routes() -> Router<FeatureState> {
    Router::new()
        .route("/jobs", get(list_jobs))
        .route("/jobs/:id", post(start_job).get(get_job).delete(cancel_job))
}

/// Routes kept for callers of the original trigger service
pub fn legacy_routes() -> Router<FeatureState> {
    Router::new()
        .route("/go/:file_name", get(legacy_trigger).post(legacy_trigger))
        .route("/checkthreads", get(check_threads))
}

/// Start a run for a feed file
///
/// POST /jobs/:file_name
async fn start_job(
    State(state): State<FeatureState>,
    Path(file_name): Path<String>,
) -> Result<Response, AppError> {
    let job = state.jobs.spawn(state.pipeline.clone(), &file_name).await?;

    Ok(ApiResponse::success(json!({
        "job_id": job.id,
        "name": job.name,
    }))
    .with_status(StatusCode::ACCEPTED))
}

/// List jobs
///
/// GET /jobs?alive=true
async fn list_jobs(
    State(state): State<FeatureState>,
    Query(query): Query<ListJobsQuery>,
) -> Result<Response, AppError> {
    let jobs = state.jobs.list(query.alive).await;
    let total = jobs.len();

    Ok(ApiResponse::success_with_meta(jobs, json!({ "total": total })).into_response())
}

/// Get a specific job by ID
///
/// GET /jobs/:job_id
async fn get_job(
    State(state): State<FeatureState>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_job_id(&job_id)?;

    match state.jobs.get(id).await {
        Some(job) => Ok(ApiResponse::success(job).into_response()),
        None => Err(AppError::NotFound(format!("Job {} not found", job_id))),
    }
}

/// Abort an in-flight job
///
/// DELETE /jobs/:job_id
async fn cancel_job(
    State(state): State<FeatureState>,
    Path(job_id): Path<String>,
) -> Result<Response, AppError> {
    let id = parse_job_id(&job_id)?;
    let job = state.jobs.cancel(id).await?;

    Ok(ApiResponse::success(job).into_response())
}

/// GET|POST /go/:file_name
async fn legacy_trigger(
    State(state): State<FeatureState>,
    Path(file_name): Path<String>,
) -> Result<Response, AppError> {
    let job = state.jobs.spawn(state.pipeline.clone(), &file_name).await?;

    Ok((StatusCode::OK, [(JOB_ID_HEADER, job.id.to_string())], LEGACY_ACK).into_response())
}

/// Name and liveness of every known job
///
/// GET /checkthreads
async fn check_threads(State(state): State<FeatureState>) -> Response {
    let threads: Vec<_> = state
        .jobs
        .list(false)
        .await
        .into_iter()
        .map(|job| json!([job.name, job.alive]))
        .collect();

    (StatusCode::OK, Json(json!(threads))).into_response()
}

fn parse_job_id(raw: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw).map_err(|_| AppError::NotFound(format!("Job {} not found", raw)))
}
