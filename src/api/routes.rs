//! REST endpoints for creating jobs and polling their status.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::IntoResponse;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::{Deserialize, Serialize};
use tower_http::cors::CorsLayer;
use tracing::info;
use uuid::Uuid;

use super::{ApiError, ApiResult};
use crate::job::model::{Job, TaskOutcome};
use crate::job::{Coordinator, Dispatcher};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub coordinator: Arc<Coordinator>,
    pub dispatcher: Arc<Dispatcher>,
}

/// Build the router for the job API.
pub fn api_routes(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/jobs", post(create_job))
        .route("/api/jobs/{id}", get(get_job))
        .layer(CorsLayer::permissive())
        .with_state(state)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "ok",
        "service": "quadop",
    }))
}

/// Request body for job creation.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateJobRequest {
    pub number_a: f64,
    pub number_b: f64,
    /// Consult the alternate strategy before the deterministic kernel.
    /// The wire key is `useLLM`, not the camelCase `useLlm`.
    #[serde(default, rename = "useLLM")]
    pub use_llm: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateJobResponse {
    job_id: Uuid,
}

/// A job plus its recorded outcomes, as returned to polling clients.
#[derive(Debug, Serialize)]
struct JobView {
    #[serde(flatten)]
    job: Job,
    results: Vec<TaskOutcome>,
}

async fn create_job(
    State(state): State<AppState>,
    body: Result<Json<CreateJobRequest>, JsonRejection>,
) -> ApiResult<impl IntoResponse> {
    let Json(request) = body.map_err(|e| ApiError::BadRequest(format!("Invalid input: {e}")))?;

    let job = state
        .coordinator
        .create_job(request.number_a, request.number_b)
        .await?;
    state.dispatcher.dispatch(&job, request.use_llm);

    info!(job_id = %job.id, use_llm = request.use_llm, "Job accepted");
    Ok((StatusCode::CREATED, Json(CreateJobResponse { job_id: job.id })))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> ApiResult<Json<JobView>> {
    let job_id =
        Uuid::parse_str(&id).map_err(|_| ApiError::BadRequest("Invalid job ID".to_string()))?;

    let job = state.coordinator.store().get_job(job_id).await?;
    let results = state.coordinator.store().list_outcomes(job_id).await?;

    Ok(Json(JobView { job, results }))
}
