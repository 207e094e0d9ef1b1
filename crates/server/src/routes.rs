use axum::extract::{DefaultBodyLimit, Multipart, Path, State};
use axum::http::StatusCode;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde::Serialize;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use vodserve_core::error::ApiError;
use vodserve_core::types::{JobState, JobSummary};

use crate::error::AppError;
use crate::state::AppState;

/// Uploaded source videos can be large; the axum default (2 MiB) is far
/// too small.
const MAX_UPLOAD_BYTES: usize = 2 * 1024 * 1024 * 1024;

pub fn build_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/version", get(version))
        .route("/jobs", post(create_job).get(list_jobs))
        .route("/jobs/{id}", get(get_job))
        .layer(DefaultBodyLimit::max(MAX_UPLOAD_BYTES))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

// ---------------------------------------------------------------------------
// System
// ---------------------------------------------------------------------------

#[derive(Serialize)]
struct HealthResponse {
    status: String,
}

async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "ok".to_string(),
    })
}

async fn version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}

// ---------------------------------------------------------------------------
// Jobs
// ---------------------------------------------------------------------------

/// Job summary plus the last fully completed lifecycle stage.
#[derive(Serialize)]
struct JobStatusResponse {
    state: JobState,
    #[serde(flatten)]
    job: JobSummary,
}

impl From<JobSummary> for JobStatusResponse {
    fn from(job: JobSummary) -> Self {
        Self {
            state: job.state(),
            job,
        }
    }
}

/// Accept an uploaded video, persist it, and hand the job to the
/// background pipeline. Responds as soon as the video is saved;
/// conversion happens after this returns.
async fn create_job(
    State(state): State<AppState>,
    mut multipart: Multipart,
) -> Result<(StatusCode, Json<JobStatusResponse>), AppError> {
    let mut video: Option<axum::body::Bytes> = None;
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| ApiError::BadRequest(format!("invalid multipart body: {e}")))?
    {
        if field.name() == Some("file") {
            let bytes = field
                .bytes()
                .await
                .map_err(|e| ApiError::BadRequest(format!("failed to read upload: {e}")))?;
            video = Some(bytes);
            break;
        }
    }
    let video = video.ok_or_else(|| ApiError::BadRequest("missing 'file' field".into()))?;
    if video.is_empty() {
        return Err(ApiError::BadRequest("uploaded file is empty".into()).into());
    }

    let job = state.store.create_job().await;
    state.store.save_uploaded_video(job.id, &video).await?;
    state.pool.enqueue(job.id).await?;

    let summary = state
        .store
        .status(job.id)
        .await
        .ok_or_else(|| ApiError::Internal("job vanished during creation".into()))?;
    Ok((StatusCode::CREATED, Json(summary.into())))
}

async fn get_job(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<JobStatusResponse>, AppError> {
    let summary = state
        .store
        .status(id)
        .await
        .ok_or_else(|| ApiError::NotFound(format!("job {id}")))?;
    Ok(Json(summary.into()))
}

async fn list_jobs(State(state): State<AppState>) -> Json<Vec<JobStatusResponse>> {
    Json(
        state
            .store
            .list()
            .await
            .into_iter()
            .map(JobStatusResponse::from)
            .collect(),
    )
}
