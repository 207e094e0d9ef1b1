use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use vodserve_core::error::{ApiError, ErrorEnvelope};
use vodserve_jobs::JobError;

/// Newtype wrapper so we can implement `IntoResponse` in this crate.
pub struct AppError(pub ApiError);

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.status_code())
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        let envelope = ErrorEnvelope::from(&self.0);
        (status, Json(envelope)).into_response()
    }
}

impl From<ApiError> for AppError {
    fn from(e: ApiError) -> Self {
        Self(e)
    }
}

impl From<JobError> for AppError {
    fn from(e: JobError) -> Self {
        let api = match &e {
            JobError::NotFound(id) => ApiError::NotFound(format!("job {id}")),
            JobError::InvalidState(msg) => ApiError::Conflict(msg.clone()),
            _ => ApiError::Internal(e.to_string()),
        };
        Self(api)
    }
}
