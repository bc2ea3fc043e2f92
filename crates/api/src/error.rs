use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde_json::json;
use stride_core::error::CoreError;
use stride_engine::{EngineError, SourceError};

/// Application-level error type for HTTP handlers.
///
/// Wraps [`CoreError`] and [`EngineError`] and adds HTTP-specific variants.
/// Implements [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// A domain-level error from `stride_core`.
    #[error(transparent)]
    Core(#[from] CoreError),

    /// A leaderboard that could be served neither from cache nor from source.
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The authoritative store rejected or could not take a write.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// A bad request with a human-readable message.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// An internal error with a human-readable message.
    #[error("Internal error: {0}")]
    InternalError(String),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            AppError::Core(core) => classify_core_error(core),
            AppError::Engine(EngineError::Core(core)) => classify_core_error(core),
            AppError::Engine(EngineError::Source(source)) => classify_source_error(source),

            AppError::ServiceUnavailable(msg) => {
                tracing::warn!(error = %msg, "Source of truth unavailable");
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "SERVICE_UNAVAILABLE",
                    "The service is temporarily unavailable".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, "BAD_REQUEST", msg.clone()),
            AppError::InternalError(msg) => {
                tracing::error!(error = %msg, "Internal error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "INTERNAL_ERROR",
                    "An internal error occurred".to_string(),
                )
            }
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn classify_core_error(core: &CoreError) -> (StatusCode, &'static str, String) {
    match core {
        CoreError::NotFound { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        CoreError::Validation(msg) => (StatusCode::BAD_REQUEST, "VALIDATION_ERROR", msg.clone()),
        CoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
        CoreError::Internal(msg) => {
            tracing::error!(error = %msg, "Internal core error");
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                "INTERNAL_ERROR",
                "An internal error occurred".to_string(),
            )
        }
    }
}

/// A failed leaderboard read is never reported as an empty leaderboard.
fn classify_source_error(source: &SourceError) -> (StatusCode, &'static str, String) {
    match source {
        SourceError::Missing { entity, id } => (
            StatusCode::NOT_FOUND,
            "NOT_FOUND",
            format!("{entity} with id {id} not found"),
        ),
        SourceError::Conflict { .. } => (StatusCode::CONFLICT, "CONFLICT", source.to_string()),
        SourceError::Query(err) => {
            tracing::error!(error = %err, "Leaderboard unavailable");
            (
                StatusCode::SERVICE_UNAVAILABLE,
                "LEADERBOARD_UNAVAILABLE",
                "Leaderboard is temporarily unavailable".to_string(),
            )
        }
    }
}
