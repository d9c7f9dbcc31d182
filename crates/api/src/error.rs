use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use protobench_core::error::CoreError;
use protobench_core::store::StoreError;
use protobench_pipeline::PipelineError;
use serde_json::json;

/// Application-level error type for HTTP handlers.
///
/// Wraps the domain, store and pipeline errors and implements
/// [`IntoResponse`] to produce consistent JSON error responses.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error(transparent)]
    Core(#[from] CoreError),

    #[error(transparent)]
    Store(#[from] StoreError),

    /// A benchmark run failed.
    #[error(transparent)]
    Pipeline(#[from] PipelineError),

    /// Request body or query failed field validation.
    #[error("Validation failed: {0}")]
    Validation(#[from] validator::ValidationErrors),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code, message) = match &self {
            // --- CoreError variants ---
            AppError::Core(core) => match core {
                CoreError::InvalidInput(msg) => {
                    (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
                }
                CoreError::NotFound { entity, id } => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("{entity} with id {id} not found"),
                ),
            },

            // --- Store errors ---
            AppError::Store(err) => match err {
                StoreError::Conflict(msg) => (StatusCode::CONFLICT, "CONFLICT", msg.clone()),
                StoreError::RunNotFound(id) => (
                    StatusCode::NOT_FOUND,
                    "NOT_FOUND",
                    format!("run with id {id} not found"),
                ),
                StoreError::Backend(msg) => internal(msg),
            },

            // --- Benchmark failures ---
            AppError::Pipeline(err) => classify_pipeline_error(err),

            // --- HTTP-specific errors ---
            AppError::Validation(errors) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "VALIDATION_ERROR",
                errors.to_string(),
            ),
        };

        let body = json!({
            "error": message,
            "code": code,
        });

        (status, axum::Json(body)).into_response()
    }
}

fn internal(msg: &str) -> (StatusCode, &'static str, String) {
    tracing::error!(error = %msg, "Internal error");
    (
        StatusCode::INTERNAL_SERVER_ERROR,
        "INTERNAL_ERROR",
        "An internal error occurred".to_string(),
    )
}

/// Classify a pipeline error into an HTTP status, error code, and message.
///
/// - Invalid input maps to 400.
/// - A client that failed or produced an unusable artifact maps to 502; the
///   message is passed through since it names the failing binary.
/// - Cancellation (server shutting down) maps to 503.
fn classify_pipeline_error(err: &PipelineError) -> (StatusCode, &'static str, String) {
    match err {
        PipelineError::InvalidInput(msg) => {
            (StatusCode::BAD_REQUEST, "INVALID_INPUT", msg.clone())
        }
        PipelineError::Cancelled => (
            StatusCode::SERVICE_UNAVAILABLE,
            "CANCELLED",
            err.to_string(),
        ),
        PipelineError::ProcessFailure { .. }
        | PipelineError::Spawn { .. }
        | PipelineError::EmptyResult { .. }
        | PipelineError::MalformedResult { .. }
        | PipelineError::ArtifactIo { .. } => {
            tracing::warn!(error = %err, "Benchmark run failed");
            (StatusCode::BAD_GATEWAY, "BENCHMARK_FAILED", err.to_string())
        }
    }
}
