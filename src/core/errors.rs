use std::time::Duration;

use axum::{http::StatusCode, response::IntoResponse, Json};
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    #[error("bad request: {0}")]
    BadRequest(String),
    #[error("not found: {0}")]
    NotFound(String),
    #[error("upstream failure: {0}")]
    BadGateway(String),
    #[error("upstream timeout: {0}")]
    GatewayTimeout(String),
    #[error("internal error: {0}")]
    Internal(String),
}

impl ApiError {
    pub fn internal<E: std::fmt::Display>(err: E) -> Self {
        ApiError::Internal(err.to_string())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> axum::response::Response {
        // Internal details stay in the logs; callers only see a generic message.
        let (status, message) = match &self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            ApiError::BadGateway(_) => (
                StatusCode::BAD_GATEWAY,
                "The assistant could not generate an answer. Please try again.".to_string(),
            ),
            ApiError::GatewayTimeout(_) => (
                StatusCode::GATEWAY_TIMEOUT,
                "The assistant took too long to answer. Please try again.".to_string(),
            ),
            ApiError::Internal(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Something went wrong. Please try again later.".to_string(),
            ),
        };

        if status.is_server_error() {
            tracing::error!(status = %status, error = %self, "Request failed");
        }

        let body = Json(json!({ "error": message }));
        (status, body).into_response()
    }
}

/// Failures that end a pipeline turn.
///
/// Recovered failures (a broken knowledge source, a failed query expansion,
/// a malformed trigger) never surface here; they are logged where they happen.
#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("configuration not found: {0}")]
    ConfigurationNotFound(String),

    #[error("storage failure: {0}")]
    Storage(String),

    #[error("generation failed: {0}")]
    Generation(String),

    #[error("generation timed out after {0:?}")]
    GenerationTimeout(Duration),
}

impl PipelineError {
    pub fn storage<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::Storage(err.to_string())
    }

    pub fn generation<E: std::fmt::Display>(err: E) -> Self {
        PipelineError::Generation(err.to_string())
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::ConfigurationNotFound(msg) => ApiError::NotFound(msg),
            PipelineError::Storage(msg) => ApiError::Internal(msg),
            PipelineError::Generation(msg) => ApiError::BadGateway(msg),
            PipelineError::GenerationTimeout(after) => {
                ApiError::GatewayTimeout(format!("{:?}", after))
            }
        }
    }
}
