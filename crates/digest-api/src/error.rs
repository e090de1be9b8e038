//! API error types.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use digest_persistence::PersistenceError;
use digest_pipeline::PipelineError;
use serde_json::json;
use thiserror::Error;

/// Result type for API operations.
pub type Result<T> = std::result::Result<T, ApiError>;

/// API error type for consistent error responses.
#[derive(Debug, Error)]
pub enum ApiError {
    /// Resource not found.
    #[error("not found: {0}")]
    NotFound(String),

    /// Bad request - invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),

    /// Missing or wrong admin token.
    #[error("unauthorized: {0}")]
    Unauthorized(String),

    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),

    /// Service unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
}

impl ApiError {
    /// Returns the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(json!({
            "error": self.to_string()
        }));
        (status, body).into_response()
    }
}

impl From<PipelineError> for ApiError {
    fn from(err: PipelineError) -> Self {
        match err {
            PipelineError::InvalidRequest(msg) => ApiError::BadRequest(msg),
            PipelineError::NoMessages => ApiError::NotFound("no messages in period".to_string()),
            PipelineError::NotFound(key) => ApiError::NotFound(format!("artifact {}", key)),
            PipelineError::Configuration(msg) => ApiError::ServiceUnavailable(msg),
            PipelineError::Storage(PersistenceError::InvalidKey(key)) => {
                ApiError::BadRequest(format!("invalid artifact key: {}", key))
            }
            PipelineError::Storage(PersistenceError::Json(e)) => {
                ApiError::BadRequest(format!("artifact is not a message array: {}", e))
            }
            _ => ApiError::Internal(err.to_string()),
        }
    }
}

impl From<digest_core::CoreError> for ApiError {
    fn from(err: digest_core::CoreError) -> Self {
        ApiError::Internal(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_error_status_codes() {
        assert_eq!(
            ApiError::NotFound("test".into()).status_code(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::BadRequest("test".into()).status_code(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            ApiError::Unauthorized("test".into()).status_code(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            ApiError::ServiceUnavailable("test".into()).status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
    }

    #[test]
    fn test_pipeline_error_mapping() {
        let cases = [
            (PipelineError::InvalidRequest("x".into()), StatusCode::BAD_REQUEST),
            (PipelineError::NoMessages, StatusCode::NOT_FOUND),
            (PipelineError::Configuration("key".into()), StatusCode::SERVICE_UNAVAILABLE),
            (PipelineError::Scrape("down".into()), StatusCode::INTERNAL_SERVER_ERROR),
            (
                PipelineError::Storage(PersistenceError::InvalidKey("../x".into())),
                StatusCode::BAD_REQUEST,
            ),
        ];
        for (err, status) in cases {
            assert_eq!(ApiError::from(err).status_code(), status);
        }
    }
}
