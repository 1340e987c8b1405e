//! HTTP error responses

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use code_executor_core::ExecutorError;
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ApiError {
    /// Submission rejected before execution
    #[error("{0}")]
    BadRequest(String),

    /// The service itself failed
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    #[must_use]
    pub const fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
}

impl From<ExecutorError> for ApiError {
    fn from(err: ExecutorError) -> Self {
        match err {
            ExecutorError::Validation(e) => Self::BadRequest(e.to_string()),
            other => Self::Internal(other.to_string()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match &self {
            Self::BadRequest(msg) => tracing::debug!(error = %msg, "request rejected"),
            Self::Internal(msg) => tracing::error!(error = %msg, "execution failed"),
        }
        (
            status,
            Json(ErrorBody {
                error: self.to_string(),
            }),
        )
            .into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use code_executor_core::ValidationError;

    #[test]
    fn validation_errors_are_client_errors() {
        let err = ApiError::from(ExecutorError::Validation(ValidationError::MissingCode));
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(err.to_string(), "Code is required");
    }

    #[test]
    fn everything_else_is_internal() {
        let io = std::io::Error::new(std::io::ErrorKind::NotFound, "python3");
        let err = ApiError::from(ExecutorError::Spawn(io));
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(err.to_string(), "failed to spawn worker: python3");
    }
}
