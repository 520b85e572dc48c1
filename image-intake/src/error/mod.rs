//! Error types and error handling
//!
//! Every failure that reaches a client is rendered here, as JSON:
//!
//! ```json
//! { "error": "dangerous_file_name", "message": "File name is not allowed" }
//! ```

use crate::storage::Rejection;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Application error type
#[derive(Debug, Error)]
pub enum IntakeError {
    /// Upload refused by the pipeline
    #[error(transparent)]
    Rejected(#[from] Rejection),

    /// No route or file matched (404)
    #[error("Not found")]
    NotFound,

    /// Unexpected server error
    #[error("Server error: {0}")]
    Internal(String),
}

impl IntakeError {
    /// Stable error code
    #[must_use]
    pub const fn code(&self) -> &'static str {
        match self {
            Self::Rejected(rejection) => rejection.code(),
            Self::NotFound => "not_found",
            Self::Internal(_) => "internal_error",
        }
    }

    /// HTTP status for this error
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Rejected(rejection) => rejection.status(),
            Self::NotFound => StatusCode::NOT_FOUND,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// JSON error body
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    /// Stable error code
    pub error: &'static str,
    /// Human-readable message
    pub message: String,
}

impl IntoResponse for IntakeError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match &self {
            Self::Rejected(Rejection::FilesystemFailure(source)) => {
                tracing::error!(error = %source, "Storage failure while handling upload");
                self.to_string()
            }
            Self::Internal(detail) => {
                tracing::error!(error = %detail, "Internal error");
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        let body = ErrorBody {
            error: self.code(),
            message,
        };
        (status, Json(body)).into_response()
    }
}

impl IntoResponse for Rejection {
    fn into_response(self) -> Response {
        IntakeError::from(self).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::StorageError;

    async fn body_json(response: Response) -> serde_json::Value {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_rejection_rendering() {
        let response = IntakeError::from(Rejection::DangerousFileName).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);

        let json = body_json(response).await;
        assert_eq!(json["error"], "dangerous_file_name");
        assert_eq!(json["message"], "File name is not allowed");
    }

    #[tokio::test]
    async fn test_storage_failure_hides_details() {
        let io = std::io::Error::new(std::io::ErrorKind::PermissionDenied, "/srv/public/temp");
        let response = Rejection::FilesystemFailure(StorageError::Io(io)).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["error"], "filesystem_failure");
        assert!(!json["message"].as_str().unwrap().contains("/srv"));
    }

    #[tokio::test]
    async fn test_internal_error_hides_details() {
        let response = IntakeError::Internal("db password leaked".into()).into_response();
        assert_eq!(response.status(), StatusCode::INTERNAL_SERVER_ERROR);

        let json = body_json(response).await;
        assert_eq!(json["message"], "Internal server error");
    }

    #[tokio::test]
    async fn test_not_found() {
        let response = IntakeError::NotFound.into_response();
        assert_eq!(response.status(), StatusCode::NOT_FOUND);
        assert_eq!(body_json(response).await["error"], "not_found");
    }
}
