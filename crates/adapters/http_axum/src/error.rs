//! HTTP error response mapping.

use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use quill_domain::error::QuillError;

/// JSON error body returned by API endpoints.
#[derive(Serialize)]
struct ErrorBody {
    error: String,
}

/// Maps [`QuillError`] to an HTTP response with appropriate status code.
#[derive(Debug)]
pub struct ApiError(QuillError);

impl From<QuillError> for ApiError {
    fn from(err: QuillError) -> Self {
        Self(err)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match &self.0 {
            QuillError::Validation(err) => (StatusCode::BAD_REQUEST, err.to_string()),
            QuillError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string()),
            QuillError::Like(err) => (StatusCode::CONFLICT, err.to_string()),
            QuillError::Storage(err) => {
                tracing::error!(error = %err, "storage error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
            QuillError::Bus(err) => {
                tracing::error!(error = %err, "message bus error");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "internal server error".to_string(),
                )
            }
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
