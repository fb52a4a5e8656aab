//! API error mapping

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use lodge_store::StoreError;
use lodge_types::UpdateError;
use serde_json::json;

/// Everything a handler can fail with, mapped onto transport status codes:
/// absent resources are 404, bad input is 400, backend faults are 500.
#[derive(Debug)]
pub enum ApiError {
    /// Request body was not a JSON object.
    NotJson,
    /// A required creation field was absent.
    MissingField(&'static str),
    Store(StoreError),
}

impl From<StoreError> for ApiError {
    fn from(e: StoreError) -> Self {
        ApiError::Store(e)
    }
}

impl From<UpdateError> for ApiError {
    fn from(e: UpdateError) -> Self {
        ApiError::Store(StoreError::from(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            ApiError::NotJson => (StatusCode::BAD_REQUEST, "Not a JSON".to_string()),
            ApiError::MissingField(field) => (StatusCode::BAD_REQUEST, format!("Missing {field}")),
            ApiError::Store(StoreError::NotFound { .. }) => {
                (StatusCode::NOT_FOUND, "Not found".to_string())
            }
            ApiError::Store(StoreError::Validation(message)) => (StatusCode::BAD_REQUEST, message),
            ApiError::Store(e) if e.is_constraint_violation() => {
                // A write that referenced a missing parent slipped past the
                // resolver's existence check; still the caller's error.
                (StatusCode::BAD_REQUEST, e.to_string())
            }
            ApiError::Store(e) => {
                tracing::error!("storage failure: {e}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal server error".to_string(),
                )
            }
        };
        (status, Json(json!({ "error": message }))).into_response()
    }
}
