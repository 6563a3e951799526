//! API error responses

use axum::http::StatusCode;
use axum::Json;
use serde::Serialize;
use tracing::error;

use crate::error::LaundryError;

/// API error response body
#[derive(Debug, Serialize)]
pub struct ApiError {
    pub error: String,
}

impl ApiError {
    pub fn new(msg: &str) -> Self {
        Self {
            error: msg.to_string(),
        }
    }
}

/// Map a domain error onto an HTTP status and JSON error body
///
/// Internal failures are logged and returned as an opaque 500 so no
/// database detail leaks to clients.
pub fn error_response(err: LaundryError) -> (StatusCode, Json<ApiError>) {
    let status = match &err {
        LaundryError::Validation(_)
        | LaundryError::InsufficientQuota { .. }
        | LaundryError::InvalidTransition { .. } => StatusCode::BAD_REQUEST,
        LaundryError::NotFound(_) => StatusCode::NOT_FOUND,
        LaundryError::Permission(_) => StatusCode::FORBIDDEN,
        LaundryError::Conflict(_) => StatusCode::CONFLICT,
        LaundryError::Io(_) | LaundryError::Config(_) | LaundryError::Database(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };

    if status == StatusCode::INTERNAL_SERVER_ERROR {
        error!("Internal error while handling request: {}", err);
        return (status, Json(ApiError::new("An internal error occurred")));
    }

    (status, Json(ApiError::new(&err.to_string())))
}
