//! Shared error handling for API endpoints.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::backend::BackendError;

/// API error type with automatic response conversion.
///
/// Error bodies use the `{ "detail": ... }` shape throughout, except for
/// `Upstream`, which replays a backend error body verbatim with the
/// backend's own status; this subsystem does not reinterpret business
/// errors.
pub enum ApiError {
    BadRequest(String),
    Unauthorized(String),
    BadGateway(String),
    Upstream(StatusCode, serde_json::Value),
}

impl ApiError {
    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::BadRequest(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn bad_gateway(msg: impl Into<String>) -> Self {
        Self::BadGateway(msg.into())
    }
}

impl From<BackendError> for ApiError {
    fn from(e: BackendError) -> Self {
        match e {
            BackendError::Rejected { status, body } => ApiError::Upstream(status, body),
            BackendError::Transport(e) => {
                error!("Failed to reach backend: {}", e);
                ApiError::bad_gateway("Failed to reach backend")
            }
        }
    }
}

#[derive(Serialize)]
struct ErrorResponse {
    detail: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, detail) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::Unauthorized(msg) => (StatusCode::UNAUTHORIZED, msg),
            ApiError::BadGateway(msg) => (StatusCode::BAD_GATEWAY, msg),
            ApiError::Upstream(status, body) => {
                return (status, Json(body)).into_response();
            }
        };
        (status, Json(ErrorResponse { detail })).into_response()
    }
}
