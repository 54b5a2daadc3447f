//! Shared error types for the broker.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Errors surfaced by the request correlator (C6).
#[derive(Debug, Error, Clone)]
pub enum CorrelatorError {
    #[error("timed out waiting for browser response")]
    Timeout,
    #[error("hub is closing")]
    HubClosing,
    #[error("{0}")]
    JsException(String),
}

/// Top-level error type for HTTP handlers (C7).
///
/// Mirrors the status-code taxonomy in spec §7: 400 for a missing/invalid
/// field, 404 for an unknown resource, 500 for handler failures, 503 when a
/// maintenance handler isn't wired up.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    BadRequest(String),
    #[error("{0}")]
    NotFound(String),
    #[error("{0}")]
    Internal(String),
    #[error("{0}")]
    Unavailable(String),
}

impl From<CorrelatorError> for AppError {
    fn from(e: CorrelatorError) -> Self {
        AppError::Internal(e.to_string())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Internal(msg) => (StatusCode::INTERNAL_SERVER_ERROR, msg),
            AppError::Unavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg),
        };
        (status, message).into_response()
    }
}
