/*
 * Responsibility
 * - request-level error type shared by handlers and middleware
 * - IntoResponse (HTTP status + JSON error body)
 * - conversion from service errors that reach the HTTP boundary
 */
use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

use crate::services::metadata::MetadataError;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("invalid request: {0}")]
    InvalidRequest(String),

    #[error("{reason}")]
    Unauthenticated { reason: String },

    #[error("upstream request failed: {0}")]
    Upstream(String),

    #[error("internal server error: {0}")]
    Internal(String),
}

impl AppError {
    pub fn unauthenticated(reason: impl Into<String>) -> Self {
        Self::Unauthenticated {
            reason: reason.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal(message.into())
    }
}

#[derive(Serialize)]
struct ErrorResponseBody {
    error: ErrorBody,
}

#[derive(Serialize)]
struct ErrorBody {
    code: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, code) = match &self {
            AppError::InvalidRequest(_) => (StatusCode::BAD_REQUEST, "BAD_REQUEST"),
            AppError::Unauthenticated { .. } => (StatusCode::UNAUTHORIZED, "UNAUTHENTICATED"),
            AppError::Upstream(_) => (StatusCode::BAD_GATEWAY, "UPSTREAM"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL"),
        };

        let body = ErrorResponseBody {
            error: ErrorBody {
                code,
                message: self.to_string(),
            },
        };

        (status, Json(body)).into_response()
    }
}

impl From<MetadataError> for AppError {
    fn from(e: MetadataError) -> Self {
        match e {
            MetadataError::InvalidHost(_) => AppError::InvalidRequest(e.to_string()),
            MetadataError::InvalidUrl { .. }
            | MetadataError::MissingHost
            | MetadataError::NotConfigured(_) => AppError::Internal(e.to_string()),
            MetadataError::Fetch(_) | MetadataError::Parse(_) => AppError::Upstream(e.to_string()),
        }
    }
}
