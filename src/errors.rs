use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use utoipa::ToSchema;

use crate::cache::CacheError;

/// Standard error response body.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    /// Always `false` for error bodies
    pub success: bool,
    /// Human-readable error message
    pub error: String,
}

/// Failure from an upstream provider call (weather or icon API).
///
/// Clients return these instead of logging; the caller decides what to
/// surface and what to degrade.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ApiError {
    /// Network failure or timeout.
    #[error("transport error: {0}")]
    Transport(String),

    /// Non-2xx status, or an `error` field in the response body.
    #[error("upstream error: {0}")]
    Upstream(String),

    /// Empty or unparsable response body.
    #[error("parse error: {0}")]
    Parse(String),

    /// Missing credentials; raised before any network call.
    #[error("configuration error: {0}")]
    Config(String),

    /// Search returned no results.
    #[error("not found: {0}")]
    NotFound(String),
}

impl From<reqwest::Error> for ApiError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ApiError::Parse(err.to_string())
        } else {
            ApiError::Transport(err.to_string())
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("External service error: {0}")]
    ExternalServiceError(String),

    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Cache error: {0}")]
    Cache(#[from] CacheError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::ExternalServiceError(msg) => (StatusCode::BAD_GATEWAY, msg.clone()),
            AppError::ServiceUnavailable(msg) => (StatusCode::SERVICE_UNAVAILABLE, msg.clone()),
            AppError::Cache(err) => {
                tracing::error!("Cache error: {:?}", err);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal cache error".to_string(),
                )
            }
        };

        (
            status,
            axum::Json(ErrorResponse {
                success: false,
                error: message,
            }),
        )
            .into_response()
    }
}

impl From<ApiError> for AppError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Transport(msg) | ApiError::Upstream(msg) | ApiError::Parse(msg) => {
                AppError::ExternalServiceError(msg)
            }
            ApiError::Config(msg) => AppError::ServiceUnavailable(msg),
            ApiError::NotFound(msg) => AppError::NotFound(msg),
        }
    }
}
