use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::llm_client::LlmError;
use crate::store::StoreError;

pub const RATE_LIMIT_NOTICE: &str = "Rate limit exceeded. Please try again later.";
pub const QUOTA_NOTICE: &str = "AI credits depleted. Please add credits.";
const GENERIC_NOTICE: &str = "Failed to process request";

/// Application-level error type.
/// Implements `IntoResponse` so Axum handlers can return `Result<T, AppError>`.
#[derive(Debug, Error)]
pub enum AppError {
    #[error("Unauthenticated")]
    Unauthenticated,

    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Gateway rate limit exceeded")]
    RateLimited,

    #[error("Gateway quota exhausted")]
    QuotaExhausted,

    #[error("Gateway error: {0}")]
    Gateway(String),

    #[error("Invalid model output: {0}")]
    InvalidModelOutput(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    #[error("Configuration error: {0}")]
    Configuration(String),
}

impl From<LlmError> for AppError {
    fn from(err: LlmError) -> Self {
        match err {
            LlmError::RateLimited => AppError::RateLimited,
            LlmError::QuotaExhausted => AppError::QuotaExhausted,
            LlmError::Configuration(msg) => AppError::Configuration(msg),
            other => AppError::Gateway(other.to_string()),
        }
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for AppError {
    fn from(rejection: QueryRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            AppError::Unauthenticated => (
                StatusCode::UNAUTHORIZED,
                "Authentication required".to_string(),
            ),
            AppError::Validation(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg.clone()),
            AppError::RateLimited => (StatusCode::TOO_MANY_REQUESTS, RATE_LIMIT_NOTICE.to_string()),
            AppError::QuotaExhausted => (StatusCode::PAYMENT_REQUIRED, QUOTA_NOTICE.to_string()),
            AppError::Gateway(msg) => {
                tracing::error!("Gateway error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_NOTICE.to_string())
            }
            AppError::InvalidModelOutput(msg) => {
                tracing::error!("Invalid model output: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_NOTICE.to_string())
            }
            AppError::Store(e) => {
                tracing::error!("Store error: {e}");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_NOTICE.to_string())
            }
            AppError::Configuration(msg) => {
                tracing::error!("Configuration error: {msg}");
                (StatusCode::INTERNAL_SERVER_ERROR, GENERIC_NOTICE.to_string())
            }
        };

        (status, Json(json!({ "error": message }))).into_response()
    }
}
