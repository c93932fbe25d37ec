use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
};
use thiserror::Error;

use crate::repository::StoreError;

/// ApiError
///
/// Every failure a handler or middleware can surface to a client. The `Display` text is
/// the exact body sent back, so variants only ever carry caller-safe messages; storage
/// and crypto details are logged where they occur and replaced by a generic message.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ApiError {
    /// Malformed or missing input (400).
    #[error("{0}")]
    InvalidInput(String),
    /// Bad credentials, or a missing, invalid, expired or forged token (401).
    #[error("{0}")]
    Unauthorized(String),
    /// Valid identity without a permitted role (403).
    #[error("{0}")]
    Forbidden(String),
    #[error("{0}")]
    NotFound(String),
    /// Duplicate account or role assignment (409).
    #[error("{0}")]
    Conflict(String),
    /// Store or infrastructure failure (500). The cause is logged, not returned.
    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        ApiError::InvalidInput(message.into())
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        ApiError::Unauthorized(message.into())
    }

    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden(message.into())
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        ApiError::NotFound(message.into())
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        ApiError::Conflict(message.into())
    }

    pub fn internal(message: impl Into<String>) -> Self {
        ApiError::Internal(message.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::InvalidInput(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status(), self.to_string()).into_response()
    }
}

/// Logs a store failure with its cause and turns it into a generic 500 carrying only
/// `message`.
pub fn store_failure(message: &str, err: StoreError) -> ApiError {
    tracing::error!(error = %err, "{message}");
    ApiError::internal(message)
}
