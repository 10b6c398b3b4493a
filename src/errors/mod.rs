//! Error handling module for the Nice Questions backend.
//!
//! Provides centralized error types with mapping to HTTP status codes and response bodies.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::pipeline::{QuotaGate, SubmitError};

/// Error codes as constants to avoid stringly-typed errors.
pub mod codes {
    pub const NOT_FOUND: &str = "NOT_FOUND";
    pub const VALIDATION_ERROR: &str = "VALIDATION_ERROR";
    pub const RATE_LIMITED: &str = "RATE_LIMITED";
    pub const REJECTED: &str = "REJECTED";
    pub const UPSTREAM_ERROR: &str = "UPSTREAM_ERROR";
    pub const DATABASE_ERROR: &str = "DATABASE_ERROR";
    pub const INTERNAL_ERROR: &str = "INTERNAL_ERROR";
}

/// Message returned in place of any internal failure detail.
const GENERIC_FAILURE: &str = "Internal server error";

/// Application error type.
#[derive(Debug, Error)]
pub enum AppError {
    /// Resource not found
    #[error("{0}")]
    NotFound(String),
    /// Malformed user input
    #[error("{0}")]
    Validation(String),
    /// A daily cap was reached
    #[error("{0}")]
    RateLimited(String),
    /// Content moderation said no; carries the human-readable reason
    #[error("rejected: {0}")]
    Rejected(String),
    /// An external service failed; the message is safe to show
    #[error("{0}")]
    Upstream(String),
    /// Database error
    #[error("database error: {0}")]
    Database(String),
    /// Internal server error
    #[error("internal error: {0}")]
    Internal(String),
}

impl AppError {
    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::RateLimited(_) => StatusCode::TOO_MANY_REQUESTS,
            AppError::Rejected(_) => StatusCode::BAD_REQUEST,
            AppError::Upstream(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => codes::NOT_FOUND,
            AppError::Validation(_) => codes::VALIDATION_ERROR,
            AppError::RateLimited(_) => codes::RATE_LIMITED,
            AppError::Rejected(_) => codes::REJECTED,
            AppError::Upstream(_) => codes::UPSTREAM_ERROR,
            AppError::Database(_) => codes::DATABASE_ERROR,
            AppError::Internal(_) => codes::INTERNAL_ERROR,
        }
    }

    /// The message shown to the caller. Database and internal detail stays in the logs.
    pub fn public_message(&self) -> String {
        match self {
            AppError::NotFound(msg)
            | AppError::Validation(msg)
            | AppError::RateLimited(msg)
            | AppError::Rejected(msg)
            | AppError::Upstream(msg) => msg.clone(),
            AppError::Database(_) | AppError::Internal(_) => GENERIC_FAILURE.to_string(),
        }
    }
}

impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        tracing::error!("Database error: {:?}", err);
        AppError::Database(err.to_string())
    }
}

impl From<SubmitError> for AppError {
    fn from(err: SubmitError) -> Self {
        match err {
            SubmitError::Validation(msg) => AppError::Validation(msg),
            SubmitError::RateLimited(QuotaGate::Attempts) => AppError::RateLimited(
                "Daily submission limit reached. Try again tomorrow!".to_string(),
            ),
            SubmitError::RateLimited(QuotaGate::Accepted) => AppError::RateLimited(
                "Daily acceptance limit reached. Try again tomorrow!".to_string(),
            ),
            SubmitError::Rejected(reason) => AppError::Rejected(reason),
            SubmitError::Upstream { stage, source } => {
                tracing::error!(?stage, error = %source, "Submission failed upstream");
                AppError::Upstream("Failed to submit question".to_string())
            }
        }
    }
}

/// Error response body.
///
/// Rejections carry `rejected`/`reason`; everything else carries `error`.
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorResponse {
    pub success: bool,
    pub code: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub rejected: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

impl ErrorResponse {
    pub fn new(error: &AppError) -> Self {
        let (message, rejected, reason) = match error {
            AppError::Rejected(reason) => (None, Some(true), Some(reason.clone())),
            other => (Some(other.public_message()), None, None),
        };

        Self {
            success: false,
            code: error.error_code().to_string(),
            error: message,
            rejected,
            reason,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse::new(&self);
        (status, Json(body)).into_response()
    }
}
