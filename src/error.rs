use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

/// AppError
///
/// Every failure a handler can report. Each variant maps to exactly one HTTP status
/// and renders as `{"error": "<message>"}`.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum AppError {
    /// Malformed or missing input (400).
    #[error("{0}")]
    Validation(String),
    /// Missing, invalid or expired credentials (401).
    #[error("{0}")]
    Unauthorized(String),
    /// Authenticated, but the role is not allowed (403).
    #[error("forbidden")]
    Forbidden,
    /// No matching resource (404).
    #[error("{0}")]
    NotFound(String),
    /// Uniqueness violation reported by the store (409).
    #[error("{0}")]
    Conflict(String),
    /// Store or codec failure (500). Carries the raw message.
    #[error("{0}")]
    Internal(String),
}

impl AppError {
    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if let AppError::Internal(msg) = &self {
            tracing::error!(error = %msg, "request failed with internal error");
        }
        (status, Json(json!({ "error": self.to_string() }))).into_response()
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        tracing::debug!(error = %rejection, "rejected request body");
        AppError::validation("invalid payload")
    }
}

/// RepoError
///
/// Store failures as seen by the repository layer. Unique-constraint violations are
/// classified from the database's structured error kind so handlers can turn them
/// into conflicts without inspecting message text.
#[derive(Debug, Error)]
pub enum RepoError {
    #[error("unique constraint violated: {0}")]
    UniqueViolation(String),
    #[error("{0}")]
    Database(String),
}

impl From<sqlx::Error> for RepoError {
    fn from(err: sqlx::Error) -> Self {
        if let Some(db_err) = err.as_database_error() {
            if db_err.is_unique_violation() {
                return RepoError::UniqueViolation(
                    db_err.constraint().unwrap_or("unknown").to_string(),
                );
            }
        }
        RepoError::Database(err.to_string())
    }
}

impl From<RepoError> for AppError {
    /// Only the caller knows what a unique violation means for its resource, so the
    /// generic mapping keeps the default conflict wording.
    fn from(err: RepoError) -> Self {
        match err {
            RepoError::UniqueViolation(_) => AppError::Conflict("already exists".to_string()),
            RepoError::Database(msg) => AppError::Internal(msg),
        }
    }
}
