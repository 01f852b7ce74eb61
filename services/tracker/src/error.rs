//! Custom error types for the tracker service

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;
use uuid::Uuid;

use crate::models::session::SessionStatus;

/// Domain errors raised by the session lifecycle engine
#[derive(Error, Debug)]
pub enum SessionError {
    /// No session exists with the requested id
    #[error("session {0} not found")]
    NotFound(Uuid),

    /// The user already has a live-or-paused session
    #[error("user {0} already has an active session")]
    AlreadyActive(Uuid),

    /// The session is in the wrong status for the requested transition
    #[error("cannot {operation} a {status} session")]
    InvalidTransition {
        operation: &'static str,
        status: SessionStatus,
    },

    /// A paused session has no open pause interval. Unreachable through
    /// the engine itself; guards against a corrupted pause ledger.
    #[error("paused session has no open pause interval")]
    MissingOpenInterval,

    /// Rates must be non-negative XP per focused second
    #[error("rates must be non-negative")]
    NegativeRates,

    /// A stored sub-document failed to decode
    #[error("corrupt session record: {0}")]
    Corrupt(String),

    /// Underlying database failure
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Custom error type for the HTTP surface
#[derive(Error, Debug)]
pub enum ApiError {
    /// Bad request with message
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Resource not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// Request conflicts with the session's current state
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Internal server error
    #[error("Internal server error")]
    InternalServerError,
}

impl From<SessionError> for ApiError {
    fn from(err: SessionError) -> Self {
        match err {
            SessionError::NotFound(id) => ApiError::NotFound(format!("session {} not found", id)),
            SessionError::AlreadyActive(user_id) => {
                ApiError::Conflict(format!("user {} already has an active session", user_id))
            }
            SessionError::InvalidTransition { operation, status } => {
                ApiError::Conflict(format!("cannot {} a {} session", operation, status))
            }
            SessionError::NegativeRates => {
                ApiError::BadRequest("rates must be non-negative".to_string())
            }
            other => {
                tracing::error!("Session operation failed: {}", other);
                ApiError::InternalServerError
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            ApiError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            ApiError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            ApiError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            ApiError::InternalServerError => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
            ),
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Type alias for API results
pub type ApiResult<T> = Result<T, ApiError>;
