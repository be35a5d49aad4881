// src/error.rs

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use std::fmt;
use thiserror::Error;

/// Domain errors raised by the exam lifecycle.
///
/// The messages of `Invalidated` and `TimeOver` are matched by the browser
/// client, keep the `invalidated` / `time over` wording stable.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ExamError {
    #[error("exam link not found")]
    NotFound,

    #[error("exam link expired")]
    Expired,

    #[error("time over")]
    TimeOver,

    #[error("exam already started")]
    AlreadyStarted,

    #[error("exam already submitted")]
    AlreadySubmitted,

    #[error("exam not started")]
    NotStarted,

    #[error("exam invalidated")]
    Invalidated,

    #[error("question bank unavailable")]
    NoQuestions,

    #[error("{0}")]
    Validation(String),

    #[error("storage error: {0}")]
    Storage(String),
}

impl From<sqlx::Error> for ExamError {
    fn from(err: sqlx::Error) -> Self {
        ExamError::Storage(err.to_string())
    }
}

/// Global Application Error Enum.
/// Centralizes error handling and mapping to HTTP responses.
#[derive(Debug)]
pub enum AppError {
    // 500 Internal Server Error
    InternalServerError(String),

    // 400 Bad Request
    BadRequest(String),

    // 401 Unauthorized
    AuthError(String),

    // 404 Not Found
    NotFound(String),

    // 409 Conflict (re-start, re-submit)
    Conflict(String),

    // 410 Gone (expired link on read endpoints)
    Gone(String),

    // 503 Service Unavailable (no question bank loaded)
    ServiceUnavailable(String),
}

impl AppError {
    /// Maps an expiry to 410 instead of 400. Used by read endpoints.
    pub fn gone_if_expired(err: ExamError) -> Self {
        match err {
            ExamError::Expired => AppError::Gone(err.to_string()),
            other => other.into(),
        }
    }
}

impl fmt::Display for AppError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

impl std::error::Error for AppError {}

/// Implements `IntoResponse` for `AppError`.
/// Converts the error into a JSON response with appropriate HTTP status code.
impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::InternalServerError(msg) => {
                tracing::error!("Internal Server Error: {}", msg);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Internal Server Error".to_string(),
                )
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::AuthError(msg) => (StatusCode::UNAUTHORIZED, msg),
            AppError::NotFound(msg) => (StatusCode::NOT_FOUND, msg),
            AppError::Conflict(msg) => (StatusCode::CONFLICT, msg),
            AppError::Gone(msg) => (StatusCode::GONE, msg),
            AppError::ServiceUnavailable(msg) => {
                tracing::warn!("Service unavailable: {}", msg);
                (StatusCode::SERVICE_UNAVAILABLE, msg)
            }
        };
        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<ExamError> for AppError {
    fn from(err: ExamError) -> Self {
        match err {
            ExamError::NotFound => AppError::NotFound(err.to_string()),
            ExamError::AlreadyStarted | ExamError::AlreadySubmitted => {
                AppError::Conflict(err.to_string())
            }
            ExamError::Expired
            | ExamError::TimeOver
            | ExamError::NotStarted
            | ExamError::Invalidated
            | ExamError::Validation(_) => AppError::BadRequest(err.to_string()),
            ExamError::NoQuestions => AppError::ServiceUnavailable(err.to_string()),
            ExamError::Storage(msg) => AppError::InternalServerError(msg),
        }
    }
}

/// Converts `sqlx::Error` into `AppError::InternalServerError`.
/// Allows using `?` operator on database queries.
impl From<sqlx::Error> for AppError {
    fn from(err: sqlx::Error) -> Self {
        AppError::InternalServerError(err.to_string())
    }
}

/// Malformed or mistyped JSON bodies are a client error, never 422/500.
impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::BadRequest(rejection.body_text())
    }
}
