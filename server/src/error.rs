//! Error types for the todo service and their HTTP mapping.
//!
//! # Design
//! `TodoError` is what the repository and service return. It is kept free of
//! HTTP concerns; the handler converts it into `ApiError`, which carries the
//! status code and renders the `{success:false, message}` envelope. Storage
//! failures are logged where they happen, so the envelope only ever carries a
//! generic message for them.

use axum::{
    extract::rejection::{JsonRejection, QueryRejection},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Errors produced by the repository and service layers.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum TodoError {
    /// No single record matched the given id.
    #[error("todo not found: {0}")]
    NotFound(String),

    /// A required input field is missing or malformed.
    #[error("validation failed: {0}")]
    Validation(String),

    /// The underlying store failed (connectivity, query, decode, timeout).
    #[error("storage failure: {0}")]
    Storage(String),
}

/// JSON body for every failed request.
#[derive(Debug, Serialize)]
struct ErrorBody {
    success: bool,
    message: String,
}

/// An HTTP-facing error: status code plus the message for the envelope.
#[derive(Debug)]
pub struct ApiError {
    pub status: StatusCode,
    pub message: String,
}

impl ApiError {
    pub fn new(status: StatusCode, message: impl Into<String>) -> Self {
        Self {
            status,
            message: message.into(),
        }
    }

    pub fn bad_request(message: impl Into<String>) -> Self {
        Self::new(StatusCode::BAD_REQUEST, message)
    }

    pub fn internal() -> Self {
        Self::new(StatusCode::INTERNAL_SERVER_ERROR, "internal server error")
    }
}

impl From<TodoError> for ApiError {
    fn from(error: TodoError) -> Self {
        match error {
            TodoError::NotFound(_) => Self::new(StatusCode::NOT_FOUND, "todo not found"),
            TodoError::Validation(message) => Self::bad_request(message),
            TodoError::Storage(_) => Self::internal(),
        }
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::new(rejection.status(), rejection.body_text())
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = ErrorBody {
            success: false,
            message: self.message,
        };
        (self.status, Json(body)).into_response()
    }
}
