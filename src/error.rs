//! Crate error type and its HTTP mapping.
//!
//! Request-fatal problems (bad round, unparseable CSV, store failures) are
//! errors. Row-level data quality problems inside an upload are not: the
//! pipelines count and skip them.

use axum::{
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;
use thiserror::Error;

use crate::store::StoreError;

pub type QuizResult<T> = std::result::Result<T, QuizError>;

#[derive(Debug, Error)]
pub enum QuizError {
    #[error("All fields are required.")]
    FieldsRequired,

    #[error("Passwords do not match.")]
    PasswordMismatch,

    #[error("Password must be at least {min} character(s).")]
    PasswordTooShort { min: usize },

    #[error("Invalid round '{0}'. Must be 1-4.")]
    InvalidRound(String),

    #[error("Invalid level '{0}'. Must be 1-3.")]
    InvalidLevel(String),

    #[error("At least one CSV file required: low/medium/high or level1/level2/level3.")]
    NoSourceProvided,

    #[error("{0}")]
    Validation(String),

    #[error("Malformed CSV: {0}")]
    MalformedInput(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Store(#[from] StoreError),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl QuizError {
    pub fn code(&self) -> &'static str {
        match self {
            QuizError::FieldsRequired => "FIELDS_REQUIRED",
            QuizError::PasswordMismatch => "PASSWORD_MISMATCH",
            QuizError::PasswordTooShort { .. } => "EMPTY_PASSWORD",
            QuizError::InvalidRound(_) => "INVALID_ROUND",
            QuizError::InvalidLevel(_) => "INVALID_LEVEL",
            QuizError::NoSourceProvided => "NO_SOURCE_PROVIDED",
            QuizError::Validation(_) => "VALIDATION_ERROR",
            QuizError::MalformedInput(_) => "MALFORMED_INPUT",
            QuizError::NotFound(_) => "NOT_FOUND",
            QuizError::Store(_) => "STORE_FAILURE",
            QuizError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            QuizError::InvalidRound(_) => StatusCode::UNPROCESSABLE_ENTITY,
            QuizError::FieldsRequired
            | QuizError::PasswordMismatch
            | QuizError::PasswordTooShort { .. }
            | QuizError::InvalidLevel(_)
            | QuizError::NoSourceProvided
            | QuizError::Validation(_)
            | QuizError::MalformedInput(_) => StatusCode::BAD_REQUEST,
            QuizError::NotFound(_) => StatusCode::NOT_FOUND,
            QuizError::Store(_) | QuizError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// Unreadable or non-JSON request bodies get the same error envelope as everything else.
impl From<JsonRejection> for QuizError {
    fn from(rejection: JsonRejection) -> Self {
        QuizError::Validation(format!("Invalid JSON body: {}", rejection.body_text()))
    }
}

impl IntoResponse for QuizError {
    fn into_response(self) -> Response {
        let status = self.status();
        // Store messages are surfaced on purpose; internal ones are not.
        let message = match &self {
            QuizError::Internal(_) => "Server error".to_string(),
            other => other.to_string(),
        };
        if status.is_server_error() {
            tracing::error!(target: "quiz_backend", code = self.code(), error = %self, "Request failed");
        }

        let body = Json(json!({
            "error": self.code(),
            "message": message,
        }));
        (status, body).into_response()
    }
}
