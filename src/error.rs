//! Crate-wide error envelope.
//! Mission: Map every failure path to the JSON error contract callers see.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::error;

/// The machine-readable error codes the HTTP boundary ever returns.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    InvalidInput,
    Unauthorized,
    NotFound,
    Conflict,
    Internal,
}

impl ErrorCode {
    fn status(self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput => StatusCode::BAD_REQUEST,
            ErrorCode::Unauthorized => StatusCode::UNAUTHORIZED,
            ErrorCode::NotFound => StatusCode::NOT_FOUND,
            ErrorCode::Conflict => StatusCode::CONFLICT,
            ErrorCode::Internal => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

/// An application error carrying a safe user-facing message and the
/// original cause (logged, never serialized back to the caller).
pub struct AppError {
    code: ErrorCode,
    message: String,
    cause: Option<anyhow::Error>,
}

impl AppError {
    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self { code: ErrorCode::InvalidInput, message: message.into(), cause: None }
    }

    pub fn unauthorized(message: impl Into<String>) -> Self {
        Self { code: ErrorCode::Unauthorized, message: message.into(), cause: None }
    }

    pub fn not_found(message: impl Into<String>) -> Self {
        Self { code: ErrorCode::NotFound, message: message.into(), cause: None }
    }

    pub fn conflict(message: impl Into<String>) -> Self {
        Self { code: ErrorCode::Conflict, message: message.into(), cause: None }
    }

    pub fn internal(cause: anyhow::Error) -> Self {
        Self {
            code: ErrorCode::Internal,
            message: "internal server error".to_string(),
            cause: Some(cause),
        }
    }

    pub fn code(&self) -> ErrorCode {
        self.code
    }
}

impl std::fmt::Debug for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppError")
            .field("code", &self.code)
            .field("message", &self.message)
            .finish()
    }
}

impl std::fmt::Display for AppError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl std::error::Error for AppError {}

/// Any internal failure (DB, cache, bus, storage) surfaces as `INTERNAL`
/// unless the caller already classified it more specifically.
impl From<anyhow::Error> for AppError {
    fn from(cause: anyhow::Error) -> Self {
        AppError::internal(cause)
    }
}

impl From<sqlx::Error> for AppError {
    fn from(cause: sqlx::Error) -> Self {
        if matches!(cause, sqlx::Error::RowNotFound) {
            AppError::not_found("resource not found")
        } else {
            AppError::internal(anyhow::Error::new(cause))
        }
    }
}

/// `NOT_FOUND` maps directly; `ACCESS_DENIED` is a storage misconfiguration
/// from the caller's point of view, not a caller-facing 403, so it surfaces
/// as `INTERNAL` like any other unexpected storage failure.
impl From<crate::storage::StorageError> for AppError {
    fn from(cause: crate::storage::StorageError) -> Self {
        match cause {
            crate::storage::StorageError::NotFound(key) => AppError::not_found(format!("object not found: {key}")),
            crate::storage::StorageError::AccessDenied(key) => {
                AppError::internal(anyhow::anyhow!("access denied to object: {key}"))
            }
            crate::storage::StorageError::Other(err) => AppError::internal(err),
        }
    }
}

#[derive(Serialize)]
struct ErrorEnvelope<'a> {
    error_code: ErrorCode,
    message: &'a str,
    request_id: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.code.status();
        let request_id = crate::middleware::logging::current_request_id();

        if status.is_server_error() {
            error!(
                error_code = ?self.code,
                request_id = %request_id,
                cause = ?self.cause,
                "request failed with internal error"
            );
        }

        let body = ErrorEnvelope {
            error_code: self.code,
            message: &self.message,
            request_id,
        };

        (status, Json(body)).into_response()
    }
}

pub type AppResult<T> = Result<T, AppError>;
