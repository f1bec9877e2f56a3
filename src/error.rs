use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;
use validator::ValidationErrors;

use crate::dao::storage::StoreError;

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// The document store failed to load or to write.
    #[error("storage unavailable: {0}")]
    Unavailable(#[source] StoreError),
    /// A save was refused by the document validator.
    #[error("write rejected: {0}")]
    Rejected(#[source] StoreError),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Operation cannot be performed in the current state.
    #[error("invalid state: {0}")]
    InvalidState(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation exceeded its timeout limit.
    #[error("operation timed out")]
    Timeout,
    /// A background task failed unexpectedly.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<StoreError> for ServiceError {
    fn from(err: StoreError) -> Self {
        match err {
            StoreError::GuildNotFound(id) => ServiceError::NotFound(format!("guild `{id}`")),
            StoreError::InvalidGuildId(_) | StoreError::InvalidPath(_) => {
                ServiceError::InvalidInput(err.to_string())
            }
            StoreError::Shape { .. } => ServiceError::InvalidState(err.to_string()),
            StoreError::Unauthorized(message) => ServiceError::Unauthorized(message),
            StoreError::InvalidState(transition) => {
                ServiceError::InvalidState(transition.to_string())
            }
            StoreError::ValidationRejected { .. } => ServiceError::Rejected(err),
            StoreError::Parse { .. }
            | StoreError::CorruptedStore { .. }
            | StoreError::Failed(_)
            | StoreError::Io { .. } => ServiceError::Unavailable(err),
        }
    }
}

impl From<ValidationErrors> for AppError {
    fn from(err: ValidationErrors) -> Self {
        AppError::BadRequest(format!("validation failed: {}", err))
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Unauthorized access attempt.
    #[error("unauthorized: {0}")]
    Unauthorized(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The payload was understood but refused.
    #[error("unprocessable: {0}")]
    Unprocessable(String),
    /// Service unavailable or degraded.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Unavailable(source) => AppError::ServiceUnavailable(source.to_string()),
            ServiceError::Rejected(source) => AppError::Unprocessable(source.to_string()),
            ServiceError::Unauthorized(message) => AppError::Unauthorized(message),
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::InvalidState(message) => AppError::Conflict(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Timeout => AppError::ServiceUnavailable("operation timed out".into()),
            ServiceError::Internal(message) => AppError::Internal(message),
        }
    }
}

#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> axum::response::Response {
        let status = match &self {
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Unprocessable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };

        let payload = Json(ErrorBody {
            message: self.to_string(),
        });

        (status, payload).into_response()
    }
}

#[cfg(test)]
mod tests {
    use std::{io, path::PathBuf};

    use super::*;
    use crate::dao::storage::Rejection;

    #[test]
    fn store_errors_map_to_http_statuses() {
        let cases = [
            (
                StoreError::GuildNotFound("1".into()),
                StatusCode::NOT_FOUND,
            ),
            (
                StoreError::InvalidGuildId("abc".into()),
                StatusCode::BAD_REQUEST,
            ),
            (
                StoreError::Unauthorized("nope".into()),
                StatusCode::UNAUTHORIZED,
            ),
            (
                StoreError::ValidationRejected {
                    reason: Rejection::TooFewGuilds {
                        actual: 1,
                        minimum: 10,
                    },
                },
                StatusCode::UNPROCESSABLE_ENTITY,
            ),
            (
                StoreError::io(
                    "renaming temp file",
                    PathBuf::from("playerData.json.tmp"),
                    io::Error::other("disk full"),
                ),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
            (
                StoreError::Failed("too small".into()),
                StatusCode::SERVICE_UNAVAILABLE,
            ),
        ];

        for (err, expected) in cases {
            let response = AppError::from(ServiceError::from(err)).into_response();
            assert_eq!(response.status(), expected);
        }
    }
}
