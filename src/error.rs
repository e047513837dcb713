use axum::{Json, http::StatusCode, response::IntoResponse};
use serde::Serialize;
use thiserror::Error;

use crate::{dto::command::CommandError, state::ledger::LedgerError};

/// Errors that can occur in service layer operations.
#[derive(Debug, Error)]
pub enum ServiceError {
    /// Invalid input provided by the client.
    #[error("invalid input: {0}")]
    InvalidInput(String),
    /// Requested resource was not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Operation conflicts with recorded state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// The server is shutting down and no longer accepts work.
    #[error("service unavailable: {0}")]
    Unavailable(String),
}

impl From<LedgerError> for ServiceError {
    fn from(err: LedgerError) -> Self {
        match err {
            LedgerError::NotFound(_) => ServiceError::NotFound(err.to_string()),
            LedgerError::AlreadyExists(_) | LedgerError::AlreadyCompleted(_) => {
                ServiceError::Conflict(err.to_string())
            }
        }
    }
}

impl From<CommandError> for ServiceError {
    fn from(err: CommandError) -> Self {
        ServiceError::InvalidInput(err.to_string())
    }
}

/// Application-level errors that are converted to HTTP responses.
#[derive(Debug, Error)]
pub enum AppError {
    /// Bad request with invalid input.
    #[error("bad request: {0}")]
    BadRequest(String),
    /// Requested resource not found.
    #[error("not found: {0}")]
    NotFound(String),
    /// Conflict with current state.
    #[error("conflict: {0}")]
    Conflict(String),
    /// Service unavailable.
    #[error("service unavailable: {0}")]
    ServiceUnavailable(String),
    /// Internal server error.
    #[error("internal error: {0}")]
    Internal(String),
}

impl From<ServiceError> for AppError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::InvalidInput(message) => AppError::BadRequest(message),
            ServiceError::NotFound(message) => AppError::NotFound(message),
            ServiceError::Conflict(message) => AppError::Conflict(message),
            ServiceError::Unavailable(message) => AppError::ServiceUnavailable(message),
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
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
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
    use super::*;

    #[test]
    fn ledger_errors_map_to_http_statuses() {
        let cases = [
            (LedgerError::AlreadyExists("t1".into()), StatusCode::CONFLICT),
            (LedgerError::AlreadyCompleted("t1".into()), StatusCode::CONFLICT),
            (LedgerError::NotFound("t1".into()), StatusCode::NOT_FOUND),
        ];
        for (err, status) in cases {
            let response = AppError::from(ServiceError::from(err)).into_response();
            assert_eq!(response.status(), status);
        }
    }

    #[test]
    fn invalid_command_is_a_bad_request() {
        let err = CommandError::InvalidCommand("missing direction".into());
        let response = AppError::from(ServiceError::from(err)).into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}
