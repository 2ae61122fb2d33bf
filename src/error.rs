use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{error, warn};

/// Every failure a service operation can surface to the caller.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Referenced user, item or booking is absent.
    #[error("{0}")]
    NotFound(String),
    /// The actor lacks the relation the operation requires.
    #[error("{0}")]
    Forbidden(String),
    /// State-machine or business-rule violation.
    #[error("{0}")]
    Conflict(String),
    /// Malformed stored record; never expected in practice.
    #[error("{0}")]
    InvalidState(String),
    /// Request rejected at the transport boundary.
    #[error("{0}")]
    Validation(String),
    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

pub type AppResult<T> = Result<T, AppError>;

impl AppError {
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::NotFound(_) => "not_found",
            AppError::Forbidden(_) => "forbidden",
            AppError::Conflict(_) => "conflict",
            AppError::InvalidState(_) => "invalid_state",
            AppError::Validation(_) => "validation",
            AppError::Storage(_) => "storage",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::InvalidState(_) | AppError::Storage(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: &'static str,
    message: String,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        if status.is_server_error() {
            error!(kind = self.kind(), error = %self, "request failed");
        } else {
            warn!(kind = self.kind(), error = %self, "request rejected");
        }
        let body = ErrorBody {
            error: self.kind(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn maps_kinds_to_status_codes() {
        assert_eq!(AppError::NotFound("x".into()).status(), StatusCode::NOT_FOUND);
        assert_eq!(AppError::Forbidden("x".into()).status(), StatusCode::FORBIDDEN);
        assert_eq!(AppError::Conflict("x".into()).status(), StatusCode::CONFLICT);
        assert_eq!(AppError::Validation("x".into()).status(), StatusCode::BAD_REQUEST);
        assert_eq!(
            AppError::InvalidState("x".into()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Storage(anyhow::anyhow!("db down")).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn storage_error_keeps_source_message() {
        let err: AppError = anyhow::anyhow!("connection reset").into();
        assert_eq!(err.kind(), "storage");
        assert_eq!(err.to_string(), "connection reset");
    }
}
