use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use common::domain::DomainError;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors surfaced by the HTTP API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    /// The risk scorer failed or answered with an error
    #[error("{0}")]
    BadGateway(String),

    #[error("{0}")]
    Internal(String),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Conflict(_) => StatusCode::CONFLICT,
            Self::BadGateway(_) => StatusCode::BAD_GATEWAY,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            Self::BadRequest(_) => "BAD_REQUEST",
            Self::Unauthorized(_) => "UNAUTHORIZED",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::BadGateway(_) => "RISK_SCORING_FAILED",
            Self::Internal(_) => "INTERNAL_ERROR",
        }
    }
}

/// Error response body
#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: &'static str,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            error!(status = %status, error = %self, "request failed");
        }

        let body = ErrorResponse {
            error: self.code(),
            message: self.to_string(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<DomainError> for ApiError {
    fn from(error: DomainError) -> Self {
        match error {
            DomainError::ValidationError(msg) | DomainError::MalformedMessage(msg) => {
                ApiError::BadRequest(msg)
            }

            DomainError::MissingToken => ApiError::Unauthorized("Authentication required".to_string()),

            DomainError::InvalidToken(msg) => {
                ApiError::Unauthorized(format!("Invalid or expired token: {}", msg))
            }

            DomainError::BatchNotFound(batch_id) => {
                ApiError::NotFound(format!("Batch {} not found", batch_id))
            }

            DomainError::NoRecordsFound => {
                ApiError::NotFound("No records found matching the criteria".to_string())
            }

            e @ (DomainError::RecordAlreadyExists { .. } | DomainError::BatchAlreadyExists(_)) => {
                ApiError::Conflict(e.to_string())
            }

            DomainError::RiskScoringError(msg) => ApiError::BadGateway(msg),

            // Store and queue details stay in the logs
            DomainError::RepositoryError(err) => {
                error!(error = %err, "repository error");
                ApiError::Internal("Internal server error".to_string())
            }
        }
    }
}
