//! HTTP error mapping.

use axum::extract::rejection::{JsonRejection, QueryRejection};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use appoint_core::{AppointError, ErrorKind};

#[derive(Debug, Error)]
pub enum ApiError {
    /// Malformed body or query, or a field outside its allowed length.
    #[error("{0}")]
    Validation(String),

    #[error("no active replacement candidate in team")]
    NoCandidate,

    #[error(transparent)]
    Appoint(#[from] AppointError),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::NoCandidate => StatusCode::CONFLICT,
            // Duplicate team names have always been reported as a bad request
            Self::Appoint(AppointError::TeamAlreadyExists(_)) => StatusCode::BAD_REQUEST,
            Self::Appoint(e) => {
                let kind = e.kind();
                if kind.is_conflict() {
                    StatusCode::CONFLICT
                } else if kind == ErrorKind::NotFound {
                    StatusCode::NOT_FOUND
                } else {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
            }
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::Validation(_) => "VALIDATION",
            Self::NoCandidate => "NO_CANDIDATE",
            Self::Appoint(e) => e.code(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Debug, Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();

        // Storage details stay in the log
        let message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            error!("Request failed: {}", self);
            "internal error".to_string()
        } else {
            self.to_string()
        };

        let body = ErrorResponse {
            error: ErrorDetail {
                code: self.error_code().to_string(),
                message,
            },
        };
        (status, Json(body)).into_response()
    }
}

impl From<JsonRejection> for ApiError {
    fn from(rejection: JsonRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

impl From<QueryRejection> for ApiError {
    fn from(rejection: QueryRejection) -> Self {
        Self::Validation(rejection.body_text())
    }
}

pub type ApiResult<T> = Result<T, ApiError>;

/// Reject an empty value or one longer than `max_chars` characters.
pub fn validate_field(field: &str, value: &str, max_chars: usize) -> ApiResult<()> {
    if value.trim().is_empty() {
        return Err(ApiError::Validation(format!("{} must not be empty", field)));
    }
    let len = value.chars().count();
    if len > max_chars {
        return Err(ApiError::Validation(format!(
            "{} is {} characters long, maximum is {}",
            field, len, max_chars
        )));
    }
    Ok(())
}
