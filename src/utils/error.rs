use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use utoipa::ToSchema;

use crate::services::kpi_compiler::TemplateError;

pub type ApiResult<T> = Result<T, ApiError>;

const GENERIC_INTERNAL_MESSAGE: &str = "Unexpected error happened, please contact system admin.";

/// Error taxonomy shared by every handler and service.
///
/// Each variant maps to exactly one HTTP status in [`ApiError::status_code`].
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("{0}")]
    Validation(String),

    /// Aggregated schema violations, reported as one `"; "` joined message
    #[error("{}", .0.join("; "))]
    MultipleValidation(Vec<String>),

    #[error("{0}")]
    UnsupportedFormat(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    /// Stored data that cannot be compiled (corrupt variation tree, broken template)
    #[error("{0}")]
    InvalidData(String),

    #[error("{0}")]
    Internal(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),
}

/// Wire format of every error response
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorResponse {
    pub code: u16,
    pub message: String,
}

impl ApiError {
    pub fn validation_error(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn multiple_validation(messages: Vec<String>) -> Self {
        Self::MultipleValidation(messages)
    }

    pub fn unsupported_format(msg: impl Into<String>) -> Self {
        Self::UnsupportedFormat(msg.into())
    }

    pub fn unauthorized(msg: impl Into<String>) -> Self {
        Self::Unauthorized(msg.into())
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn forbidden(msg: impl Into<String>) -> Self {
        Self::Forbidden(msg.into())
    }

    pub fn invalid_data(msg: impl Into<String>) -> Self {
        Self::InvalidData(msg.into())
    }

    pub fn internal_error(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) | Self::MultipleValidation(_) | Self::UnsupportedFormat(_) => {
                StatusCode::BAD_REQUEST
            },
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Forbidden(_) => StatusCode::CONFLICT,
            Self::InvalidData(_) | Self::Internal(_) | Self::Database(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            },
        }
    }

    /// Message exposed to the client. Database failures never leak driver details.
    pub fn public_message(&self) -> String {
        match self {
            Self::Database(_) => GENERIC_INTERNAL_MESSAGE.to_string(),
            other => other.to_string(),
        }
    }
}

impl From<TemplateError> for ApiError {
    fn from(err: TemplateError) -> Self {
        Self::InvalidData(format!("Query template error: {}", err))
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidData(format!("Malformed JSON document: {}", err))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed with {}: {:?}", status.as_u16(), self);
        } else {
            tracing::warn!("Request rejected with {}: {}", status.as_u16(), self);
        }

        let body = ErrorResponse { code: status.as_u16(), message: self.public_message() };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn multiple_validation_joins_messages() {
        let err = ApiError::multiple_validation(vec!["a is bad".into(), "b is bad".into()]);
        assert_eq!(err.to_string(), "a is bad; b is bad");
        assert_eq!(err.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn forbidden_maps_to_conflict() {
        assert_eq!(ApiError::forbidden("exists").status_code(), StatusCode::CONFLICT);
    }

    #[test]
    fn database_error_hides_driver_message() {
        let err = ApiError::from(sqlx::Error::RowNotFound);
        assert_eq!(err.public_message(), GENERIC_INTERNAL_MESSAGE);
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
    }
}
