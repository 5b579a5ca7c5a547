//! Error types for the edge node HTTP API.
//!
//! Every handler returns `ApiResult<T>`; the error half renders as
//! `{"code": "...", "message": "..."}` with the matching status.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Serialize;
use tracing::error;

use healthguard_core::{CoreError, ValidationError};
use healthguard_db::DbError;

/// Convenience alias for handler results.
pub type ApiResult<T> = Result<T, ApiError>;

/// Errors a dashboard client can see.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("{0}")]
    BadRequest(String),

    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("Internal error: {0}")]
    Internal(String),
}

/// JSON error body.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub code: &'static str,
    pub message: String,
}

impl ApiError {
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden(_) => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            ApiError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code.
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::Forbidden(_) => "forbidden",
            ApiError::NotFound(_) => "not_found",
            ApiError::Conflict(_) => "conflict",
            ApiError::Validation(_) => "validation_error",
            ApiError::Internal(_) => "internal_error",
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        if let ApiError::Internal(ref msg) = self {
            error!(error = %msg, "Request failed");
        }

        let body = ErrorBody {
            code: self.code(),
            message: self.to_string(),
        };
        (self.status(), Json(body)).into_response()
    }
}

impl From<DbError> for ApiError {
    fn from(err: DbError) -> Self {
        match err {
            DbError::NotFound { entity, .. } => ApiError::NotFound(format!("{entity} not found")),
            DbError::UniqueViolation { field, value } => {
                ApiError::Conflict(format!("{field} '{value}' already exists"))
            }
            other => ApiError::Internal(other.to_string()),
        }
    }
}

impl From<CoreError> for ApiError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::PatientNotFound => {
                ApiError::NotFound("No patient profile configured".to_string())
            }
            CoreError::UserNotFound(username) => {
                ApiError::NotFound(format!("User not found: {username}"))
            }
            CoreError::UserExists(_) => ApiError::Conflict("Username already exists".to_string()),
            CoreError::Validation(e) => ApiError::Validation(e),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_mapping() {
        assert_eq!(
            ApiError::from(CoreError::PatientNotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            ApiError::from(CoreError::UserExists("nurse".into())).status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            ApiError::from(ValidationError::Required {
                field: "username".into()
            })
            .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            ApiError::from(DbError::QueryFailed("disk I/O error".into())).code(),
            "internal_error"
        );
    }

    #[tokio::test]
    async fn test_json_body() {
        let response = ApiError::Forbidden("Only admins can register new users".into()).into_response();
        assert_eq!(response.status(), StatusCode::FORBIDDEN);

        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        let body: serde_json::Value = serde_json::from_slice(&bytes).unwrap();
        assert_eq!(body["code"], "forbidden");
        assert_eq!(body["message"], "Only admins can register new users");
    }
}
