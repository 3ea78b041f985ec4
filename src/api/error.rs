//! Request-boundary error taxonomy.
//!
//! Every handler failure converts into the stable `success: false` JSON shape
//! here; nothing below the HTTP surface panics a request. Database and other
//! unexpected errors are logged and reported as a generic server error.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;
use utoipa::ToSchema;

/// Field-level validation detail, mirrored in 400 responses.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct FieldError {
    pub field: String,
    pub message: String,
}

impl FieldError {
    #[must_use]
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("validation failed")]
    Validation(Vec<FieldError>),
    #[error("unauthenticated")]
    Unauthenticated(&'static str),
    #[error("forbidden")]
    Forbidden(&'static str),
    #[error("not found")]
    NotFound(&'static str),
    #[error("conflict")]
    Conflict(&'static str),
    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

impl ApiError {
    /// Single-field validation failure.
    #[must_use]
    pub fn invalid(field: &'static str, message: impl Into<String>) -> Self {
        Self::Validation(vec![FieldError::new(field, message)])
    }
}

impl From<sqlx::Error> for ApiError {
    fn from(err: sqlx::Error) -> Self {
        Self::Internal(anyhow::Error::new(err).context("database error"))
    }
}

/// Stable error envelope: `{"success": false, "message": ..., "errors": [...]}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct ErrorBody {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub errors: Option<Vec<FieldError>>,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message, errors) = match self {
            Self::Validation(errors) => (
                StatusCode::BAD_REQUEST,
                "Validation failed".to_string(),
                Some(errors),
            ),
            Self::Unauthenticated(message) => {
                (StatusCode::UNAUTHORIZED, message.to_string(), None)
            }
            Self::Forbidden(message) => (StatusCode::FORBIDDEN, message.to_string(), None),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message.to_string(), None),
            Self::Conflict(message) => (StatusCode::CONFLICT, message.to_string(), None),
            Self::Internal(err) => {
                error!("Internal error: {err:#}");
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    "Server error".to_string(),
                    None,
                )
            }
        };

        let body = ErrorBody {
            success: false,
            message,
            errors,
        };
        (status, Json(body)).into_response()
    }
}

/// Postgres unique violations surface as conflicts, not server errors.
#[must_use]
pub fn is_unique_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, &["23505"])
}

/// Postgres CHECK violations, surfaced as validation failures.
#[must_use]
pub fn is_check_violation(err: &sqlx::Error) -> bool {
    has_sqlstate(err, &["23514"])
}

/// Invalid date/time input reaching a `::timestamptz` cast.
#[must_use]
pub fn is_datetime_error(err: &sqlx::Error) -> bool {
    has_sqlstate(err, &["22007", "22008"])
}

fn has_sqlstate(err: &sqlx::Error, codes: &[&str]) -> bool {
    match err {
        sqlx::Error::Database(db_err) => db_err
            .code()
            .is_some_and(|code| codes.contains(&code.as_ref())),
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_body_carries_field_detail() {
        let err = ApiError::invalid("email", "Please provide a valid email");
        let response = err.into_response();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn conflict_maps_to_409() {
        let response = ApiError::Conflict("duplicate").into_response();
        assert_eq!(response.status(), StatusCode::CONFLICT);
    }

    #[test]
    fn unauthenticated_maps_to_401() {
        let response = ApiError::Unauthenticated("Not authorized").into_response();
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn error_body_serializes_success_false() {
        let body = ErrorBody {
            success: false,
            message: "Server error".to_string(),
            errors: None,
        };
        let value = serde_json::to_value(&body).expect("serialize");
        assert_eq!(value["success"], serde_json::Value::Bool(false));
        assert!(value.get("errors").is_none());
    }
}
