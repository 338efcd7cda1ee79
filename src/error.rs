use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;

use crate::{mailer::MailError, validation::ValidationErrors};

/// AppError
///
/// Application-level error for HTTP handlers. Every variant maps to exactly one
/// status code in [`IntoResponse`]; bodies follow the `{"detail": ...}` /
/// `{"field": [...]}` convention.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Payload failed field-level validation (400, field map body).
    #[error("Validation failed: {0}")]
    Validation(ValidationErrors),

    /// The request body was not valid JSON for the expected shape.
    #[error("Malformed request body: {0}")]
    MalformedBody(String),

    /// A query-string parameter could not be parsed.
    #[error("Malformed query string: {0}")]
    MalformedQuery(String),

    /// Confirmation code mismatch. Answered with 400 and an empty body.
    #[error("Invalid confirmation code")]
    InvalidConfirmationCode,

    /// No usable credentials were supplied for an operation that needs them.
    #[error("Unauthorized: {0}")]
    Unauthorized(&'static str),

    #[error("Forbidden: {0}")]
    Forbidden(&'static str),

    #[error("Not found")]
    NotFound,

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Mail delivery error: {0}")]
    Mail(#[from] MailError),

    #[error("Token signing error: {0}")]
    Token(#[from] jsonwebtoken::errors::Error),
}

/// Convenience type alias for handler return values.
pub type AppResult<T> = Result<T, AppError>;

impl From<ValidationErrors> for AppError {
    fn from(errors: ValidationErrors) -> Self {
        AppError::Validation(errors)
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        match self {
            AppError::Validation(errors) => (StatusCode::BAD_REQUEST, Json(errors)).into_response(),
            AppError::MalformedBody(msg) | AppError::MalformedQuery(msg) => {
                detail(StatusCode::BAD_REQUEST, &msg)
            }
            AppError::InvalidConfirmationCode => StatusCode::BAD_REQUEST.into_response(),
            AppError::Unauthorized(msg) => detail(StatusCode::UNAUTHORIZED, msg),
            AppError::Forbidden(msg) => detail(StatusCode::FORBIDDEN, msg),
            AppError::NotFound => detail(StatusCode::NOT_FOUND, "Not found."),
            AppError::Database(err) => classify_sqlx_error(&err),
            AppError::Mail(err) => {
                tracing::error!(error = %err, "Mail delivery failed");
                internal()
            }
            AppError::Token(err) => {
                tracing::error!(error = %err, "Token signing failed");
                internal()
            }
        }
    }
}

fn detail(status: StatusCode, message: &str) -> Response {
    (status, Json(json!({ "detail": message }))).into_response()
}

fn internal() -> Response {
    detail(
        StatusCode::INTERNAL_SERVER_ERROR,
        "An internal error occurred",
    )
}

/// Classify a sqlx error into a response.
///
/// - `RowNotFound` maps to 404.
/// - Unique violations (23505) map to 400 keyed by the violated column, so a
///   lost race on a uniqueness check looks like the check itself failing.
/// - Everything else maps to 500 with a sanitized message.
fn classify_sqlx_error(err: &sqlx::Error) -> Response {
    match err {
        sqlx::Error::RowNotFound => AppError::NotFound.into_response(),
        sqlx::Error::Database(db_err) if db_err.code().as_deref() == Some("23505") => {
            let constraint = db_err.constraint().unwrap_or("unknown");
            let errors = ValidationErrors::single(
                unique_constraint_field(constraint),
                "An object with this value already exists.",
            );
            (StatusCode::BAD_REQUEST, Json(errors)).into_response()
        }
        other => {
            tracing::error!(error = %other, "Database error");
            internal()
        }
    }
}

fn unique_constraint_field(constraint: &str) -> &'static str {
    match constraint {
        "uq_users_username" => "username",
        "uq_users_email" => "email",
        "uq_categories_slug" | "uq_genres_slug" => "slug",
        _ => crate::validation::NON_FIELD_ERRORS,
    }
}
