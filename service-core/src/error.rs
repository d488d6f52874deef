use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(#[from] validator::ValidationErrors),

    #[error("Invalid input: {0}")]
    InvalidInput(anyhow::Error),

    #[error("Bad request: {0}")]
    BadRequest(anyhow::Error),

    #[error("Not found: {0}")]
    NotFound(anyhow::Error),

    #[error("Conflict: {0}")]
    Conflict(anyhow::Error),

    #[error("Concurrent modification: {0}")]
    ConflictOrRace(anyhow::Error),

    #[error("Discount code invalid ({reason}): {message}")]
    DiscountInvalid {
        reason: &'static str,
        message: String,
    },

    #[error("Render error: {0}")]
    RenderError(anyhow::Error),

    #[error("Internal server error: {0}")]
    InternalError(#[from] anyhow::Error),

    #[error("Service Unavailable")]
    ServiceUnavailable,

    #[error("Database error: {0}")]
    DatabaseError(anyhow::Error),

    #[error("Configuration error: {0}")]
    ConfigError(anyhow::Error),
}

impl AppError {
    /// Machine-readable error kind carried in every error body.
    pub fn kind(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) | AppError::InvalidInput(_) => "validation_error",
            AppError::BadRequest(_) => "bad_request",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::ConflictOrRace(_) => "conflict_or_race",
            AppError::DiscountInvalid { .. } => "discount_invalid",
            AppError::RenderError(_) => "render_error",
            AppError::InternalError(_) => "internal_error",
            AppError::ServiceUnavailable => "service_unavailable",
            AppError::DatabaseError(_) => "store_unavailable",
            AppError::ConfigError(_) => "config_error",
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::ConfigError(anyhow::Error::new(err))
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::InternalError(anyhow::Error::new(err))
    }
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    kind: &'static str,
    error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    reason: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    details: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let kind = self.kind();

        let (status, error_message, reason, details) = match self {
            AppError::ValidationError(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                None,
                Some(err.to_string()),
            ),
            AppError::InvalidInput(err) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                "Validation error".to_string(),
                None,
                Some(err.to_string()),
            ),
            AppError::BadRequest(err) => (StatusCode::BAD_REQUEST, err.to_string(), None, None),
            AppError::NotFound(err) => (StatusCode::NOT_FOUND, err.to_string(), None, None),
            AppError::Conflict(err) => (StatusCode::CONFLICT, err.to_string(), None, None),
            AppError::ConflictOrRace(err) => (StatusCode::CONFLICT, err.to_string(), None, None),
            AppError::DiscountInvalid { reason, message } => {
                (StatusCode::BAD_REQUEST, message, Some(reason), None)
            }
            AppError::RenderError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Render error".to_string(),
                None,
                Some(err.to_string()),
            ),
            AppError::InternalError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Internal server error".to_string(),
                None,
                Some(format!("{:#?}", err)),
            ),
            AppError::ServiceUnavailable => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Service unavailable".to_string(),
                None,
                None,
            ),
            AppError::DatabaseError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Database error".to_string(),
                None,
                Some(err.to_string()),
            ),
            AppError::ConfigError(err) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "Configuration error".to_string(),
                None,
                Some(err.to_string()),
            ),
        };

        (
            status,
            Json(ErrorResponse {
                kind,
                error: error_message,
                reason,
                details,
            }),
        )
            .into_response()
    }
}
