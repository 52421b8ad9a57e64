use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

use crate::models::{BookingStatus, ResourceType};

/// A request that violates a category rule, a bound, or a calendar constraint.
/// Always reported before any resource is looked up, never clamped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("invalid {field}: {message}")]
pub struct ValidationError {
    pub field: String,
    pub message: String,
}

impl ValidationError {
    pub fn new(field: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            field: field.into(),
            message: message.into(),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum BookingError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("slot taken: {0}")]
    SlotTaken(String),

    #[error("no active resource of type {0}")]
    ResourceUnavailable(ResourceType),

    #[error("cannot move booking from {from} to {to}")]
    InvalidTransition {
        from: BookingStatus,
        to: BookingStatus,
    },

    #[error("not found: {0}")]
    NotFound(String),

    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("storage error: {0}")]
    Storage(#[from] anyhow::Error),
}

#[derive(Debug, thiserror::Error)]
pub enum AppError {
    #[error("database error: {0}")]
    Database(#[from] rusqlite::Error),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),

    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("not found: {0}")]
    NotFound(String),

    #[error("slot taken: {0}")]
    SlotTaken(String),

    #[error("resource unavailable: {0}")]
    ResourceUnavailable(String),

    #[error("invalid transition: {0}")]
    InvalidTransition(String),

    #[error("superseded by a newer estimate request")]
    Superseded,
}

impl AppError {
    fn code(&self) -> &'static str {
        match self {
            AppError::Database(_) | AppError::Internal(_) => "internal",
            AppError::Validation(_) => "validation",
            AppError::NotFound(_) => "not_found",
            AppError::SlotTaken(_) => "slot_taken",
            AppError::ResourceUnavailable(_) => "resource_unavailable",
            AppError::InvalidTransition(_) => "invalid_transition",
            AppError::Superseded => "superseded",
        }
    }
}

impl From<BookingError> for AppError {
    fn from(err: BookingError) -> Self {
        match err {
            BookingError::Validation(e) => AppError::Validation(e),
            BookingError::SlotTaken(msg) => AppError::SlotTaken(msg),
            BookingError::ResourceUnavailable(kind) => {
                AppError::ResourceUnavailable(format!("no active {kind} configured"))
            }
            e @ BookingError::InvalidTransition { .. } => AppError::InvalidTransition(e.to_string()),
            BookingError::NotFound(what) => AppError::NotFound(what),
            BookingError::Database(e) => AppError::Database(e),
            BookingError::Storage(e) => AppError::Internal(e),
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = match &self {
            AppError::Database(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::Validation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::SlotTaken(_) => StatusCode::CONFLICT,
            AppError::ResourceUnavailable(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::InvalidTransition(_) => StatusCode::CONFLICT,
            AppError::Superseded => StatusCode::CONFLICT,
        };

        if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, "request failed");
        }

        let body = serde_json::json!({ "error": self.to_string(), "code": self.code() });
        (status, axum::Json(body)).into_response()
    }
}
