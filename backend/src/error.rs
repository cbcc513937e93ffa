//! Error handling for the restaurant operations backend
//!
//! Ledger errors keep their structured detail (shortfall lists) in the
//! response body so an operator can correct the problem.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::LedgerError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    // Ledger errors
    #[error(transparent)]
    Ledger(#[from] LedgerError),

    // External service errors
    #[error("Notification delivery failed: {0}")]
    Notification(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub error: ErrorDetail,
}

#[derive(Serialize)]
pub struct ErrorDetail {
    pub code: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ErrorDetail {
    fn new(code: &str, message: impl Into<String>) -> Self {
        Self {
            code: code.to_string(),
            message: message.into(),
            field: None,
            details: None,
        }
    }

    fn with_field(mut self, field: &str) -> Self {
        self.field = Some(field.to_string());
        self
    }

    fn with_details<T: Serialize>(mut self, details: &T) -> Self {
        self.details = serde_json::to_value(details).ok();
        self
    }
}

fn ledger_response(err: &LedgerError) -> (StatusCode, ErrorDetail) {
    let message = err.to_string();
    match err {
        LedgerError::UnresolvedUnit { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new("UNRESOLVED_UNIT", message).with_field("unit"),
        ),
        LedgerError::NoRecipeDefined { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new("NO_RECIPE_DEFINED", message),
        ),
        LedgerError::InsufficientStock { shortfalls } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new("INSUFFICIENT_STOCK", describe_stock(shortfalls))
                .with_details(shortfalls),
        ),
        LedgerError::NotFoundInInventory { .. } => (
            StatusCode::NOT_FOUND,
            ErrorDetail::new("NOT_FOUND_IN_INVENTORY", message),
        ),
        LedgerError::InvalidApprovalState(_) => (
            StatusCode::CONFLICT,
            ErrorDetail::new("INVALID_APPROVAL_STATE", message),
        ),
        LedgerError::RoleNotAuthorized { .. } => (
            StatusCode::FORBIDDEN,
            ErrorDetail::new("ROLE_NOT_AUTHORIZED", message),
        ),
        LedgerError::InsufficientServings { shortfalls } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new("INSUFFICIENT_SERVINGS", message).with_details(shortfalls),
        ),
        LedgerError::InvalidTransition { .. } => (
            StatusCode::UNPROCESSABLE_ENTITY,
            ErrorDetail::new("INVALID_STATE_TRANSITION", message),
        ),
        LedgerError::Validation { field, message } => (
            StatusCode::BAD_REQUEST,
            ErrorDetail::new("VALIDATION_ERROR", message.clone()).with_field(field),
        ),
    }
}

/// One line per failing ingredient: "Flour: needed 5 kg, available 3 kg"
fn describe_stock(shortfalls: &[shared::StockShortfall]) -> String {
    shortfalls
        .iter()
        .map(|s| {
            format!(
                "{}: needed {} {}, available {} {}",
                s.material_name,
                s.needed.normalize(),
                s.unit,
                s.available.normalize(),
                s.unit
            )
        })
        .collect::<Vec<_>>()
        .join("; ")
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation { field, message } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail::new("VALIDATION_ERROR", message.clone()).with_field(field),
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail::new("NOT_FOUND", format!("{} not found", resource)),
            ),
            AppError::Conflict(msg) => (
                StatusCode::CONFLICT,
                ErrorDetail::new("CONFLICT", msg.clone()),
            ),
            AppError::Ledger(err) => ledger_response(err),
            AppError::Notification(msg) => (
                StatusCode::BAD_GATEWAY,
                ErrorDetail::new("NOTIFICATION_ERROR", format!("Notification error: {}", msg)),
            ),
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("DATABASE_ERROR", "A database error occurred"),
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail::new("INTERNAL_ERROR", msg.clone()),
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;
