//! Error handling for the lot scan verification server
//!
//! Scan outcomes are values, not errors. What ends up here is either a hard
//! validation failure the operator has to resolve (quantity policy, finalize
//! blockers) or a host/storage failure.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::{FinalizeError, LotKeyError, QuantityPolicyError};
use thiserror::Error;
use uuid::Uuid;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation { field: String, message: String },

    #[error("Invalid identifier: {0}")]
    InvalidIdentifier(#[from] LotKeyError),

    #[error("Quantity policy violation: {0}")]
    QuantityPolicyViolation(#[from] QuantityPolicyError),

    #[error("Duplicate entry: {0}")]
    DuplicateEntry(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Transfer {id} is {state} and no longer accepts changes")]
    OperationClosed { id: Uuid, state: String },

    #[error("Transfer cannot be finalized: {0}")]
    Finalize(#[from] FinalizeError),

    #[error("Storage error: {0}")]
    StorageError(String),

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
    /// Identifier lists and similar data for a precise client message
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

    fn with_field(mut self, field: impl Into<String>) -> Self {
        self.field = Some(field.into());
        self
    }

    fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }
}

impl AppError {
    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Validation { .. } => "VALIDATION_ERROR",
            AppError::InvalidIdentifier(_) => "INVALID_IDENTIFIER",
            AppError::QuantityPolicyViolation(_) => "QUANTITY_POLICY_VIOLATION",
            AppError::DuplicateEntry(_) => "DUPLICATE_ENTRY",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::OperationClosed { .. } => "OPERATION_CLOSED",
            AppError::Finalize(FinalizeError::MissingScans(_)) => "MISSING_SCANS",
            AppError::Finalize(FinalizeError::UnexpectedScans(_)) => "UNEXPECTED_SCANS",
            AppError::StorageError(_) => "STORAGE_ERROR",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
            AppError::Internal(_) => "INTERNAL_ERROR",
        }
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Validation { .. } | AppError::InvalidIdentifier(_) => StatusCode::BAD_REQUEST,
            AppError::QuantityPolicyViolation(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::DuplicateEntry(_) | AppError::OperationClosed { .. } => StatusCode::CONFLICT,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Finalize(_) => StatusCode::UNPROCESSABLE_ENTITY,
            AppError::StorageError(_) => StatusCode::SERVICE_UNAVAILABLE,
            AppError::DatabaseError(_) | AppError::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }

    /// Whether the error came from the host/storage rather than from the request
    pub fn is_host_failure(&self) -> bool {
        matches!(
            self,
            AppError::StorageError(_) | AppError::DatabaseError(_)
        )
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let code = self.code();

        let error_detail = match &self {
            AppError::Validation { field, message } => {
                ErrorDetail::new(code, message.clone()).with_field(field.clone())
            }
            AppError::InvalidIdentifier(err) => {
                ErrorDetail::new(code, err.to_string()).with_field("lot")
            }
            AppError::QuantityPolicyViolation(err) => ErrorDetail::new(code, err.to_string())
                .with_field("quantity")
                .with_details(serde_json::to_value(err).unwrap_or_default()),
            AppError::DuplicateEntry(field) => {
                ErrorDetail::new(code, format!("A record with this {} already exists", field))
                    .with_field(field.clone())
            }
            AppError::NotFound(resource) => {
                ErrorDetail::new(code, format!("{} not found", resource))
            }
            AppError::OperationClosed { .. } => ErrorDetail::new(code, self.to_string()),
            AppError::Finalize(err) => ErrorDetail::new(code, err.to_string())
                .with_details(serde_json::json!({ "lots": err.lots() })),
            AppError::StorageError(msg) => {
                ErrorDetail::new(code, format!("Storage error: {}", msg))
            }
            AppError::DatabaseError(_) => ErrorDetail::new(code, "A database error occurred"),
            AppError::Internal(_) => ErrorDetail::new(code, "An internal server error occurred"),
        };

        // Log the error for debugging
        if status.is_server_error() {
            tracing::error!(code, "Error: {:?}", self);
        } else {
            tracing::warn!(code, "Request rejected: {}", self);
        }

        (status, Json(ErrorResponse { error: error_detail })).into_response()
    }
}

impl From<validator::ValidationErrors> for AppError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let field = errors
            .field_errors()
            .keys()
            .min()
            .map(|f| f.to_string())
            .unwrap_or_default();
        AppError::Validation {
            field,
            message: errors.to_string(),
        }
    }
}

/// Result type alias for services and handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_finalize_errors_map_to_codes() {
        let missing = AppError::from(FinalizeError::MissingScans(vec!["LOT002".into()]));
        assert_eq!(missing.code(), "MISSING_SCANS");
        assert_eq!(missing.status(), StatusCode::UNPROCESSABLE_ENTITY);

        let unexpected = AppError::from(FinalizeError::UnexpectedScans(vec!["X".into()]));
        assert_eq!(unexpected.code(), "UNEXPECTED_SCANS");
    }

    #[test]
    fn test_host_failures() {
        assert!(AppError::StorageError("down".into()).is_host_failure());
        assert!(!AppError::NotFound("Line".into()).is_host_failure());
    }

    #[test]
    fn test_closed_operation_is_conflict() {
        let err = AppError::OperationClosed {
            id: Uuid::nil(),
            state: "finalized".into(),
        };
        assert_eq!(err.status(), StatusCode::CONFLICT);
        assert!(err.to_string().contains("finalized"));
    }
}
