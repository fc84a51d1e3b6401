//! Error handling for the FLUPSY Management Platform
//!
//! Provides consistent error responses in English and Italian

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use shared::allocation::AllocationError;
use shared::measurement::MeasurementError;
use shared::screening::ScreeningError;
use thiserror::Error;

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation error: {message}")]
    Validation {
        field: String,
        message: String,
        message_it: String,
    },

    #[error("Invalid request payload: {0}")]
    InvalidPayload(#[from] validator::ValidationErrors),

    #[error("Invalid date: {0}")]
    InvalidDate(String),

    #[error("Measurement error: {0}")]
    Measurement(#[from] MeasurementError),

    #[error("Allocation error: {0}")]
    Allocation(#[from] AllocationError),

    #[error("Screening error: {0}")]
    Screening(#[from] ScreeningError),

    #[error("Conflict: {message}")]
    Conflict {
        resource: String,
        message: String,
        message_it: String,
    },

    #[error("Resource not found: {0}")]
    NotFound(String),

    // Business logic errors
    #[error("Invalid state transition: {0}")]
    InvalidStateTransition(String),

    // Database errors
    #[error("Database error: {0}")]
    DatabaseError(#[from] sqlx::Error),

    // Internal errors
    #[error("Internal server error: {0}")]
    Internal(String),
}

impl AppError {
    /// Field-level validation failure with both messages
    pub fn validation(field: &str, message: &str, message_it: &str) -> Self {
        AppError::Validation {
            field: field.to_string(),
            message: message.to_string(),
            message_it: message_it.to_string(),
        }
    }
}

/// Error response structure
#[derive(Serialize)]
pub struct ErrorResponse {
    pub success: bool,
    #[serde(flatten)]
    pub error: ErrorDetail,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ErrorDetail {
    pub code: String,
    #[serde(rename = "error")]
    pub message_en: String,
    pub message_it: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

fn first_invalid_field(errors: &validator::ValidationErrors) -> Option<String> {
    let mut fields: Vec<&str> = errors.field_errors().keys().copied().collect();
    fields.sort_unstable();
    fields.first().map(|f| f.to_string())
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_detail) = match &self {
            AppError::Validation {
                field,
                message,
                message_it,
            } => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: message.clone(),
                    message_it: message_it.clone(),
                    field: Some(field.clone()),
                },
            ),
            AppError::InvalidPayload(errors) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "VALIDATION_ERROR".to_string(),
                    message_en: format!("Invalid request payload: {}", errors),
                    message_it: "Dati della richiesta non validi".to_string(),
                    field: first_invalid_field(errors),
                },
            ),
            AppError::InvalidDate(value) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "INVALID_DATE".to_string(),
                    message_en: format!("Invalid date '{}'. Use YYYY-MM-DD", value),
                    message_it: "Formato date non valido. Utilizzare YYYY-MM-DD".to_string(),
                    field: None,
                },
            ),
            AppError::Measurement(err) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "MEASUREMENT_ERROR".to_string(),
                    message_en: err.to_string(),
                    message_it: err.message_it(),
                    field: None,
                },
            ),
            AppError::Allocation(err) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "ALLOCATION_ERROR".to_string(),
                    message_en: err.to_string(),
                    message_it: "Impossibile ripartire gli animali tra i lotti".to_string(),
                    field: None,
                },
            ),
            AppError::Screening(err) => (
                StatusCode::BAD_REQUEST,
                ErrorDetail {
                    code: "SCREENING_ERROR".to_string(),
                    message_en: err.to_string(),
                    message_it: err.message_it(),
                    field: None,
                },
            ),
            AppError::Conflict {
                resource,
                message,
                message_it,
            } => (
                StatusCode::CONFLICT,
                ErrorDetail {
                    code: "CONFLICT".to_string(),
                    message_en: message.clone(),
                    message_it: message_it.clone(),
                    field: Some(resource.clone()),
                },
            ),
            AppError::NotFound(resource) => (
                StatusCode::NOT_FOUND,
                ErrorDetail {
                    code: "NOT_FOUND".to_string(),
                    message_en: format!("{} not found", resource),
                    message_it: format!("{} non trovato", resource),
                    field: None,
                },
            ),
            AppError::InvalidStateTransition(msg) => (
                StatusCode::UNPROCESSABLE_ENTITY,
                ErrorDetail {
                    code: "INVALID_STATE_TRANSITION".to_string(),
                    message_en: msg.clone(),
                    message_it: format!("Operazione non consentita nello stato attuale: {}", msg),
                    field: None,
                },
            ),
            AppError::DatabaseError(sqlx::Error::Database(db_err))
                if db_err.is_unique_violation() =>
            {
                (
                    StatusCode::CONFLICT,
                    ErrorDetail {
                        code: "DUPLICATE_ENTRY".to_string(),
                        message_en: "A record with these values already exists".to_string(),
                        message_it: "Esiste già un record con questi valori".to_string(),
                        field: db_err.constraint().map(|c| c.to_string()),
                    },
                )
            }
            AppError::DatabaseError(_) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "DATABASE_ERROR".to_string(),
                    message_en: "A database error occurred".to_string(),
                    message_it: "Errore del database".to_string(),
                    field: None,
                },
            ),
            AppError::Internal(msg) => (
                StatusCode::INTERNAL_SERVER_ERROR,
                ErrorDetail {
                    code: "INTERNAL_ERROR".to_string(),
                    message_en: msg.clone(),
                    message_it: "Errore interno del server".to_string(),
                    field: None,
                },
            ),
        };

        // Log the error for debugging
        tracing::error!("Error: {:?}", self);

        (
            status,
            Json(ErrorResponse {
                success: false,
                error: error_detail,
            }),
        )
            .into_response()
    }
}

/// Result type alias for handlers
pub type AppResult<T> = Result<T, AppError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_codes() {
        assert_eq!(
            AppError::NotFound("Lot".to_string()).into_response().status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::InvalidDate("2024-13-01".to_string())
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Measurement(MeasurementError::InsufficientData)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Conflict {
                resource: "position".to_string(),
                message: "occupied".to_string(),
                message_it: "occupata".to_string(),
            }
            .into_response()
            .status(),
            StatusCode::CONFLICT
        );
        assert_eq!(
            AppError::Screening(ScreeningError::NoDestinations)
                .into_response()
                .status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::InvalidStateTransition("closed".to_string())
                .into_response()
                .status(),
            StatusCode::UNPROCESSABLE_ENTITY
        );
        assert_eq!(
            AppError::DatabaseError(sqlx::Error::RowNotFound)
                .into_response()
                .status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_error_payload_shape() {
        let detail = ErrorResponse {
            success: false,
            error: ErrorDetail {
                code: "NOT_FOUND".to_string(),
                message_en: "Lot not found".to_string(),
                message_it: "Lot non trovato".to_string(),
                field: None,
            },
        };
        let json = serde_json::to_value(&detail).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["error"], "Lot not found");
        assert_eq!(json["messageIt"], "Lot non trovato");
        assert_eq!(json["code"], "NOT_FOUND");
        assert!(json.get("field").is_none());
    }
}
