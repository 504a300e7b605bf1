use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;
use tracing::error;

use crate::utils::response::error as error_response;

#[derive(Debug, Error)]
pub enum AppError {
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Authentication error: {0}")]
    AuthError(String),

    #[error("Forbidden: {0}")]
    Forbidden(String),

    #[error("Resource not found: {0}")]
    NotFound(String),

    #[error("Tier belongs to a different event than the staff member")]
    TierMismatch,

    #[error("Insufficient allocation: requested {requested}, remaining {remaining}")]
    InsufficientAllocation { requested: i32, remaining: i32 },

    #[error("Transfer target was not assigned by the source staff member")]
    NotYourAssociate,

    #[error("Order hold has expired")]
    OrderExpired,

    #[error("Staff member does not accept in-person cash payments")]
    StaffNotAuthorized,

    #[error("Invalid order status: {0}")]
    InvalidStatus(String),

    #[error("Concurrent update conflict")]
    ConcurrentUpdate,

    #[error("Database error")]
    DatabaseError(#[from] sqlx::Error),
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            AppError::ValidationError(_) => StatusCode::BAD_REQUEST,
            AppError::AuthError(_) => StatusCode::UNAUTHORIZED,
            AppError::Forbidden(_) => StatusCode::FORBIDDEN,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::TierMismatch => StatusCode::BAD_REQUEST,
            AppError::InsufficientAllocation { .. } => StatusCode::CONFLICT,
            AppError::NotYourAssociate => StatusCode::FORBIDDEN,
            AppError::OrderExpired => StatusCode::CONFLICT,
            AppError::StaffNotAuthorized => StatusCode::FORBIDDEN,
            AppError::InvalidStatus(_) => StatusCode::CONFLICT,
            AppError::ConcurrentUpdate => StatusCode::CONFLICT,
            AppError::DatabaseError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    pub fn code(&self) -> &'static str {
        match self {
            AppError::ValidationError(_) => "VALIDATION_ERROR",
            AppError::AuthError(_) => "AUTH_ERROR",
            AppError::Forbidden(_) => "FORBIDDEN",
            AppError::NotFound(_) => "NOT_FOUND",
            AppError::TierMismatch => "TIER_MISMATCH",
            AppError::InsufficientAllocation { .. } => "INSUFFICIENT_ALLOCATION",
            AppError::NotYourAssociate => "NOT_YOUR_ASSOCIATE",
            AppError::OrderExpired => "ORDER_EXPIRED",
            AppError::StaffNotAuthorized => "STAFF_NOT_AUTHORIZED",
            AppError::InvalidStatus(_) => "INVALID_STATUS",
            AppError::ConcurrentUpdate => "CONCURRENT_UPDATE",
            AppError::DatabaseError(_) => "DATABASE_ERROR",
        }
    }

    fn log(&self) {
        match self {
            AppError::DatabaseError(e) => {
                error!(error = ?e, "Database error");
            }
            other => {
                error!(error = ?other, code = other.code(), "Application error");
            }
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();

        // Log internal details
        self.log();

        // Only expose high-level message to the client
        let public_message = match &self {
            AppError::DatabaseError(_) => "A database error occurred".to_string(),
            other => other.to_string(),
        };

        // Do not expose internal details in the API response
        let details = None;

        error_response(code, public_message, details, status)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn domain_errors_map_to_client_status_codes() {
        assert_eq!(
            AppError::InsufficientAllocation {
                requested: 5,
                remaining: 2
            }
            .status_code(),
            StatusCode::CONFLICT
        );
        assert_eq!(AppError::OrderExpired.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::NotYourAssociate.status_code(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::TierMismatch.status_code(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn codes_are_stable_identifiers() {
        assert_eq!(AppError::ConcurrentUpdate.code(), "CONCURRENT_UPDATE");
        assert_eq!(AppError::StaffNotAuthorized.code(), "STAFF_NOT_AUTHORIZED");
    }
}
