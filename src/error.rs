//! Payroll error taxonomy.

use actix_web::{HttpResponse, ResponseError, http::StatusCode};
use serde_json::json;
use thiserror::Error;

pub type PayrollResult<T> = Result<T, PayrollError>;

#[derive(Debug, Error)]
pub enum PayrollError {
    /// Malformed or out-of-range input (negative CTC, month 13, ...).
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Well-formed input that breaks a financial rule, e.g. deductions above gross.
    #[error("Validation error: {0}")]
    Validation(String),

    #[error("Not found: {0}")]
    NotFound(String),

    /// Duplicate (employee, month, year) key.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// Financial write against a record whose period has passed.
    #[error("Record is immutable: {0}")]
    Immutable(String),

    #[error("Current period is protected: {0}")]
    CurrentPeriodProtected(String),

    #[error("Past period is immutable: {0}")]
    PastPeriodImmutable(String),

    /// Raised only inside the sync task; logged there, never returned to the salary caller.
    #[error("Propagation failure: {0}")]
    PropagationFailure(String),

    #[error("Database error: {0}")]
    Database(String),
}

impl PayrollError {
    pub fn status_code(&self) -> u16 {
        match self {
            Self::InvalidInput(_) | Self::Validation(_) => 400,
            Self::NotFound(_) => 404,
            Self::Conflict(_) => 409,
            Self::Immutable(_) | Self::CurrentPeriodProtected(_) | Self::PastPeriodImmutable(_) => {
                422
            }
            Self::PropagationFailure(_) | Self::Database(_) => 500,
        }
    }

    pub fn error_code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "INVALID_INPUT",
            Self::Validation(_) => "VALIDATION_ERROR",
            Self::NotFound(_) => "NOT_FOUND",
            Self::Conflict(_) => "CONFLICT",
            Self::Immutable(_) => "IMMUTABLE",
            Self::CurrentPeriodProtected(_) => "CURRENT_PERIOD_PROTECTED",
            Self::PastPeriodImmutable(_) => "PAST_PERIOD_IMMUTABLE",
            Self::PropagationFailure(_) => "PROPAGATION_FAILURE",
            Self::Database(_) => "DATABASE_ERROR",
        }
    }
}

impl From<sqlx::Error> for PayrollError {
    fn from(e: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &e {
            // MySQL reports duplicate keys as SQLSTATE 23000
            if db_err.code().as_deref() == Some("23000") {
                return PayrollError::Conflict(db_err.message().to_string());
            }
        }
        PayrollError::Database(e.to_string())
    }
}

impl ResponseError for PayrollError {
    fn status_code(&self) -> StatusCode {
        StatusCode::from_u16(PayrollError::status_code(self))
            .unwrap_or(StatusCode::INTERNAL_SERVER_ERROR)
    }

    fn error_response(&self) -> HttpResponse {
        let message = match self {
            // keep driver details in the logs
            PayrollError::Database(_) | PayrollError::PropagationFailure(_) => {
                tracing::error!(error = %self, "Request failed");
                "Something went wrong, Contact with system admin".to_string()
            }
            other => other.to_string(),
        };

        HttpResponse::build(ResponseError::status_code(self)).json(json!({
            "error": self.error_code(),
            "message": message,
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn immutability_family_maps_to_unprocessable() {
        assert_eq!(PayrollError::Immutable(String::new()).status_code(), 422);
        assert_eq!(PayrollError::CurrentPeriodProtected(String::new()).status_code(), 422);
        assert_eq!(PayrollError::PastPeriodImmutable(String::new()).status_code(), 422);
    }

    #[test]
    fn client_errors_map_to_4xx() {
        assert_eq!(PayrollError::InvalidInput(String::new()).status_code(), 400);
        assert_eq!(PayrollError::Validation(String::new()).status_code(), 400);
        assert_eq!(PayrollError::NotFound(String::new()).status_code(), 404);
        assert_eq!(PayrollError::Conflict(String::new()).status_code(), 409);
        assert_eq!(PayrollError::Database(String::new()).status_code(), 500);
    }

    #[test]
    fn error_response_carries_code() {
        let resp = PayrollError::Conflict("payroll already exists".into()).error_response();
        assert_eq!(resp.status(), StatusCode::CONFLICT);
        assert_eq!(
            PayrollError::Immutable("x".into()).to_string(),
            "Record is immutable: x"
        );
    }
}
