pub mod invoice_service;
pub mod payment_service;
pub mod rate_service;

use std::collections::HashMap;
use thiserror::Error;

/// Errors surfaced by the service layer. Converted to `ApiError` at the
/// HTTP boundary; persistence failures stay opaque to clients.
#[derive(Debug, Error)]
pub enum ServiceError {
    #[error("{0}")]
    NotFound(String),

    #[error("{0}")]
    Forbidden(String),

    #[error("{0}")]
    Validation(String),

    #[error("{message}")]
    FieldValidation {
        message: String,
        field_errors: HashMap<String, String>,
    },

    #[error("{0}")]
    Conflict(String),

    #[error(transparent)]
    Billing(#[from] crate::billing::BillingError),

    #[error(transparent)]
    Database(#[from] crate::database::manager::DatabaseError),

    #[error(transparent)]
    Sqlx(#[from] sqlx::Error),
}

/// Postgres unique_violation, used to map duplicate-key races to 409s.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code == "23505")
        .unwrap_or(false)
}
