//! Error handling utilities for repositories

use loyalty_core::error::DomainError;
use sqlx::Error as SqlxError;

/// Convert SQLx error to DomainError
pub fn map_db_error(e: SqlxError) -> DomainError {
    DomainError::DatabaseError(e.to_string())
}

/// Check for unique violation and return appropriate error or fallback
pub fn map_unique_violation<F>(e: SqlxError, on_unique: F) -> DomainError
where
    F: FnOnce() -> DomainError,
{
    if let Some(db_err) = e.as_database_error() {
        if db_err.is_unique_violation() {
            return on_unique();
        }
    }
    DomainError::DatabaseError(e.to_string())
}

/// SQLSTATE `numeric_value_out_of_range`
const NUMERIC_OUT_OF_RANGE: &str = "22003";

/// Map an arithmetic overflow on a points column to a rejected amount
pub fn map_points_overflow(e: SqlxError) -> DomainError {
    let overflow = e
        .as_database_error()
        .and_then(|db| db.code())
        .is_some_and(|code| code == NUMERIC_OUT_OF_RANGE);
    if overflow {
        DomainError::InvalidAmount("balance out of range".to_string())
    } else {
        map_db_error(e)
    }
}

/// Map a unique violation on the users table to the column that clashed
pub fn map_user_unique(e: SqlxError) -> DomainError {
    let on_email = e
        .as_database_error()
        .and_then(|db| db.constraint())
        .is_some_and(|c| c.contains("email"));
    map_unique_violation(e, || {
        if on_email {
            DomainError::EmailAlreadyExists
        } else {
            DomainError::UtoridAlreadyExists
        }
    })
}
