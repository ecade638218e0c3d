//! Error types

mod app_error;

pub use app_error::{kind_status, AppError, AppResult, ErrorResponse};
