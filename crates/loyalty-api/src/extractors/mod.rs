//! Axum extractors for request handling
//!
//! Custom extractors for authentication, bodies, query strings and the
//! client key used for throttling.

mod auth;
mod client;
mod query;
mod validated;

pub use auth::AuthUser;
pub use client::ClientKey;
pub use query::ApiQuery;
pub use validated::{JsonBody, ValidatedJson};
