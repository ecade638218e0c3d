//! Route handlers
//!
//! All HTTP request handlers organized by domain.

pub mod auth;
pub mod events;
pub mod health;
pub mod promotions;
pub mod transactions;
pub mod users;
