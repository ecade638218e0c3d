//! Business logic services
//!
//! Every service borrows the shared [`ServiceContext`] and takes the
//! authenticated [`Caller`](loyalty_core::Caller) as an explicit argument.
//! Validation always runs before the single mutating call.

pub mod access;
pub mod account;
pub mod context;
pub mod error;
pub mod event;
pub mod promotion;
pub mod transaction;
pub mod user;

// Re-export all services for convenience
pub use account::AccountService;
pub use context::{ServiceContext, ServiceContextBuilder};
pub use error::{ServiceError, ServiceResult};
pub use event::EventService;
pub use promotion::PromotionService;
pub use transaction::TransactionService;
pub use user::UserService;
