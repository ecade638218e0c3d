//! Database models - SQLx-compatible structs for PostgreSQL tables

mod event;
mod promotion;
mod transaction;
mod user;

pub use event::{EventModel, RosterModel};
pub use promotion::PromotionModel;
pub use transaction::{InsertedRow, TransactionModel};
pub use user::UserModel;
