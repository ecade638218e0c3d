//! Domain entities - core business objects

mod event;
mod promotion;
mod transaction;
mod user;

pub use event::{Event, EventUpdate, NewEvent, UserSummary};
pub use promotion::{NewPromotion, Promotion, PromotionKind, PromotionUpdate};
pub use transaction::{NewTransaction, Transaction, TransactionKind};
pub use user::{NewUser, User, UserUpdate};
