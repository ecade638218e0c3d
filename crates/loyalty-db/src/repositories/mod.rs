//! Repository implementations
//!
//! PostgreSQL implementations of the repository traits defined in loyalty-core.
//! Each repository handles database operations for a specific aggregate.

mod error;
mod event;
mod ledger;
mod promotion;
mod user;

pub use event::PgEventRepository;
pub use ledger::PgLedgerRepository;
pub use promotion::PgPromotionRepository;
pub use user::PgUserRepository;
