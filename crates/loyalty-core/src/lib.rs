//! # loyalty-core
//!
//! Domain layer for the campus loyalty platform: users, ledger transactions,
//! promotions and events, the points arithmetic, and the repository traits the
//! infrastructure layer implements.
//! This crate has zero dependencies on infrastructure (database, web framework, etc.).

pub mod entities;
pub mod error;
pub mod ledger;
pub mod traits;
pub mod value_objects;

// Re-export commonly used types at crate root
pub use entities::{
    Event, EventUpdate, NewEvent, NewPromotion, NewTransaction, NewUser, Promotion,
    PromotionKind, PromotionUpdate, Transaction, TransactionKind, User, UserSummary, UserUpdate,
};
pub use error::{DomainError, ErrorKind};
pub use ledger::{
    checked_balance, AmountComparison, BalanceDelta, CommitGuard, LedgerCommit, PoolDraw,
    TransactionFilter, MAX_POINT_AMOUNT,
};
pub use traits::{
    EventQuery, EventRepository, LedgerRepository, PromotionQuery, PromotionRepository,
    RepoResult, UserQuery, UserRepository,
};
pub use value_objects::{
    Caller, EventId, IdParseError, PromotionId, Role, TransactionId, UserId, Utorid,
    UtoridError,
};
