//! Repository traits (ports)

mod repositories;

pub use repositories::{
    EventQuery, EventRepository, LedgerRepository, PromotionQuery, PromotionRepository,
    RepoResult, UserQuery, UserRepository,
};
