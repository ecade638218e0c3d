//! Value objects - immutable types that represent domain concepts

mod caller;
mod ids;
mod role;
mod utorid;

pub use caller::Caller;
pub use ids::{EventId, IdParseError, PromotionId, TransactionId, UserId};
pub use role::Role;
pub use utorid::{Utorid, UtoridError};
