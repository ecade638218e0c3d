//! Model to entity mappers
//!
//! Text columns holding enums are parsed on the way out; a value the domain
//! does not recognise surfaces as a database error rather than a panic.

mod event;
mod promotion;
mod transaction;
mod user;

pub use event::{event_with_rosters, split_rosters};

use loyalty_core::DomainError;

fn corrupt(column: &str, value: &str) -> DomainError {
    DomainError::DatabaseError(format!("unexpected {column} value in database: {value}"))
}
