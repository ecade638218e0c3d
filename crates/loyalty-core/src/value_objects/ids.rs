//! Typed row identifiers
//!
//! Every aggregate gets its own newtype over the database `BIGINT` key so a
//! user id can never be passed where an event id is expected.

use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;

/// Error when parsing an identifier from a path segment or query string
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum IdParseError {
    #[error("invalid id format")]
    InvalidFormat,
}

macro_rules! define_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
        pub struct $name(i64);

        impl $name {
            #[inline]
            pub const fn new(id: i64) -> Self {
                Self(id)
            }

            #[inline]
            pub const fn into_inner(self) -> i64 {
                self.0
            }

            pub fn parse(s: &str) -> Result<Self, IdParseError> {
                s.trim()
                    .parse::<i64>()
                    .ok()
                    .filter(|id| *id > 0)
                    .map(Self)
                    .ok_or(IdParseError::InvalidFormat)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }

        impl From<i64> for $name {
            fn from(id: i64) -> Self {
                Self(id)
            }
        }

        impl From<$name> for i64 {
            fn from(id: $name) -> Self {
                id.0
            }
        }

        impl std::str::FromStr for $name {
            type Err = IdParseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                Self::parse(s)
            }
        }

        impl Serialize for $name {
            fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
            where
                S: Serializer,
            {
                serializer.serialize_i64(self.0)
            }
        }

        // Accept numbers and numeric strings; form-encoded clients send both
        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
            where
                D: Deserializer<'de>,
            {
                deserializer.deserialize_any(IdVisitor).map(Self)
            }
        }
    };
}

struct IdVisitor;

impl<'de> serde::de::Visitor<'de> for IdVisitor {
    type Value = i64;

    fn expecting(&self, formatter: &mut fmt::Formatter) -> fmt::Result {
        formatter.write_str("a positive integer id")
    }

    fn visit_i64<E>(self, value: i64) -> Result<i64, E>
    where
        E: serde::de::Error,
    {
        Ok(value)
    }

    fn visit_u64<E>(self, value: u64) -> Result<i64, E>
    where
        E: serde::de::Error,
    {
        i64::try_from(value).map_err(|_| E::custom("id out of range"))
    }

    fn visit_str<E>(self, value: &str) -> Result<i64, E>
    where
        E: serde::de::Error,
    {
        value
            .trim()
            .parse::<i64>()
            .map_err(|_| E::custom("invalid id string"))
    }
}

define_id!(
    /// Primary key of a user account
    UserId
);
define_id!(
    /// Primary key of a ledger row
    TransactionId
);
define_id!(
    /// Primary key of a promotion
    PromotionId
);
define_id!(
    /// Primary key of an event
    EventId
);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_positive() {
        assert_eq!(UserId::parse("42").unwrap(), UserId::new(42));
        assert_eq!(" 7 ".parse::<EventId>().unwrap().into_inner(), 7);
    }

    #[test]
    fn test_parse_rejects_garbage_and_non_positive() {
        assert!(UserId::parse("abc").is_err());
        assert!(UserId::parse("0").is_err());
        assert!(TransactionId::parse("-3").is_err());
    }

    #[test]
    fn test_serialize_as_number() {
        let json = serde_json::to_string(&PromotionId::new(12)).unwrap();
        assert_eq!(json, "12");
    }

    #[test]
    fn test_deserialize_number_or_string() {
        let a: UserId = serde_json::from_str("5").unwrap();
        let b: UserId = serde_json::from_str("\"5\"").unwrap();
        assert_eq!(a, b);
        assert!(serde_json::from_str::<UserId>("\"x\"").is_err());
    }

    #[test]
    fn test_display() {
        assert_eq!(TransactionId::new(99).to_string(), "99");
    }
}
