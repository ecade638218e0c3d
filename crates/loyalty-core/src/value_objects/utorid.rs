//! Utorid - the login handle every account carries

use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Error returned for a malformed utorid
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum UtoridError {
    #[error("utorid must be 7 or 8 characters, got {0}")]
    Length(usize),

    #[error("utorid must be alphanumeric")]
    Charset,
}

/// Validated utorid: 7-8 ASCII alphanumeric characters.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(transparent)]
pub struct Utorid(String);

impl Utorid {
    pub const MIN_LEN: usize = 7;
    pub const MAX_LEN: usize = 8;

    pub fn new(value: impl Into<String>) -> Result<Self, UtoridError> {
        let value = value.into();
        let len = value.chars().count();
        if !(Self::MIN_LEN..=Self::MAX_LEN).contains(&len) {
            return Err(UtoridError::Length(len));
        }
        if !value.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(UtoridError::Charset);
        }
        Ok(Self(value))
    }

    /// Wrap a value that was already validated on the way into storage
    pub fn new_unchecked(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn into_inner(self) -> String {
        self.0
    }
}

impl fmt::Display for Utorid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Utorid {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

impl std::str::FromStr for Utorid {
    type Err = UtoridError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

impl<'de> Deserialize<'de> for Utorid {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let raw = String::deserialize(deserializer)?;
        Self::new(raw).map_err(serde::de::Error::custom)
    }
}
