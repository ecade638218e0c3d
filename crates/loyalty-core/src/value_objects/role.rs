//! Account roles, ordered by clearance

use serde::{Deserialize, Serialize};
use std::fmt;

/// Role of an account. Variants are declared in increasing clearance so the
/// derived ordering can be used for "at least" checks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Regular,
    Cashier,
    Manager,
    Superuser,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Regular => "regular",
            Self::Cashier => "cashier",
            Self::Manager => "manager",
            Self::Superuser => "superuser",
        }
    }

    /// True when this role has at least the clearance of `required`
    #[inline]
    pub fn is_at_least(&self, required: Role) -> bool {
        *self >= required
    }

    /// Manager or superuser
    #[inline]
    pub fn is_manager(&self) -> bool {
        self.is_at_least(Role::Manager)
    }

    /// Roles this role may hand out when editing another account
    pub fn can_assign(&self, target: Role) -> bool {
        match self {
            Self::Superuser => true,
            Self::Manager => matches!(target, Self::Regular | Self::Cashier),
            Self::Regular | Self::Cashier => false,
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "regular" => Ok(Self::Regular),
            "cashier" => Ok(Self::Cashier),
            "manager" => Ok(Self::Manager),
            "superuser" => Ok(Self::Superuser),
            other => Err(format!("unknown role: {other}")),
        }
    }
}
