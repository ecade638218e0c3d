//! Authenticated caller identity

use serde::{Deserialize, Serialize};

use super::{Role, UserId, Utorid};

/// Identity of the account performing an operation, already authenticated
/// by the transport layer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Caller {
    pub id: UserId,
    pub utorid: Utorid,
    pub role: Role,
}

impl Caller {
    pub fn new(id: UserId, utorid: Utorid, role: Role) -> Self {
        Self { id, utorid, role }
    }

    #[inline]
    pub fn is_at_least(&self, role: Role) -> bool {
        self.role.is_at_least(role)
    }
}
