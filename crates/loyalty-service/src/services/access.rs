//! Role checks shared by the services

use loyalty_core::{Caller, DomainError, Role};

use super::error::ServiceResult;

/// Fail with `MissingRole` unless the caller holds `role` or higher
pub fn require_role(caller: &Caller, role: Role) -> ServiceResult<()> {
    if caller.is_at_least(role) {
        Ok(())
    } else {
        Err(DomainError::MissingRole(role).into())
    }
}

#[inline]
pub fn is_manager(caller: &Caller) -> bool {
    caller.is_at_least(Role::Manager)
}
