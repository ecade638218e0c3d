//! User entity - a loyalty account

use chrono::{DateTime, NaiveDate, Utc};

use crate::value_objects::{Role, UserId, Utorid};

/// Loyalty account. `points` is only ever changed through a ledger commit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub utorid: Utorid,
    pub name: String,
    pub email: String,
    pub birthday: Option<NaiveDate>,
    pub role: Role,
    pub points: i64,
    pub verified: bool,
    pub suspicious: bool,
    pub reset_token: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    /// Set on every successful login; `None` until the account is activated
    pub last_login: Option<DateTime<Utc>>,
}

impl User {
    /// Check whether the balance covers a debit of `amount`
    #[inline]
    pub fn can_afford(&self, amount: i64) -> bool {
        self.points >= amount
    }

    /// Check if the account is at least a cashier
    #[inline]
    pub fn is_staff(&self) -> bool {
        self.role.is_at_least(Role::Cashier)
    }

    /// An account is activated once it has logged in
    #[inline]
    pub fn is_activated(&self) -> bool {
        self.last_login.is_some()
    }

    /// Whether the reset token has run out at `now`
    pub fn reset_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.reset_expires_at.is_none_or(|expires| expires <= now)
    }
}

/// Registration input
#[derive(Debug, Clone)]
pub struct NewUser {
    pub utorid: Utorid,
    pub name: String,
    pub email: String,
    pub reset_token: String,
    pub reset_expires_at: DateTime<Utc>,
}

/// Profile changes. Managers set verification, suspicion and role; the
/// owner sets name and birthday. `None` leaves the field untouched.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UserUpdate {
    pub name: Option<String>,
    pub email: Option<String>,
    pub birthday: Option<NaiveDate>,
    pub verified: Option<bool>,
    pub suspicious: Option<bool>,
    pub role: Option<Role>,
}

impl UserUpdate {
    pub fn is_empty(&self) -> bool {
        self.name.is_none()
            && self.email.is_none()
            && self.birthday.is_none()
            && self.verified.is_none()
            && self.suspicious.is_none()
            && self.role.is_none()
    }

    /// Apply the patch to an in-memory copy
    pub fn apply_to(&self, user: &mut User) {
        if let Some(name) = &self.name {
            user.name.clone_from(name);
        }
        if let Some(email) = &self.email {
            user.email.clone_from(email);
        }
        if self.birthday.is_some() {
            user.birthday = self.birthday;
        }
        if let Some(verified) = self.verified {
            user.verified = verified;
        }
        if let Some(suspicious) = self.suspicious {
            user.suspicious = suspicious;
        }
        if let Some(role) = self.role {
            user.role = role;
        }
    }
}
