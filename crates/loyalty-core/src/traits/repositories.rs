//! Repository traits (ports) - define the interface for data access
//!
//! These traits follow the Repository pattern from Domain-Driven Design.
//! The domain layer defines what it needs, and the infrastructure layer
//! provides the implementation.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::entities::{
    Event, EventUpdate, NewEvent, NewPromotion, NewUser, Promotion, PromotionKind,
    PromotionUpdate, Transaction, User, UserSummary, UserUpdate,
};
use crate::error::DomainError;
use crate::ledger::{LedgerCommit, TransactionFilter};
use crate::value_objects::{EventId, PromotionId, Role, TransactionId, UserId, Utorid};

/// Result type for repository operations
pub type RepoResult<T> = Result<T, DomainError>;

// ============================================================================
// User Repository
// ============================================================================

/// User listing options
#[derive(Debug, Clone)]
pub struct UserQuery {
    /// Case-insensitive substring of the utorid or name
    pub name: Option<String>,
    pub role: Option<Role>,
    pub verified: Option<bool>,
    pub activated: Option<bool>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for UserQuery {
    fn default() -> Self {
        Self {
            name: None,
            role: None,
            verified: None,
            activated: None,
            limit: 10,
            offset: 0,
        }
    }
}

impl UserQuery {
    pub fn matches(&self, user: &User) -> bool {
        if let Some(name) = &self.name {
            let needle = name.to_lowercase();
            if !user.utorid.as_str().to_lowercase().contains(&needle)
                && !user.name.to_lowercase().contains(&needle)
            {
                return false;
            }
        }
        if self.role.is_some_and(|r| r != user.role) {
            return false;
        }
        if self.verified.is_some_and(|v| v != user.verified) {
            return false;
        }
        if self.activated.is_some_and(|a| a != user.is_activated()) {
            return false;
        }
        true
    }
}

#[async_trait]
pub trait UserRepository: Send + Sync {
    /// Find user by ID
    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>>;

    /// Find user by utorid
    async fn find_by_utorid(&self, utorid: &Utorid) -> RepoResult<Option<User>>;

    /// Find user by email
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>>;

    /// Utorids whose name or utorid contains `needle` (case-insensitive)
    async fn search_utorids(&self, needle: &str) -> RepoResult<Vec<Utorid>>;

    /// One page of users matching `query`, ordered by id
    async fn list(&self, query: &UserQuery) -> RepoResult<Vec<User>>;

    /// Total users matching `query`, ignoring paging
    async fn count(&self, query: &UserQuery) -> RepoResult<i64>;

    /// Find the user holding a reset or activation token
    async fn find_by_reset_token(&self, token: &str) -> RepoResult<Option<User>>;

    /// Create a new user with a zero balance
    async fn create(&self, user: &NewUser) -> RepoResult<User>;

    /// Apply a profile patch. Balances are not touched here.
    async fn update(&self, id: UserId, update: &UserUpdate) -> RepoResult<User>;

    /// Replace the password reset token
    async fn set_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()>;

    /// Stored password hash; `None` until a password has been set
    async fn get_password_hash(&self, id: UserId) -> RepoResult<Option<String>>;

    /// Replace the password hash
    async fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<()>;

    /// Store a new password hash and expire the reset token at `now`, in one
    /// write. Fails with `ResetTokenExpired` if the token ran out first.
    async fn consume_reset_token(
        &self,
        id: UserId,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<()>;

    /// Stamp a successful login
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> RepoResult<()>;
}

// ============================================================================
// Promotion Repository
// ============================================================================

/// Promotion listing options
#[derive(Debug, Clone)]
pub struct PromotionQuery {
    pub name: Option<String>,
    pub kind: Option<PromotionKind>,
    /// Only promotions with `start <= now <= end`
    pub active_only: bool,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    pub now: DateTime<Utc>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for PromotionQuery {
    fn default() -> Self {
        Self {
            name: None,
            kind: None,
            active_only: false,
            started: None,
            ended: None,
            now: Utc::now(),
            limit: 10,
            offset: 0,
        }
    }
}

impl PromotionQuery {
    pub fn matches(&self, promotion: &Promotion) -> bool {
        if let Some(name) = &self.name {
            if !promotion.name.to_lowercase().contains(&name.to_lowercase()) {
                return false;
            }
        }
        if self.kind.is_some_and(|k| k != promotion.kind) {
            return false;
        }
        if self.active_only && !promotion.is_active_at(self.now) {
            return false;
        }
        if self.started.is_some_and(|s| s != promotion.has_started_at(self.now)) {
            return false;
        }
        if self.ended.is_some_and(|e| e != promotion.has_ended_at(self.now)) {
            return false;
        }
        true
    }
}

#[async_trait]
pub trait PromotionRepository: Send + Sync {
    /// Find promotion by ID
    async fn find_by_id(&self, id: PromotionId) -> RepoResult<Option<Promotion>>;

    /// List promotions ordered by end time
    async fn list(&self, query: &PromotionQuery) -> RepoResult<Vec<Promotion>>;

    /// Count promotions matching the query, ignoring paging
    async fn count(&self, query: &PromotionQuery) -> RepoResult<i64>;

    /// Promotions with `start <= now < end`
    async fn list_available(&self, now: DateTime<Utc>) -> RepoResult<Vec<Promotion>>;

    /// One-time promotions this user has consumed
    async fn used_promotion_ids(&self, user_id: UserId) -> RepoResult<Vec<PromotionId>>;

    /// Check whether the user has consumed a one-time promotion
    async fn has_usage(&self, user_id: UserId, promotion_id: PromotionId) -> RepoResult<bool>;

    /// Record a usage. A duplicate pair fails with `PromotionAlreadyUsed`.
    async fn record_usage(&self, user_id: UserId, promotion_id: PromotionId) -> RepoResult<()>;

    /// Create a new promotion
    async fn create(&self, promotion: &NewPromotion) -> RepoResult<Promotion>;

    /// Apply a partial update
    async fn update(&self, id: PromotionId, update: &PromotionUpdate) -> RepoResult<Promotion>;

    /// Hard delete
    async fn delete(&self, id: PromotionId) -> RepoResult<()>;
}

// ============================================================================
// Event Repository
// ============================================================================

/// Event listing options
#[derive(Debug, Clone)]
pub struct EventQuery {
    pub name: Option<String>,
    pub location: Option<String>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    pub published: Option<bool>,
    /// Include events that are at capacity
    pub show_full: bool,
    pub now: DateTime<Utc>,
    pub limit: i64,
    pub offset: i64,
}

impl Default for EventQuery {
    fn default() -> Self {
        Self {
            name: None,
            location: None,
            started: None,
            ended: None,
            published: None,
            show_full: false,
            now: Utc::now(),
            limit: 10,
            offset: 0,
        }
    }
}

impl EventQuery {
    pub fn matches(&self, event: &Event) -> bool {
        let contains = |haystack: &str, needle: &Option<String>| {
            needle
                .as_ref()
                .is_none_or(|n| haystack.to_lowercase().contains(&n.to_lowercase()))
        };
        if !contains(&event.name, &self.name) || !contains(&event.location, &self.location) {
            return false;
        }
        if self.started.is_some_and(|s| s != event.has_started_at(self.now)) {
            return false;
        }
        if self.ended.is_some_and(|e| e != event.has_ended_at(self.now)) {
            return false;
        }
        if self.published.is_some_and(|p| p != event.published) {
            return false;
        }
        self.show_full || !event.is_full()
    }
}

#[async_trait]
pub trait EventRepository: Send + Sync {
    /// Find event by ID, rosters included
    async fn find_by_id(&self, id: EventId) -> RepoResult<Option<Event>>;

    /// List events ordered by start time
    async fn list(&self, query: &EventQuery) -> RepoResult<Vec<Event>>;

    /// Count events matching the query, ignoring paging
    async fn count(&self, query: &EventQuery) -> RepoResult<i64>;

    /// Create a new event with its full pool remaining
    async fn create(&self, event: &NewEvent) -> RepoResult<Event>;

    /// Apply a partial update. A pool resize below `points_awarded`
    /// fails with `PointsBelowAwarded`.
    async fn update(&self, id: EventId, update: &EventUpdate) -> RepoResult<Event>;

    /// Hard delete
    async fn delete(&self, id: EventId) -> RepoResult<()>;

    /// Add an organizer
    async fn add_organizer(&self, id: EventId, user_id: UserId) -> RepoResult<()>;

    /// Remove an organizer
    async fn remove_organizer(&self, id: EventId, user_id: UserId) -> RepoResult<()>;

    /// Add a guest, re-checking capacity atomically (`EventFull`)
    async fn add_guest(&self, id: EventId, user_id: UserId) -> RepoResult<()>;

    /// Remove a guest
    async fn remove_guest(&self, id: EventId, user_id: UserId) -> RepoResult<()>;

    /// Current guest roster
    async fn list_guests(&self, id: EventId) -> RepoResult<Vec<UserSummary>>;

    /// Check whether the user organizes the event
    async fn is_organizer(&self, id: EventId, user_id: UserId) -> RepoResult<bool>;
}

// ============================================================================
// Ledger Repository
// ============================================================================

#[async_trait]
pub trait LedgerRepository: Send + Sync {
    /// Find a ledger row by ID
    async fn find_by_id(&self, id: TransactionId) -> RepoResult<Option<Transaction>>;

    /// Rows matching the filter, newest first
    async fn query(&self, filter: &TransactionFilter) -> RepoResult<Vec<Transaction>>;

    /// Count rows matching the filter, ignoring paging
    async fn count(&self, filter: &TransactionFilter) -> RepoResult<i64>;

    /// Apply a commit plan as one unit of work and return the appended rows
    /// in plan order. Nothing is written if any guard fails.
    async fn commit(&self, commit: LedgerCommit) -> RepoResult<Vec<Transaction>>;
}
