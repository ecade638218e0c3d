//! Domain errors - error types for the domain layer

use thiserror::Error;

use crate::value_objects::{EventId, PromotionId, Role, TransactionId, Utorid};

/// Coarse error taxonomy. Transports map each kind to one wire status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    NotFound,
    InvalidInput,
    Forbidden,
    Conflict,
    StateConflict,
    Internal,
}

/// Domain layer errors
#[derive(Debug, Error)]
pub enum DomainError {
    // =========================================================================
    // Not Found Errors
    // =========================================================================
    #[error("User not found: {0}")]
    UserNotFound(String),

    #[error("Transaction not found: {0}")]
    TransactionNotFound(TransactionId),

    #[error("Promotion not found: {0}")]
    PromotionNotFound(PromotionId),

    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    #[error("User is not a guest of this event")]
    GuestNotFound,

    #[error("User is not an organizer of this event")]
    OrganizerNotFound,

    #[error("Reset token not found")]
    ResetTokenNotFound,

    // =========================================================================
    // Validation Errors
    // =========================================================================
    #[error("Validation error: {0}")]
    ValidationError(String),

    #[error("Invalid amount: {0}")]
    InvalidAmount(String),

    #[error("endTime must be after startTime")]
    InvalidTimeRange,

    #[error("{0} cannot be in the past")]
    TimeInPast(&'static str),

    #[error("Cannot transfer points to yourself")]
    SelfTransfer,

    #[error("Transaction {0} is not a redemption")]
    NotARedemption(TransactionId),

    #[error("{0} is not a guest of this event")]
    NotAGuest(Utorid),

    #[error("Promotion {0} listed more than once")]
    DuplicatePromotion(PromotionId),

    #[error("A suspicious user cannot be made a cashier")]
    SuspiciousCashier,

    #[error("Capacity cannot be below the current number of guests ({0})")]
    CapacityBelowGuests(usize),

    #[error("Points total cannot be below the {0} points already awarded")]
    PointsBelowAwarded(i64),

    #[error("Nothing to update")]
    EmptyUpdate,

    // =========================================================================
    // Authorization Errors
    // =========================================================================
    #[error("Requires role {0} or higher")]
    MissingRole(Role),

    #[error("Not an organizer of this event")]
    NotOrganizer,

    #[error("Account is not verified")]
    Unverified,

    #[error("Only managers can change {0}")]
    ManagerOnlyField(&'static str),

    #[error("Cannot assign role {0}")]
    CannotAssignRole(Role),

    #[error("Current password is incorrect")]
    IncorrectPassword,

    // =========================================================================
    // Conflict Errors
    // =========================================================================
    #[error("Insufficient points: have {available}, need {required}")]
    InsufficientPoints { available: i64, required: i64 },

    #[error("Event pool exhausted: {remaining} points remain, {requested} requested")]
    PoolExhausted { remaining: i64, requested: i64 },

    #[error("Minimum spending not met for promotion {0}")]
    MinSpendingNotMet(PromotionId),

    #[error("Redemption {0} has already been processed")]
    RedemptionAlreadyProcessed(TransactionId),

    #[error("Promotion {0} has already been used")]
    PromotionAlreadyUsed(PromotionId),

    #[error("Event is at full capacity")]
    EventFull,

    #[error("Utorid already in use")]
    UtoridAlreadyExists,

    #[error("Email already in use")]
    EmailAlreadyExists,

    #[error("User is already a guest of this event")]
    AlreadyGuest,

    #[error("User is already an organizer of this event")]
    AlreadyOrganizer,

    #[error("Concurrent modification detected, retry the request")]
    StaleWrite,

    // =========================================================================
    // State Conflicts
    // =========================================================================
    #[error("Promotion {0} is not currently active")]
    PromotionNotActive(PromotionId),

    #[error("Promotion has already started")]
    PromotionStarted,

    #[error("Promotion has already ended")]
    PromotionEnded,

    #[error("Event has ended")]
    EventEnded,

    #[error("Event has already started")]
    EventStarted,

    #[error("Event is already published")]
    EventPublished,

    #[error("Reset token has expired")]
    ResetTokenExpired,

    // =========================================================================
    // Infrastructure Errors (wrapped)
    // =========================================================================
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Internal error: {0}")]
    InternalError(String),
}

impl DomainError {
    /// Get an error code string for API responses
    pub fn code(&self) -> &'static str {
        match self {
            // Not Found
            Self::UserNotFound(_) => "UNKNOWN_USER",
            Self::TransactionNotFound(_) => "UNKNOWN_TRANSACTION",
            Self::PromotionNotFound(_) => "UNKNOWN_PROMOTION",
            Self::EventNotFound(_) => "UNKNOWN_EVENT",
            Self::GuestNotFound => "UNKNOWN_GUEST",
            Self::OrganizerNotFound => "UNKNOWN_ORGANIZER",
            Self::ResetTokenNotFound => "UNKNOWN_RESET_TOKEN",

            // Validation
            Self::ValidationError(_) => "VALIDATION_ERROR",
            Self::InvalidAmount(_) => "INVALID_AMOUNT",
            Self::InvalidTimeRange => "INVALID_TIME_RANGE",
            Self::TimeInPast(_) => "TIME_IN_PAST",
            Self::SelfTransfer => "SELF_TRANSFER",
            Self::NotARedemption(_) => "NOT_A_REDEMPTION",
            Self::NotAGuest(_) => "NOT_A_GUEST",
            Self::DuplicatePromotion(_) => "DUPLICATE_PROMOTION",
            Self::SuspiciousCashier => "SUSPICIOUS_CASHIER",
            Self::CapacityBelowGuests(_) => "CAPACITY_BELOW_GUESTS",
            Self::PointsBelowAwarded(_) => "POINTS_BELOW_AWARDED",
            Self::EmptyUpdate => "EMPTY_UPDATE",

            // Authorization
            Self::MissingRole(_) => "MISSING_ROLE",
            Self::NotOrganizer => "NOT_ORGANIZER",
            Self::Unverified => "UNVERIFIED",
            Self::ManagerOnlyField(_) => "MANAGER_ONLY_FIELD",
            Self::CannotAssignRole(_) => "CANNOT_ASSIGN_ROLE",
            Self::IncorrectPassword => "INCORRECT_PASSWORD",

            // Conflict
            Self::InsufficientPoints { .. } => "INSUFFICIENT_POINTS",
            Self::PoolExhausted { .. } => "POOL_EXHAUSTED",
            Self::MinSpendingNotMet(_) => "MIN_SPENDING_NOT_MET",
            Self::RedemptionAlreadyProcessed(_) => "ALREADY_PROCESSED",
            Self::PromotionAlreadyUsed(_) => "PROMOTION_ALREADY_USED",
            Self::EventFull => "EVENT_FULL",
            Self::UtoridAlreadyExists => "UTORID_ALREADY_EXISTS",
            Self::EmailAlreadyExists => "EMAIL_ALREADY_EXISTS",
            Self::AlreadyGuest => "ALREADY_GUEST",
            Self::AlreadyOrganizer => "ALREADY_ORGANIZER",
            Self::StaleWrite => "STALE_WRITE",

            // State
            Self::PromotionNotActive(_) => "PROMOTION_NOT_ACTIVE",
            Self::PromotionStarted => "PROMOTION_STARTED",
            Self::PromotionEnded => "PROMOTION_ENDED",
            Self::EventEnded => "EVENT_ENDED",
            Self::EventStarted => "EVENT_STARTED",
            Self::EventPublished => "EVENT_PUBLISHED",
            Self::ResetTokenExpired => "RESET_TOKEN_EXPIRED",

            // Infrastructure
            Self::DatabaseError(_) => "DATABASE_ERROR",
            Self::InternalError(_) => "INTERNAL_ERROR",
        }
    }

    /// Taxonomy bucket for this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UserNotFound(_)
            | Self::TransactionNotFound(_)
            | Self::PromotionNotFound(_)
            | Self::EventNotFound(_)
            | Self::GuestNotFound
            | Self::OrganizerNotFound
            | Self::ResetTokenNotFound => ErrorKind::NotFound,

            Self::ValidationError(_)
            | Self::InvalidAmount(_)
            | Self::InvalidTimeRange
            | Self::TimeInPast(_)
            | Self::SelfTransfer
            | Self::NotARedemption(_)
            | Self::NotAGuest(_)
            | Self::DuplicatePromotion(_)
            | Self::SuspiciousCashier
            | Self::CapacityBelowGuests(_)
            | Self::PointsBelowAwarded(_)
            | Self::EmptyUpdate => ErrorKind::InvalidInput,

            Self::MissingRole(_)
            | Self::NotOrganizer
            | Self::Unverified
            | Self::ManagerOnlyField(_)
            | Self::CannotAssignRole(_)
            | Self::IncorrectPassword => ErrorKind::Forbidden,

            Self::InsufficientPoints { .. }
            | Self::PoolExhausted { .. }
            | Self::MinSpendingNotMet(_)
            | Self::RedemptionAlreadyProcessed(_)
            | Self::PromotionAlreadyUsed(_)
            | Self::EventFull
            | Self::UtoridAlreadyExists
            | Self::EmailAlreadyExists
            | Self::AlreadyGuest
            | Self::AlreadyOrganizer
            | Self::StaleWrite => ErrorKind::Conflict,

            Self::PromotionNotActive(_)
            | Self::PromotionStarted
            | Self::PromotionEnded
            | Self::EventEnded
            | Self::EventStarted
            | Self::EventPublished
            | Self::ResetTokenExpired => ErrorKind::StateConflict,

            Self::DatabaseError(_) | Self::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Check if this is a "not found" error
    pub fn is_not_found(&self) -> bool {
        self.kind() == ErrorKind::NotFound
    }

    /// Check if this is a validation error
    pub fn is_validation(&self) -> bool {
        self.kind() == ErrorKind::InvalidInput
    }

    /// Check if this is an authorization error
    pub fn is_authorization(&self) -> bool {
        self.kind() == ErrorKind::Forbidden
    }

    /// Check if this is a conflict error
    pub fn is_conflict(&self) -> bool {
        self.kind() == ErrorKind::Conflict
    }

    /// Check if the target is in a lifecycle state that forbids the operation
    pub fn is_state_conflict(&self) -> bool {
        self.kind() == ErrorKind::StateConflict
    }
}
