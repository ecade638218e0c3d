//! Request DTOs for API endpoints
//!
//! All request DTOs implement `Deserialize`; those with field constraints
//! also implement `Validate`.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Deserializer};
use validator::Validate;

use loyalty_core::{
    EventId, PromotionId, PromotionKind, Role, TransactionId, TransactionKind, UserId, Utorid,
};

use crate::services::{ServiceError, ServiceResult};

/// Distinguishes an absent field from an explicit `null`
fn double_option<'de, T, D>(deserializer: D) -> Result<Option<Option<T>>, D::Error>
where
    T: Deserialize<'de>,
    D: Deserializer<'de>,
{
    Option::<T>::deserialize(deserializer).map(Some)
}

// ============================================================================
// Paging
// ============================================================================

/// `page`/`limit` query parameters, both 1-based and positive
#[derive(Debug, Clone, Copy, Default, Deserialize)]
pub struct Pagination {
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl Pagination {
    pub const DEFAULT_LIMIT: i64 = 10;
    pub const MAX_LIMIT: i64 = 100;

    /// Resolve to `(limit, offset)`
    pub fn resolve(self) -> ServiceResult<(i64, i64)> {
        let page = self.page.unwrap_or(1);
        let limit = self.limit.unwrap_or(Self::DEFAULT_LIMIT);
        if page < 1 || limit < 1 {
            return Err(ServiceError::validation("page and limit must be positive integers"));
        }
        let limit = limit.min(Self::MAX_LIMIT);
        Ok((limit, (page - 1).saturating_mul(limit)))
    }
}

// ============================================================================
// Transaction Requests
// ============================================================================

/// Purchase recorded by a cashier
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct PurchaseRequest {
    pub utorid: Utorid,
    pub spent: Decimal,
    #[serde(default)]
    pub promotion_ids: Vec<PromotionId>,
    #[validate(length(max = 500, message = "Remark must be at most 500 characters"))]
    pub remark: Option<String>,
}

/// Manager correction tied to an earlier transaction
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct AdjustmentRequest {
    pub utorid: Utorid,
    #[validate(range(
        min = -1_000_000_000,
        max = 1_000_000_000,
        message = "amount must be between -1000000000 and 1000000000"
    ))]
    pub amount: i64,
    pub related_id: TransactionId,
    #[serde(default)]
    pub promotion_ids: Vec<PromotionId>,
    #[validate(length(max = 500, message = "Remark must be at most 500 characters"))]
    pub remark: Option<String>,
}

/// Points sent from the caller to another user
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub recipient_id: UserId,
    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "amount should be a positive integer up to 1000000000"
    ))]
    pub amount: i64,
    #[validate(length(max = 500, message = "Remark must be at most 500 characters"))]
    pub remark: Option<String>,
}

/// Pending request to spend the caller's points
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RedemptionRequest {
    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "amount should be a positive integer up to 1000000000"
    ))]
    pub amount: i64,
    #[validate(length(max = 500, message = "Remark must be at most 500 characters"))]
    pub remark: Option<String>,
}

/// Points from an event pool to one guest, or to every guest when `utorid` is absent
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct EventAwardRequest {
    pub event_id: EventId,
    pub utorid: Option<Utorid>,
    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "amount should be a positive integer up to 1000000000"
    ))]
    pub amount: i64,
    #[validate(length(max = 500, message = "Remark must be at most 500 characters"))]
    pub remark: Option<String>,
}

/// Any ledger-creating request, selected by its `type` field
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum TransactionRequest {
    Purchase(PurchaseRequest),
    Adjustment(AdjustmentRequest),
    Transfer(TransferRequest),
    Redemption(RedemptionRequest),
    #[serde(rename = "event")]
    EventAward(EventAwardRequest),
}

impl TransactionRequest {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Self::Purchase(_) => TransactionKind::Purchase,
            Self::Adjustment(_) => TransactionKind::Adjustment,
            Self::Transfer(_) => TransactionKind::Transfer,
            Self::Redemption(_) => TransactionKind::Redemption,
            Self::EventAward(_) => TransactionKind::Event,
        }
    }
}

impl Validate for TransactionRequest {
    fn validate(&self) -> Result<(), validator::ValidationErrors> {
        match self {
            Self::Purchase(r) => r.validate(),
            Self::Adjustment(r) => r.validate(),
            Self::Transfer(r) => r.validate(),
            Self::Redemption(r) => r.validate(),
            Self::EventAward(r) => r.validate(),
        }
    }
}

/// Body of the routes whose target (recipient, event) comes from the path
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScopedTransactionBody {
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    pub amount: i64,
    /// Event awards only
    pub utorid: Option<Utorid>,
    pub remark: Option<String>,
}

impl ScopedTransactionBody {
    fn ensure_kind(&self, kind: TransactionKind) -> ServiceResult<()> {
        if self.kind == kind {
            Ok(())
        } else {
            Err(ServiceError::validation(format!("type should be '{kind}'")))
        }
    }

    pub fn into_transfer(self, recipient_id: UserId) -> ServiceResult<TransactionRequest> {
        self.ensure_kind(TransactionKind::Transfer)?;
        Ok(TransactionRequest::Transfer(TransferRequest {
            recipient_id,
            amount: self.amount,
            remark: self.remark,
        }))
    }

    pub fn into_redemption(self) -> ServiceResult<TransactionRequest> {
        self.ensure_kind(TransactionKind::Redemption)?;
        Ok(TransactionRequest::Redemption(RedemptionRequest {
            amount: self.amount,
            remark: self.remark,
        }))
    }

    pub fn into_event_award(self, event_id: EventId) -> ServiceResult<TransactionRequest> {
        self.ensure_kind(TransactionKind::Event)?;
        Ok(TransactionRequest::EventAward(EventAwardRequest {
            event_id,
            utorid: self.utorid,
            amount: self.amount,
            remark: self.remark,
        }))
    }
}

/// `PATCH /transactions/:id/suspicious`
#[derive(Debug, Clone, Deserialize)]
pub struct SetSuspiciousRequest {
    pub suspicious: bool,
}

/// `PATCH /transactions/:id/processed`; only `true` is accepted
#[derive(Debug, Clone, Deserialize)]
pub struct ProcessRedemptionRequest {
    pub processed: bool,
}

/// Ledger listing filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionListQuery {
    /// Substring of the subject's utorid or name
    pub name: Option<String>,
    pub created_by: Option<Utorid>,
    pub suspicious: Option<bool>,
    pub promotion_id: Option<PromotionId>,
    #[serde(rename = "type")]
    pub kind: Option<TransactionKind>,
    pub related_id: Option<i64>,
    pub amount: Option<i64>,
    /// `gte` or `lte`, required with `amount`
    pub operator: Option<String>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl TransactionListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

// ============================================================================
// Promotion Requests
// ============================================================================

/// Create promotion request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreatePromotionRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 1000, message = "Description must be 1-1000 characters"))]
    pub description: String,

    #[serde(rename = "type")]
    pub kind: PromotionKind,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<Decimal>,
    pub rate: Option<Decimal>,

    #[validate(range(
        min = 0,
        max = 1_000_000_000,
        message = "points must be between 0 and 1000000000"
    ))]
    pub points: Option<i64>,
}

/// Update promotion request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdatePromotionRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 1000, message = "Description must be 1-1000 characters"))]
    pub description: Option<String>,

    #[serde(rename = "type")]
    pub kind: Option<PromotionKind>,

    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub min_spending: Option<Decimal>,
    pub rate: Option<Decimal>,

    #[validate(range(
        min = 0,
        max = 1_000_000_000,
        message = "points must be between 0 and 1000000000"
    ))]
    pub points: Option<i64>,
}

/// Promotion listing filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionListQuery {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: Option<PromotionKind>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl PromotionListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

// ============================================================================
// Event Requests
// ============================================================================

/// Create event request
#[derive(Debug, Clone, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateEventRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: String,

    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: String,

    #[validate(length(min = 1, max = 200, message = "Location must be 1-200 characters"))]
    pub location: String,

    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,

    #[validate(range(min = 1, message = "capacity must be a positive integer"))]
    pub capacity: Option<i32>,

    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "points must be a positive integer up to 1000000000"
    ))]
    pub points: i64,
}

/// Update event request; absent fields are left unchanged
#[derive(Debug, Clone, Default, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct UpdateEventRequest {
    #[validate(length(min = 1, max = 100, message = "Name must be 1-100 characters"))]
    pub name: Option<String>,

    #[validate(length(min = 1, max = 2000, message = "Description must be 1-2000 characters"))]
    pub description: Option<String>,

    #[validate(length(min = 1, max = 200, message = "Location must be 1-200 characters"))]
    pub location: Option<String>,

    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,

    /// `null` removes the limit
    #[serde(default, deserialize_with = "double_option")]
    pub capacity: Option<Option<i32>>,

    #[validate(range(
        min = 1,
        max = 1_000_000_000,
        message = "points must be a positive integer up to 1000000000"
    ))]
    pub points: Option<i64>,

    pub published: Option<bool>,
}

/// Event listing filters
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EventListQuery {
    pub name: Option<String>,
    pub location: Option<String>,
    pub started: Option<bool>,
    pub ended: Option<bool>,
    #[serde(default)]
    pub show_full: bool,
    pub published: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl EventListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Add an organizer or guest by utorid
#[derive(Debug, Clone, Deserialize)]
pub struct EventMemberRequest {
    pub utorid: Utorid,
}

// ============================================================================
// User Requests
// ============================================================================

/// Register a new account (cashier+)
#[derive(Debug, Clone, Deserialize, Validate)]
pub struct RegisterUserRequest {
    pub utorid: Utorid,

    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// Manager edit of another account
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,
    pub verified: Option<bool>,
    pub suspicious: Option<bool>,
    pub role: Option<Role>,
}

/// Owner edit of their own profile
#[derive(Debug, Clone, Default, Deserialize, Validate)]
pub struct UpdateMeRequest {
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    /// `YYYY-MM-DD`
    pub birthday: Option<NaiveDate>,
}

/// User listing filters (manager+)
#[derive(Debug, Clone, Default, Deserialize)]
pub struct UserListQuery {
    pub name: Option<String>,
    pub role: Option<Role>,
    pub verified: Option<bool>,
    pub activated: Option<bool>,
    pub page: Option<i64>,
    pub limit: Option<i64>,
}

impl UserListQuery {
    pub fn pagination(&self) -> Pagination {
        Pagination {
            page: self.page,
            limit: self.limit,
        }
    }
}

/// Change the caller's own password
#[derive(Debug, Clone, Deserialize)]
pub struct ChangePasswordRequest {
    #[serde(rename = "old")]
    pub current: String,
    #[serde(rename = "new")]
    pub replacement: String,
}

// ============================================================================
// Auth Requests
// ============================================================================

/// Exchange a utorid and password for a bearer token
#[derive(Debug, Clone, Deserialize)]
pub struct LoginRequest {
    pub utorid: Utorid,
    pub password: String,
}

/// Password reset request
#[derive(Debug, Clone, Deserialize)]
pub struct ResetRequest {
    pub utorid: Utorid,
}

/// Consume a reset token. The utorid must match the token's owner.
#[derive(Debug, Clone, Deserialize)]
pub struct ResetPasswordRequest {
    pub utorid: Utorid,
    pub password: String,
}
