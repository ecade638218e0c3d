//! Response DTOs for API endpoints
//!
//! All response DTOs implement `Serialize` and use camelCase keys.

use chrono::{DateTime, NaiveDate, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use loyalty_core::{
    EventId, PromotionId, PromotionKind, Role, TransactionId, TransactionKind, UserId,
    UserSummary, Utorid,
};

// ============================================================================
// Common Response Types
// ============================================================================

/// One page of a listing plus the total match count
#[derive(Debug, Serialize)]
pub struct PageResponse<T> {
    pub count: i64,
    pub results: Vec<T>,
}

impl<T> PageResponse<T> {
    pub fn new(count: i64, results: Vec<T>) -> Self {
        Self { count, results }
    }
}

// ============================================================================
// Transaction Responses
// ============================================================================

/// Ledger row
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionResponse {
    pub id: TransactionId,
    pub utorid: Utorid,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub spent: Option<Decimal>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub earned: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub related_id: Option<i64>,
    pub promotion_ids: Vec<PromotionId>,
    pub suspicious: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub processed_by: Option<Utorid>,
    pub remark: String,
    pub created_by: Utorid,
    pub created_at: DateTime<Utc>,
}

// ============================================================================
// Promotion Responses
// ============================================================================

/// Promotion details
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionResponse {
    pub id: PromotionId,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub kind: PromotionKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub points: Option<i64>,
}

// ============================================================================
// Event Responses
// ============================================================================

/// Organizer or guest entry
#[derive(Debug, Clone, Serialize)]
pub struct EventMemberResponse {
    pub id: UserId,
    pub utorid: Utorid,
    pub name: String,
}

impl From<&UserSummary> for EventMemberResponse {
    fn from(summary: &UserSummary) -> Self {
        Self {
            id: summary.id,
            utorid: summary.utorid.clone(),
            name: summary.name.clone(),
        }
    }
}

/// Full event view for organizers and managers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventResponse {
    pub id: EventId,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub points_remain: i64,
    pub points_awarded: i64,
    pub published: bool,
    pub organizers: Vec<EventMemberResponse>,
    pub guests: Vec<EventMemberResponse>,
}

/// Public event view: no pool figures, guests reduced to a count
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct EventSummaryResponse {
    pub id: EventId,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub num_guests: usize,
    pub organizers: Vec<EventMemberResponse>,
}

/// Either view, decided per caller
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum EventView {
    Full(EventResponse),
    Summary(EventSummaryResponse),
}

/// Guest added to an event
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct GuestAddedResponse {
    pub id: EventId,
    pub name: String,
    pub location: String,
    pub guest_added: EventMemberResponse,
    pub num_guests: usize,
}

// ============================================================================
// User Responses
// ============================================================================

/// Full profile, visible to the user and to managers
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserResponse {
    pub id: UserId,
    pub utorid: Utorid,
    pub name: String,
    pub email: String,
    pub birthday: Option<NaiveDate>,
    pub role: Role,
    pub points: i64,
    pub verified: bool,
    pub suspicious: bool,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub promotions: Vec<PromotionResponse>,
}

/// One row of the manager user listing
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UserListItem {
    pub id: UserId,
    pub utorid: Utorid,
    pub name: String,
    pub email: String,
    pub birthday: Option<NaiveDate>,
    pub role: Role,
    pub points: i64,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
    pub verified: bool,
}

/// What a cashier sees when looking up a customer
#[derive(Debug, Clone, Serialize)]
pub struct CashierUserResponse {
    pub id: UserId,
    pub utorid: Utorid,
    pub name: String,
    pub points: i64,
    pub verified: bool,
    pub promotions: Vec<PromotionResponse>,
}

/// Either view, decided per caller
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum UserView {
    Full(UserResponse),
    Cashier(CashierUserResponse),
}

/// Freshly registered account with its activation token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RegisteredUserResponse {
    pub id: UserId,
    pub utorid: Utorid,
    pub name: String,
    pub email: String,
    pub verified: bool,
    pub expires_at: DateTime<Utc>,
    pub reset_token: String,
}

/// Result of a manager edit: the id, utorid and name plus every changed field
#[derive(Debug, Clone, Serialize)]
pub struct UpdatedUserResponse {
    pub id: UserId,
    pub utorid: Utorid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub verified: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suspicious: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<Role>,
}

/// Bearer token issued at login
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoginResponse {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Password reset token
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ResetTokenResponse {
    pub expires_at: DateTime<Utc>,
    pub reset_token: String,
}

/// Result of creating ledger rows: one row for most types, one per guest
/// for an event award to every guest
#[derive(Debug, Clone, Serialize)]
#[serde(untagged)]
pub enum TransactionOutcome {
    One(TransactionResponse),
    Many(Vec<TransactionResponse>),
}

impl TransactionOutcome {
    /// Rows in creation order
    pub fn rows(&self) -> &[TransactionResponse] {
        match self {
            Self::One(row) => std::slice::from_ref(row),
            Self::Many(rows) => rows,
        }
    }
}

impl From<TransactionResponse> for TransactionOutcome {
    fn from(row: TransactionResponse) -> Self {
        Self::One(row)
    }
}

// ============================================================================
// Health Responses
// ============================================================================

/// Liveness check body
#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
}

impl HealthResponse {
    pub fn healthy() -> Self {
        Self {
            status: "healthy".to_string(),
            timestamp: Utc::now(),
        }
    }
}

/// Readiness check body
#[derive(Debug, Clone, Serialize)]
pub struct ReadinessResponse {
    pub status: String,
    pub timestamp: DateTime<Utc>,
    pub checks: HealthChecks,
}

/// Per-dependency readiness
#[derive(Debug, Clone, Serialize)]
pub struct HealthChecks {
    /// `healthy`, `unhealthy`, or `in-memory` when no database is configured
    pub database: String,
}

impl ReadinessResponse {
    /// `database` is `None` when the store is in-memory
    pub fn ready(database: Option<bool>) -> Self {
        let (status, database) = match database {
            Some(true) => ("ready", "healthy"),
            Some(false) => ("not_ready", "unhealthy"),
            None => ("ready", "in-memory"),
        };
        Self {
            status: status.to_string(),
            timestamp: Utc::now(),
            checks: HealthChecks {
                database: database.to_string(),
            },
        }
    }

    pub fn is_ready(&self) -> bool {
        self.status == "ready"
    }
}
