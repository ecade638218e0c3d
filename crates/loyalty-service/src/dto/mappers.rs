//! Entity to DTO mappers
//!
//! Implements `From` conversions from domain entities to response DTOs.

use loyalty_core::{Event, Promotion, Transaction, User};

use super::responses::{
    CashierUserResponse, EventMemberResponse, EventResponse, EventSummaryResponse,
    PromotionResponse, TransactionResponse, UserListItem, UserResponse,
};

// ============================================================================
// Transaction Mappers
// ============================================================================

impl From<&Transaction> for TransactionResponse {
    fn from(tx: &Transaction) -> Self {
        Self {
            id: tx.id,
            utorid: tx.utorid.clone(),
            kind: tx.kind,
            spent: tx.spent,
            amount: tx.amount,
            earned: tx.earned,
            related_id: tx.related_id,
            promotion_ids: tx.promotion_ids.clone(),
            suspicious: tx.suspicious,
            processed_by: tx.processed_by.clone(),
            remark: tx.remark.clone(),
            created_by: tx.created_by.clone(),
            created_at: tx.created_at,
        }
    }
}

impl From<Transaction> for TransactionResponse {
    fn from(tx: Transaction) -> Self {
        Self::from(&tx)
    }
}

// ============================================================================
// Promotion Mappers
// ============================================================================

impl From<&Promotion> for PromotionResponse {
    fn from(promotion: &Promotion) -> Self {
        Self {
            id: promotion.id,
            name: promotion.name.clone(),
            description: promotion.description.clone(),
            kind: promotion.kind,
            start_time: promotion.start_time,
            end_time: promotion.end_time,
            min_spending: promotion.min_spending,
            rate: promotion.rate,
            points: promotion.points,
        }
    }
}

impl From<Promotion> for PromotionResponse {
    fn from(promotion: Promotion) -> Self {
        Self::from(&promotion)
    }
}

// ============================================================================
// Event Mappers
// ============================================================================

impl From<&Event> for EventResponse {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            name: event.name.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            capacity: event.capacity,
            points_remain: event.points_remain,
            points_awarded: event.points_awarded,
            published: event.published,
            organizers: event.organizers.iter().map(EventMemberResponse::from).collect(),
            guests: event.guests.iter().map(EventMemberResponse::from).collect(),
        }
    }
}

impl From<&Event> for EventSummaryResponse {
    fn from(event: &Event) -> Self {
        Self {
            id: event.id,
            name: event.name.clone(),
            description: event.description.clone(),
            location: event.location.clone(),
            start_time: event.start_time,
            end_time: event.end_time,
            capacity: event.capacity,
            num_guests: event.num_guests(),
            organizers: event.organizers.iter().map(EventMemberResponse::from).collect(),
        }
    }
}

// ============================================================================
// User Mappers
// ============================================================================

impl UserResponse {
    pub fn with_promotions(user: &User, promotions: &[Promotion]) -> Self {
        Self {
            id: user.id,
            utorid: user.utorid.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            birthday: user.birthday,
            role: user.role,
            points: user.points,
            verified: user.verified,
            suspicious: user.suspicious,
            created_at: user.created_at,
            last_login: user.last_login,
            promotions: promotions.iter().map(PromotionResponse::from).collect(),
        }
    }
}

impl From<&User> for UserListItem {
    fn from(user: &User) -> Self {
        Self {
            id: user.id,
            utorid: user.utorid.clone(),
            name: user.name.clone(),
            email: user.email.clone(),
            birthday: user.birthday,
            role: user.role,
            points: user.points,
            created_at: user.created_at,
            last_login: user.last_login,
            verified: user.verified,
        }
    }
}

impl CashierUserResponse {
    pub fn with_promotions(user: &User, promotions: &[Promotion]) -> Self {
        Self {
            id: user.id,
            utorid: user.utorid.clone(),
            name: user.name.clone(),
            points: user.points,
            verified: user.verified,
            promotions: promotions.iter().map(PromotionResponse::from).collect(),
        }
    }
}
