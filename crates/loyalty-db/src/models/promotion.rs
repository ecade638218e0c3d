//! Promotion database model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// Database model for promotions table
#[derive(Debug, Clone, FromRow)]
pub struct PromotionModel {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub kind: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub points: Option<i64>,
}
