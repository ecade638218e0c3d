//! Transaction database model

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::FromRow;

/// Database model for transactions table, with promotion links aggregated
#[derive(Debug, Clone, FromRow)]
pub struct TransactionModel {
    pub id: i64,
    pub utorid: String,
    pub kind: String,
    pub spent: Option<Decimal>,
    pub amount: Option<i64>,
    pub earned: Option<i64>,
    pub related_id: Option<i64>,
    pub promotion_ids: Vec<i64>,
    pub suspicious: bool,
    pub processed_by: Option<String>,
    pub remark: String,
    pub created_by: String,
    pub created_at: DateTime<Utc>,
}

/// Columns generated by the database on insert
#[derive(Debug, Clone, Copy, FromRow)]
pub struct InsertedRow {
    pub id: i64,
    pub created_at: DateTime<Utc>,
}
