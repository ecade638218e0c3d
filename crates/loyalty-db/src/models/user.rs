//! User database model

use chrono::{DateTime, NaiveDate, Utc};
use sqlx::FromRow;

/// Database model for users table
#[derive(Debug, Clone, FromRow)]
pub struct UserModel {
    pub id: i64,
    pub utorid: String,
    pub name: String,
    pub email: String,
    pub birthday: Option<NaiveDate>,
    pub role: String,
    pub points: i64,
    pub verified: bool,
    pub suspicious: bool,
    pub reset_token: Option<String>,
    pub reset_expires_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub last_login: Option<DateTime<Utc>>,
}
