//! Event database models

use chrono::{DateTime, Utc};
use sqlx::FromRow;

/// Database model for events table
#[derive(Debug, Clone, FromRow)]
pub struct EventModel {
    pub id: i64,
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub points_remain: i64,
    pub points_awarded: i64,
    pub published: bool,
    pub created_at: DateTime<Utc>,
}

/// One organizer or guest joined with the user row
#[derive(Debug, Clone, FromRow)]
pub struct RosterModel {
    pub event_id: i64,
    pub id: i64,
    pub utorid: String,
    pub name: String,
}
