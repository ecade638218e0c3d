//! Test fixtures and request bodies

use chrono::{Duration, Utc};
use serde_json::{json, Value};

/// A seeded account and its bearer token
#[derive(Debug, Clone)]
pub struct Account {
    pub id: i64,
    pub token: String,
}

pub fn purchase(utorid: &str, spent: f64, promotion_ids: &[i64]) -> Value {
    json!({
        "type": "purchase",
        "utorid": utorid,
        "spent": spent,
        "promotionIds": promotion_ids,
    })
}

pub fn transfer(amount: i64) -> Value {
    json!({ "type": "transfer", "amount": amount })
}

pub fn redemption(amount: i64) -> Value {
    json!({ "type": "redemption", "amount": amount })
}

pub fn award(amount: i64, utorid: Option<&str>) -> Value {
    match utorid {
        Some(utorid) => json!({ "type": "event", "amount": amount, "utorid": utorid }),
        None => json!({ "type": "event", "amount": amount }),
    }
}

/// An event starting tomorrow
pub fn new_event(points: i64, capacity: Option<i32>) -> Value {
    let start = Utc::now() + Duration::days(1);
    json!({
        "name": "Hack night",
        "description": "Snacks and side projects",
        "location": "BA2250",
        "startTime": start,
        "endTime": start + Duration::hours(4),
        "capacity": capacity,
        "points": points,
    })
}

/// An automatic promotion running from an hour ago until tomorrow
pub fn running_promotion(points: i64) -> Value {
    let now = Utc::now();
    json!({
        "name": "Double-double",
        "description": "Extra points on every purchase",
        "type": "automatic",
        "startTime": now - Duration::hours(1),
        "endTime": now + Duration::days(1),
        "points": points,
    })
}
