//! Promotion entity - a time-boxed points bonus

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::value_objects::PromotionId;

/// Promotion type. One-time promotions are tracked per user.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PromotionKind {
    #[serde(rename = "automatic")]
    Automatic,
    #[serde(rename = "one-time")]
    OneTime,
}

impl PromotionKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Automatic => "automatic",
            Self::OneTime => "one-time",
        }
    }
}

impl fmt::Display for PromotionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for PromotionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "automatic" => Ok(Self::Automatic),
            "one-time" | "onetime" => Ok(Self::OneTime),
            other => Err(format!("unknown promotion type: {other}")),
        }
    }
}

/// Promotion entity
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Promotion {
    pub id: PromotionId,
    pub name: String,
    pub description: String,
    pub kind: PromotionKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub points: Option<i64>,
}

impl Promotion {
    /// Visible as running: `start <= now <= end`
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now <= self.end_time
    }

    /// Can still be applied to a purchase: `start <= now < end`
    pub fn is_available_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now && now < self.end_time
    }

    #[inline]
    pub fn has_started_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }

    #[inline]
    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.end_time
    }

    #[inline]
    pub fn is_one_time(&self) -> bool {
        self.kind == PromotionKind::OneTime
    }

    /// A purchase of `spent` satisfies the minimum spending, if any
    pub fn accepts_spending(&self, spent: Decimal) -> bool {
        self.min_spending.is_none_or(|min| spent >= min)
    }
}

/// Input for creating a promotion
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewPromotion {
    pub name: String,
    pub description: String,
    pub kind: PromotionKind,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub min_spending: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub points: Option<i64>,
}

/// Partial promotion update
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PromotionUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub kind: Option<PromotionKind>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub min_spending: Option<Decimal>,
    pub rate: Option<Decimal>,
    pub points: Option<i64>,
}

impl PromotionUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// True when the patch touches a field frozen once the promotion ended
    pub fn touches_terms(&self) -> bool {
        self.start_time.is_some()
            || self.end_time.is_some()
            || self.min_spending.is_some()
            || self.rate.is_some()
            || self.points.is_some()
    }

    pub fn apply_to(&self, promotion: &mut Promotion) {
        if let Some(name) = &self.name {
            promotion.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            promotion.description.clone_from(description);
        }
        if let Some(kind) = self.kind {
            promotion.kind = kind;
        }
        if let Some(start) = self.start_time {
            promotion.start_time = start;
        }
        if let Some(end) = self.end_time {
            promotion.end_time = end;
        }
        if self.min_spending.is_some() {
            promotion.min_spending = self.min_spending;
        }
        if self.rate.is_some() {
            promotion.rate = self.rate;
        }
        if self.points.is_some() {
            promotion.points = self.points;
        }
    }
}
