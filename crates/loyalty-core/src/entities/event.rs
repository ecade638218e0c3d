//! Event entity - a campus event with its own points pool

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::value_objects::{EventId, UserId, Utorid};

/// Compact user reference embedded in event rosters
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UserSummary {
    pub id: UserId,
    pub utorid: Utorid,
    pub name: String,
}

/// Event entity.
///
/// `points_remain + points_awarded` only changes when a manager resizes the
/// pool; awards move points from one field to the other.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
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
    pub organizers: Vec<UserSummary>,
    pub guests: Vec<UserSummary>,
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Total pool size
    #[inline]
    pub fn points_total(&self) -> i64 {
        self.points_remain + self.points_awarded
    }

    #[inline]
    pub fn num_guests(&self) -> usize {
        self.guests.len()
    }

    /// Check whether the pool can cover an award of `total`
    #[inline]
    pub fn can_award(&self, total: i64) -> bool {
        total <= self.points_remain
    }

    pub fn is_full(&self) -> bool {
        self.capacity
            .is_some_and(|cap| self.guests.len() >= usize::try_from(cap).unwrap_or(0))
    }

    #[inline]
    pub fn has_started_at(&self, now: DateTime<Utc>) -> bool {
        self.start_time <= now
    }

    #[inline]
    pub fn has_ended_at(&self, now: DateTime<Utc>) -> bool {
        self.end_time <= now
    }

    pub fn is_organizer(&self, user_id: UserId) -> bool {
        self.organizers.iter().any(|o| o.id == user_id)
    }

    pub fn is_guest(&self, user_id: UserId) -> bool {
        self.guests.iter().any(|g| g.id == user_id)
    }

    pub fn guest_by_utorid(&self, utorid: &Utorid) -> Option<&UserSummary> {
        self.guests.iter().find(|g| &g.utorid == utorid)
    }
}

/// Input for creating an event
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewEvent {
    pub name: String,
    pub description: String,
    pub location: String,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub capacity: Option<i32>,
    pub points: i64,
}

/// Partial event update.
///
/// `capacity` is doubly optional: `Some(None)` clears the limit.
/// `points_total` resizes the pool; the remainder becomes
/// `points_total - points_awarded`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct EventUpdate {
    pub name: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start_time: Option<DateTime<Utc>>,
    pub end_time: Option<DateTime<Utc>>,
    pub capacity: Option<Option<i32>>,
    pub published: Option<bool>,
    pub points_total: Option<i64>,
}

impl EventUpdate {
    pub fn is_empty(&self) -> bool {
        *self == Self::default()
    }

    /// Fields that are frozen once the event has started
    pub fn touches_pre_start_fields(&self) -> bool {
        self.name.is_some()
            || self.description.is_some()
            || self.location.is_some()
            || self.start_time.is_some()
            || self.capacity.is_some()
    }

    pub fn apply_to(&self, event: &mut Event) {
        if let Some(name) = &self.name {
            event.name.clone_from(name);
        }
        if let Some(description) = &self.description {
            event.description.clone_from(description);
        }
        if let Some(location) = &self.location {
            event.location.clone_from(location);
        }
        if let Some(start) = self.start_time {
            event.start_time = start;
        }
        if let Some(end) = self.end_time {
            event.end_time = end;
        }
        if let Some(capacity) = self.capacity {
            event.capacity = capacity;
        }
        if let Some(published) = self.published {
            event.published = published;
        }
        if let Some(total) = self.points_total {
            event.points_remain = total - event.points_awarded;
        }
    }
}
