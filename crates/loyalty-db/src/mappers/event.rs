//! Event model -> entity mapper

use std::collections::HashMap;

use loyalty_core::entities::{Event, UserSummary};
use loyalty_core::value_objects::EventId;

use crate::models::{EventModel, RosterModel};

/// Build an Event from its row and rosters
pub fn event_with_rosters(
    model: EventModel,
    organizers: Vec<UserSummary>,
    guests: Vec<UserSummary>,
) -> Event {
    Event {
        id: EventId::new(model.id),
        name: model.name,
        description: model.description,
        location: model.location,
        start_time: model.start_time,
        end_time: model.end_time,
        capacity: model.capacity,
        points_remain: model.points_remain,
        points_awarded: model.points_awarded,
        published: model.published,
        organizers,
        guests,
        created_at: model.created_at,
    }
}

/// Group roster rows fetched for several events by event id
pub fn split_rosters(rows: Vec<RosterModel>) -> HashMap<i64, Vec<UserSummary>> {
    let mut grouped: HashMap<i64, Vec<UserSummary>> = HashMap::new();
    for row in rows {
        grouped.entry(row.event_id).or_default().push(row.into());
    }
    grouped
}
