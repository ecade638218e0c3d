//! Event service
//!
//! Event lifecycle (create, publish, resize the pool, delete) and the two
//! rosters. Point awards go through the transaction service.

use chrono::Utc;
use tracing::{info, instrument};
use validator::Validate;

use loyalty_core::{
    Caller, DomainError, Event, EventId, EventQuery, EventUpdate, NewEvent, Role, User, UserId,
    Utorid,
};

use crate::dto::{
    CreateEventRequest, EventListQuery, EventMemberResponse, EventResponse,
    EventSummaryResponse, EventView, GuestAddedResponse, PageResponse, UpdateEventRequest,
};

use super::access::{is_manager, require_role};
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Event service
pub struct EventService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> EventService<'a> {
    /// Create a new EventService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create an unpublished event with a full pool (manager+)
    #[instrument(skip(self, request))]
    pub async fn create_event(
        &self,
        caller: &Caller,
        request: CreateEventRequest,
    ) -> ServiceResult<EventResponse> {
        require_role(caller, Role::Manager)?;
        request.validate()?;
        if request.end_time <= request.start_time {
            return Err(DomainError::InvalidTimeRange.into());
        }

        let event = self
            .ctx
            .event_repo()
            .create(&NewEvent {
                name: request.name,
                description: request.description,
                location: request.location,
                start_time: request.start_time,
                end_time: request.end_time,
                capacity: request.capacity,
                points: request.points,
            })
            .await?;

        info!(event_id = %event.id, points = event.points_remain, "Event created");
        Ok(EventResponse::from(&event))
    }

    /// Organizers and managers get the full view; everyone else only sees
    /// published events, with guests reduced to a count.
    #[instrument(skip(self))]
    pub async fn get_event(&self, caller: &Caller, event_id: EventId) -> ServiceResult<EventView> {
        let event = self.find(event_id).await?;
        if is_manager(caller) || event.is_organizer(caller.id) {
            return Ok(EventView::Full(EventResponse::from(&event)));
        }
        if !event.published {
            return Err(DomainError::EventNotFound(event_id).into());
        }
        Ok(EventView::Summary(EventSummaryResponse::from(&event)))
    }

    /// List events. Non-managers only see published ones.
    #[instrument(skip(self, query))]
    pub async fn list_events(
        &self,
        caller: &Caller,
        query: EventListQuery,
    ) -> ServiceResult<PageResponse<EventView>> {
        let (limit, offset) = query.pagination().resolve()?;
        if query.started.is_some() && query.ended.is_some() {
            return Err(ServiceError::validation("started and ended cannot both be set"));
        }
        let manager = is_manager(caller);

        let repo_query = EventQuery {
            name: query.name,
            location: query.location,
            started: query.started,
            ended: query.ended,
            published: if manager { query.published } else { Some(true) },
            show_full: query.show_full,
            now: Utc::now(),
            limit,
            offset,
        };
        let count = self.ctx.event_repo().count(&repo_query).await?;
        let events = self.ctx.event_repo().list(&repo_query).await?;

        let results = events
            .iter()
            .map(|e| {
                if manager {
                    EventView::Full(EventResponse::from(e))
                } else {
                    EventView::Summary(EventSummaryResponse::from(e))
                }
            })
            .collect();
        Ok(PageResponse::new(count, results))
    }

    /// Edit an event (organizer or manager+). Publishing and pool size are
    /// manager-only.
    #[instrument(skip(self, request))]
    pub async fn update_event(
        &self,
        caller: &Caller,
        event_id: EventId,
        request: UpdateEventRequest,
    ) -> ServiceResult<EventResponse> {
        request.validate()?;
        let event = self.find(event_id).await?;
        let manager = is_manager(caller);
        if !manager && !event.is_organizer(caller.id) {
            return Err(DomainError::NotOrganizer.into());
        }
        if !manager && request.published.is_some() {
            return Err(DomainError::ManagerOnlyField("published").into());
        }
        if !manager && request.points.is_some() {
            return Err(DomainError::ManagerOnlyField("points").into());
        }
        if request.published == Some(false) {
            return Err(ServiceError::validation("published can only be set to true"));
        }
        if let Some(Some(capacity)) = request.capacity {
            if capacity < 1 {
                return Err(ServiceError::validation("capacity must be a positive integer or null"));
            }
        }

        let patch = EventUpdate {
            name: request.name,
            description: request.description,
            location: request.location,
            start_time: request.start_time,
            end_time: request.end_time,
            capacity: request.capacity,
            published: request.published,
            points_total: request.points,
        };
        if patch.is_empty() {
            return Err(DomainError::EmptyUpdate.into());
        }

        let now = Utc::now();
        if patch.start_time.is_some_and(|t| t < now) {
            return Err(DomainError::TimeInPast("startTime").into());
        }
        if patch.end_time.is_some_and(|t| t < now) {
            return Err(DomainError::TimeInPast("endTime").into());
        }
        if event.has_started_at(now) && patch.touches_pre_start_fields() {
            return Err(DomainError::EventStarted.into());
        }
        if event.has_ended_at(now) && patch.end_time.is_some() {
            return Err(DomainError::EventEnded.into());
        }
        if let Some(Some(capacity)) = patch.capacity {
            if usize::try_from(capacity).unwrap_or(0) < event.num_guests() {
                return Err(DomainError::CapacityBelowGuests(event.num_guests()).into());
            }
        }
        if patch.points_total.is_some_and(|p| p < event.points_awarded) {
            return Err(DomainError::PointsBelowAwarded(event.points_awarded).into());
        }

        let updated = self.ctx.event_repo().update(event_id, &patch).await?;
        info!(
            event_id = %event_id,
            published = updated.published,
            points_remain = updated.points_remain,
            "Event updated"
        );
        Ok(EventResponse::from(&updated))
    }

    /// Delete an unpublished event (manager+)
    #[instrument(skip(self))]
    pub async fn delete_event(&self, caller: &Caller, event_id: EventId) -> ServiceResult<()> {
        require_role(caller, Role::Manager)?;
        let event = self.find(event_id).await?;
        if event.published {
            return Err(DomainError::EventPublished.into());
        }

        self.ctx.event_repo().delete(event_id).await?;
        info!(event_id = %event_id, "Event deleted");
        Ok(())
    }

    // =========================================================================
    // Organizers
    // =========================================================================

    /// Add an organizer by utorid (manager+)
    #[instrument(skip(self))]
    pub async fn add_organizer(
        &self,
        caller: &Caller,
        event_id: EventId,
        utorid: &Utorid,
    ) -> ServiceResult<EventResponse> {
        require_role(caller, Role::Manager)?;
        let user = self.user_by_utorid(utorid).await?;
        let event = self.find(event_id).await?;
        if event.has_ended_at(Utc::now()) {
            return Err(DomainError::EventEnded.into());
        }
        if event.is_guest(user.id) {
            return Err(DomainError::AlreadyGuest.into());
        }

        self.ctx.event_repo().add_organizer(event_id, user.id).await?;
        info!(event_id = %event_id, utorid = %user.utorid, "Organizer added");
        Ok(EventResponse::from(&self.find(event_id).await?))
    }

    /// Remove an organizer (manager+)
    #[instrument(skip(self))]
    pub async fn remove_organizer(
        &self,
        caller: &Caller,
        event_id: EventId,
        user_id: UserId,
    ) -> ServiceResult<()> {
        require_role(caller, Role::Manager)?;
        self.find(event_id).await?;
        self.ctx
            .event_repo()
            .remove_organizer(event_id, user_id)
            .await?;
        info!(event_id = %event_id, user_id = %user_id, "Organizer removed");
        Ok(())
    }

    // =========================================================================
    // Guests
    // =========================================================================

    /// Add a guest by utorid (organizer or manager+)
    #[instrument(skip(self))]
    pub async fn add_guest(
        &self,
        caller: &Caller,
        event_id: EventId,
        utorid: &Utorid,
    ) -> ServiceResult<GuestAddedResponse> {
        let event = self.find(event_id).await?;
        let manager = is_manager(caller);
        if !manager && !event.is_organizer(caller.id) {
            return Err(DomainError::NotOrganizer.into());
        }
        if !manager && !event.published {
            return Err(DomainError::EventNotFound(event_id).into());
        }

        let user = self.user_by_utorid(utorid).await?;
        self.admit(event, user).await
    }

    /// Remove a guest (manager+)
    #[instrument(skip(self))]
    pub async fn remove_guest(
        &self,
        caller: &Caller,
        event_id: EventId,
        user_id: UserId,
    ) -> ServiceResult<()> {
        require_role(caller, Role::Manager)?;
        self.find(event_id).await?;
        self.ctx.event_repo().remove_guest(event_id, user_id).await?;
        info!(event_id = %event_id, user_id = %user_id, "Guest removed");
        Ok(())
    }

    /// RSVP the caller to a published event
    #[instrument(skip(self))]
    pub async fn join_event(
        &self,
        caller: &Caller,
        event_id: EventId,
    ) -> ServiceResult<GuestAddedResponse> {
        let event = self.find_published(event_id).await?;
        let user = self
            .ctx
            .user_repo()
            .find_by_id(caller.id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(caller.utorid.to_string()))?;
        self.admit(event, user).await
    }

    /// Withdraw the caller's RSVP before the event ends
    #[instrument(skip(self))]
    pub async fn leave_event(&self, caller: &Caller, event_id: EventId) -> ServiceResult<()> {
        let event = self.find_published(event_id).await?;
        if !event.is_guest(caller.id) {
            return Err(DomainError::GuestNotFound.into());
        }
        if event.has_ended_at(Utc::now()) {
            return Err(DomainError::EventEnded.into());
        }

        self.ctx.event_repo().remove_guest(event_id, caller.id).await?;
        info!(event_id = %event_id, utorid = %caller.utorid, "Guest left");
        Ok(())
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    /// Shared admission checks. The store re-checks capacity atomically.
    async fn admit(&self, event: Event, user: User) -> ServiceResult<GuestAddedResponse> {
        if event.has_ended_at(Utc::now()) {
            return Err(DomainError::EventEnded.into());
        }
        if event.is_organizer(user.id) {
            return Err(DomainError::AlreadyOrganizer.into());
        }
        if event.is_guest(user.id) {
            return Err(DomainError::AlreadyGuest.into());
        }
        if event.is_full() {
            return Err(DomainError::EventFull.into());
        }

        self.ctx.event_repo().add_guest(event.id, user.id).await?;
        let num_guests = self.ctx.event_repo().list_guests(event.id).await?.len();

        info!(event_id = %event.id, utorid = %user.utorid, num_guests, "Guest added");
        Ok(GuestAddedResponse {
            id: event.id,
            name: event.name,
            location: event.location,
            guest_added: EventMemberResponse {
                id: user.id,
                utorid: user.utorid,
                name: user.name,
            },
            num_guests,
        })
    }

    async fn find(&self, event_id: EventId) -> ServiceResult<Event> {
        self.ctx
            .event_repo()
            .find_by_id(event_id)
            .await?
            .ok_or_else(|| DomainError::EventNotFound(event_id).into())
    }

    async fn find_published(&self, event_id: EventId) -> ServiceResult<Event> {
        let event = self.find(event_id).await?;
        if !event.published {
            return Err(DomainError::EventNotFound(event_id).into());
        }
        Ok(event)
    }

    async fn user_by_utorid(&self, utorid: &Utorid) -> ServiceResult<User> {
        self.ctx
            .user_repo()
            .find_by_utorid(utorid)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(utorid.to_string()).into())
    }
}
