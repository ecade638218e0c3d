//! Event handlers
//!
//! Event lifecycle, the organizer and guest rosters, and point awards
//! drawn from the event's pool.

use axum::{
    extract::{Path, State},
    Json,
};
use loyalty_core::{EventId, UserId};
use loyalty_service::dto::{
    CreateEventRequest, EventListQuery, EventMemberRequest, EventResponse, EventView,
    GuestAddedResponse, PageResponse, ScopedTransactionBody, TransactionOutcome,
    UpdateEventRequest,
};
use loyalty_service::{EventService, TransactionService};

use crate::extractors::{ApiQuery, AuthUser, JsonBody, ValidatedJson};
use crate::response::{ApiResult, Created, NoContent};
use crate::state::AppState;

/// POST /events
pub async fn create_event(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreateEventRequest>,
) -> ApiResult<Created<Json<EventResponse>>> {
    let service = EventService::new(state.service_context());
    let response = service.create_event(&auth.caller, request).await?;
    Ok(Created(Json(response)))
}

/// GET /events
pub async fn list_events(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<EventListQuery>,
) -> ApiResult<Json<PageResponse<EventView>>> {
    let service = EventService::new(state.service_context());
    Ok(Json(service.list_events(&auth.caller, query).await?))
}

/// GET /events/{id}
pub async fn get_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<EventId>,
) -> ApiResult<Json<EventView>> {
    let service = EventService::new(state.service_context());
    Ok(Json(service.get_event(&auth.caller, event_id).await?))
}

/// PATCH /events/{id}
pub async fn update_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<EventId>,
    ValidatedJson(request): ValidatedJson<UpdateEventRequest>,
) -> ApiResult<Json<EventResponse>> {
    let service = EventService::new(state.service_context());
    let response = service.update_event(&auth.caller, event_id, request).await?;
    Ok(Json(response))
}

/// DELETE /events/{id}
pub async fn delete_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<EventId>,
) -> ApiResult<NoContent> {
    let service = EventService::new(state.service_context());
    service.delete_event(&auth.caller, event_id).await?;
    Ok(NoContent)
}

/// POST /events/{id}/organizers
pub async fn add_organizer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<EventId>,
    JsonBody(request): JsonBody<EventMemberRequest>,
) -> ApiResult<Created<Json<EventResponse>>> {
    let service = EventService::new(state.service_context());
    let response = service
        .add_organizer(&auth.caller, event_id, &request.utorid)
        .await?;
    Ok(Created(Json(response)))
}

/// DELETE /events/{id}/organizers/{userId}
pub async fn remove_organizer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((event_id, user_id)): Path<(EventId, UserId)>,
) -> ApiResult<NoContent> {
    let service = EventService::new(state.service_context());
    service
        .remove_organizer(&auth.caller, event_id, user_id)
        .await?;
    Ok(NoContent)
}

/// POST /events/{id}/guests
pub async fn add_guest(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<EventId>,
    JsonBody(request): JsonBody<EventMemberRequest>,
) -> ApiResult<Created<Json<GuestAddedResponse>>> {
    let service = EventService::new(state.service_context());
    let response = service
        .add_guest(&auth.caller, event_id, &request.utorid)
        .await?;
    Ok(Created(Json(response)))
}

/// DELETE /events/{id}/guests/{userId}
pub async fn remove_guest(
    State(state): State<AppState>,
    auth: AuthUser,
    Path((event_id, user_id)): Path<(EventId, UserId)>,
) -> ApiResult<NoContent> {
    let service = EventService::new(state.service_context());
    service.remove_guest(&auth.caller, event_id, user_id).await?;
    Ok(NoContent)
}

/// POST /events/{id}/guests/me
pub async fn join_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<EventId>,
) -> ApiResult<Created<Json<GuestAddedResponse>>> {
    let service = EventService::new(state.service_context());
    let response = service.join_event(&auth.caller, event_id).await?;
    Ok(Created(Json(response)))
}

/// DELETE /events/{id}/guests/me
pub async fn leave_event(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<EventId>,
) -> ApiResult<NoContent> {
    let service = EventService::new(state.service_context());
    service.leave_event(&auth.caller, event_id).await?;
    Ok(NoContent)
}

/// Award points from the event pool to one guest, or to every guest when
/// no utorid is given
///
/// POST /events/{id}/transactions
pub async fn award_points(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(event_id): Path<EventId>,
    JsonBody(body): JsonBody<ScopedTransactionBody>,
) -> ApiResult<Created<Json<TransactionOutcome>>> {
    let request = body.into_event_award(event_id)?;
    let service = TransactionService::new(state.service_context());
    let outcome = service.create_transaction(&auth.caller, request).await?;
    Ok(Created(Json(outcome)))
}
