//! Route definitions
//!
//! All API routes organized by domain and mounted under /api/v1.

use axum::{
    routing::{delete, get, patch, post},
    Router,
};

use crate::handlers::{auth, events, health, promotions, transactions, users};
use crate::state::AppState;

/// Create the main API router (health routes are mounted separately)
pub fn create_router() -> Router<AppState> {
    Router::new().nest("/api/v1", api_v1_routes())
}

/// Health check routes (exported separately to bypass rate limiting)
pub fn health_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/health/ready", get(health::readiness_check))
}

fn api_v1_routes() -> Router<AppState> {
    Router::new()
        .merge(auth_routes())
        .merge(user_routes())
        .merge(transaction_routes())
        .merge(event_routes())
        .merge(promotion_routes())
}

fn auth_routes() -> Router<AppState> {
    Router::new()
        .route("/auth/tokens", post(auth::login))
        .route("/auth/resets", post(auth::request_reset))
        .route("/auth/resets/:reset_token", post(auth::reset_password))
}

/// User routes. `:id` is a numeric user id everywhere except the promotions
/// route, where it is a utorid.
fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users", post(users::register_user).get(users::list_users))
        .route("/users/me", get(users::get_me).patch(users::update_me))
        .route("/users/me/password", patch(users::change_password))
        .route(
            "/users/me/transactions",
            post(users::create_redemption).get(users::list_my_transactions),
        )
        .route("/users/:id", get(users::get_user).patch(users::update_user))
        .route("/users/:id/transactions", post(users::create_transfer))
        .route("/users/:id/promotions", get(users::available_promotions))
}

fn transaction_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/transactions",
            post(transactions::create_transaction).get(transactions::list_transactions),
        )
        .route("/transactions/:id", get(transactions::get_transaction))
        .route(
            "/transactions/:id/suspicious",
            patch(transactions::set_suspicious),
        )
        .route(
            "/transactions/:id/processed",
            patch(transactions::process_redemption),
        )
}

fn event_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/events",
            post(events::create_event).get(events::list_events),
        )
        .route(
            "/events/:id",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:id/organizers", post(events::add_organizer))
        .route(
            "/events/:id/organizers/:user_id",
            delete(events::remove_organizer),
        )
        .route("/events/:id/guests", post(events::add_guest))
        .route(
            "/events/:id/guests/me",
            post(events::join_event).delete(events::leave_event),
        )
        .route("/events/:id/guests/:user_id", delete(events::remove_guest))
        .route("/events/:id/transactions", post(events::award_points))
}

fn promotion_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/promotions",
            post(promotions::create_promotion).get(promotions::list_promotions),
        )
        .route(
            "/promotions/:id",
            get(promotions::get_promotion)
                .patch(promotions::update_promotion)
                .delete(promotions::delete_promotion),
        )
}
