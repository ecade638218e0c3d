//! Promotion, event and account management against the in-memory store

mod common;

use std::num::NonZeroU32;
use std::sync::Arc;

use chrono::{Duration, Utc};

use common::Harness;
use loyalty_common::{GovernorRateLimiter, JwtService, KeyedRateLimiter};
use loyalty_core::{Caller, PromotionKind, Role, UserRepository, Utorid};
use loyalty_db::MemoryStore;
use loyalty_service::dto::{
    ChangePasswordRequest, EventListQuery, EventView, LoginRequest, PromotionListQuery,
    RegisterUserRequest, RegisteredUserResponse, ResetPasswordRequest, UpdateEventRequest,
    UpdateMeRequest, UpdatePromotionRequest, UpdateUserRequest, UserListQuery, UserView,
};
use loyalty_service::{
    AccountService, EventService, PromotionService, ServiceContextBuilder, UserService,
};

// =============================================================================
// Promotions
// =============================================================================

#[tokio::test]
async fn test_promotion_visibility_by_role() {
    let h = Harness::new();
    let (_, manager) = h.user("manager1", Role::Manager);
    let (_, regular) = h.user("regular1", Role::Regular);
    let running = h
        .running_promotion(&manager, PromotionKind::Automatic, Some(5), None)
        .await;

    let now = Utc::now();
    let upcoming = PromotionService::new(&h.ctx)
        .create_promotion(
            &manager,
            loyalty_service::dto::CreatePromotionRequest {
                name: "Spring".to_string(),
                description: "Later".to_string(),
                kind: PromotionKind::OneTime,
                start_time: now + Duration::days(3),
                end_time: now + Duration::days(4),
                min_spending: None,
                rate: None,
                points: Some(10),
            },
        )
        .await
        .unwrap()
        .id;

    let service = PromotionService::new(&h.ctx);
    assert!(service.get_promotion(&regular, running).await.is_ok());
    let err = service.get_promotion(&regular, upcoming).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert!(service.get_promotion(&manager, upcoming).await.is_ok());

    let visible = service
        .list_promotions(&regular, PromotionListQuery::default())
        .await
        .unwrap();
    assert_eq!(visible.count, 1);

    let not_started = service
        .list_promotions(
            &manager,
            PromotionListQuery {
                started: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(not_started.count, 1);
    assert_eq!(not_started.results[0].id, upcoming);
}

#[tokio::test]
async fn test_promotion_update_and_delete_rules() {
    let h = Harness::new();
    let (_, manager) = h.user("manager1", Role::Manager);
    let running = h
        .running_promotion(&manager, PromotionKind::Automatic, Some(5), None)
        .await;
    let service = PromotionService::new(&h.ctx);

    let updated = service
        .update_promotion(
            &manager,
            running,
            UpdatePromotionRequest {
                points: Some(20),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.points, Some(20));

    let err = service
        .update_promotion(
            &manager,
            running,
            UpdatePromotionRequest {
                end_time: Some(Utc::now() - Duration::hours(1)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "TIME_IN_PAST");

    let err = service
        .update_promotion(&manager, running, UpdatePromotionRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "EMPTY_UPDATE");

    let err = service.delete_promotion(&manager, running).await.unwrap_err();
    assert_eq!(err.status_code(), 410);
}

// =============================================================================
// Events
// =============================================================================

#[tokio::test]
async fn test_unpublished_event_hidden_from_regular_users() {
    let h = Harness::new();
    let (_, manager) = h.user("manager1", Role::Manager);
    let (_, regular) = h.user("regular1", Role::Regular);
    let event_id = h.event(&manager, 100, None).await;
    let service = EventService::new(&h.ctx);

    let err = service.get_event(&regular, event_id).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
    let listed = service
        .list_events(&regular, EventListQuery::default())
        .await
        .unwrap();
    assert_eq!(listed.count, 0);

    service
        .update_event(
            &manager,
            event_id,
            UpdateEventRequest {
                published: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let view = service.get_event(&regular, event_id).await.unwrap();
    assert!(matches!(view, EventView::Summary(_)));
    let json = serde_json::to_value(&view).unwrap();
    assert_eq!(json["numGuests"], 0);
    assert!(json.get("pointsRemain").is_none());

    let err = service.delete_event(&manager, event_id).await.unwrap_err();
    assert_eq!(err.error_code(), "EVENT_PUBLISHED");
}

#[tokio::test]
async fn test_event_update_rules() {
    let h = Harness::new();
    let (_, manager) = h.user("manager1", Role::Manager);
    let (_, organizer) = h.user("organiz1", Role::Regular);
    let event_id = h.event(&manager, 100, Some(2)).await;
    let service = EventService::new(&h.ctx);
    service
        .add_organizer(&manager, event_id, &organizer.utorid)
        .await
        .unwrap();

    let renamed = service
        .update_event(
            &organizer,
            event_id,
            UpdateEventRequest {
                name: Some("Games night".to_string()),
                capacity: Some(None),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(renamed.name, "Games night");
    assert_eq!(renamed.capacity, None);

    let err = service
        .update_event(
            &organizer,
            event_id,
            UpdateEventRequest {
                points: Some(500),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "MANAGER_ONLY_FIELD");

    let err = service
        .update_event(
            &manager,
            event_id,
            UpdateEventRequest {
                published: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let resized = service
        .update_event(
            &manager,
            event_id,
            UpdateEventRequest {
                points: Some(150),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(resized.points_remain, 150);
}

#[tokio::test]
async fn test_guest_capacity_and_roster_rules() {
    let h = Harness::new();
    let (_, manager) = h.user("manager1", Role::Manager);
    let (_, organizer) = h.user("organiz1", Role::Regular);
    let (_, first) = h.user("guest001", Role::Regular);
    h.user("guest002", Role::Regular);
    let event_id = h.event(&manager, 100, Some(1)).await;
    let service = EventService::new(&h.ctx);

    service
        .add_organizer(&manager, event_id, &organizer.utorid)
        .await
        .unwrap();
    let err = service
        .add_guest(&manager, event_id, &organizer.utorid)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ALREADY_ORGANIZER");

    let added = service
        .add_guest(&manager, event_id, &first.utorid)
        .await
        .unwrap();
    assert_eq!(added.num_guests, 1);
    assert_eq!(added.guest_added.utorid.as_str(), "guest001");

    let err = service
        .add_guest(&manager, event_id, &Utorid::new_unchecked("guest002"))
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "EVENT_FULL");
    assert_eq!(err.status_code(), 409);

    let err = service
        .add_organizer(&manager, event_id, &first.utorid)
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "ALREADY_GUEST");

    let err = service
        .update_event(
            &manager,
            event_id,
            UpdateEventRequest {
                capacity: Some(Some(0)),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    service.remove_guest(&manager, event_id, first.id).await.unwrap();
    let err = service.remove_guest(&manager, event_id, first.id).await.unwrap_err();
    assert_eq!(err.error_code(), "UNKNOWN_GUEST");
}

#[tokio::test]
async fn test_join_and_leave_published_event() {
    let h = Harness::new();
    let (_, manager) = h.user("manager1", Role::Manager);
    let (_, student) = h.user("student1", Role::Regular);
    let event_id = h.event(&manager, 100, None).await;
    let service = EventService::new(&h.ctx);

    let err = service.join_event(&student, event_id).await.unwrap_err();
    assert_eq!(err.status_code(), 404);

    service
        .update_event(
            &manager,
            event_id,
            UpdateEventRequest {
                published: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let joined = service.join_event(&student, event_id).await.unwrap();
    assert_eq!(joined.num_guests, 1);
    let err = service.join_event(&student, event_id).await.unwrap_err();
    assert_eq!(err.error_code(), "ALREADY_GUEST");

    service.leave_event(&student, event_id).await.unwrap();
    let err = service.leave_event(&student, event_id).await.unwrap_err();
    assert_eq!(err.status_code(), 404);
}

// =============================================================================
// Users and accounts
// =============================================================================

async fn register(h: &Harness, cashier: &Caller, utorid: &str) -> RegisteredUserResponse {
    UserService::new(&h.ctx)
        .register_user(
            cashier,
            RegisterUserRequest {
                utorid: Utorid::new_unchecked(utorid),
                name: format!("Name of {utorid}"),
                email: format!("{utorid}@mail.utoronto.ca"),
            },
        )
        .await
        .unwrap()
}

fn reset(utorid: &str, password: &str) -> ResetPasswordRequest {
    ResetPasswordRequest {
        utorid: Utorid::new_unchecked(utorid),
        password: password.to_string(),
    }
}

fn login(utorid: &str, password: &str) -> LoginRequest {
    LoginRequest {
        utorid: Utorid::new_unchecked(utorid),
        password: password.to_string(),
    }
}

#[tokio::test]
async fn test_register_and_lookup_views() {
    let h = Harness::new();
    let (_, manager) = h.user("manager1", Role::Manager);
    let (_, cashier) = h.user("cashier1", Role::Cashier);
    let users = UserService::new(&h.ctx);

    let registered = users
        .register_user(
            &cashier,
            RegisterUserRequest {
                utorid: Utorid::new_unchecked("newbie01"),
                name: "Newbie".to_string(),
                email: "newbie01@mail.utoronto.ca".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(!registered.verified);
    assert!(!registered.reset_token.is_empty());
    assert!(registered.expires_at > Utc::now() + Duration::days(6));

    let err = users
        .register_user(
            &cashier,
            RegisterUserRequest {
                utorid: Utorid::new_unchecked("newbie01"),
                name: "Again".to_string(),
                email: "other@mail.utoronto.ca".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 409);

    let view = users.get_user(&cashier, registered.id).await.unwrap();
    assert!(matches!(view, UserView::Cashier(_)));
    let json = serde_json::to_value(&view).unwrap();
    assert!(json.get("email").is_none());

    let view = users.get_user(&manager, registered.id).await.unwrap();
    assert!(matches!(view, UserView::Full(_)));

    let me = users.get_me(&cashier).await.unwrap();
    assert_eq!(me.utorid.as_str(), "cashier1");
}

#[tokio::test]
async fn test_update_user_role_rules() {
    let h = Harness::new();
    let (_, manager) = h.user("manager1", Role::Manager);
    let (_, superuser) = h.user("super001", Role::Superuser);
    let (student, _) = h.user("student1", Role::Regular);
    let users = UserService::new(&h.ctx);

    let promoted = users
        .update_user(
            &manager,
            student.id,
            UpdateUserRequest {
                role: Some(Role::Cashier),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(promoted.role, Some(Role::Cashier));
    assert!(promoted.email.is_none());

    let err = users
        .update_user(
            &manager,
            student.id,
            UpdateUserRequest {
                role: Some(Role::Manager),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "CANNOT_ASSIGN_ROLE");

    users
        .update_user(
            &superuser,
            student.id,
            UpdateUserRequest {
                role: Some(Role::Manager),
                ..Default::default()
            },
        )
        .await
        .unwrap();

    let err = users
        .update_user(
            &manager,
            student.id,
            UpdateUserRequest {
                suspicious: Some(true),
                role: Some(Role::Cashier),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "SUSPICIOUS_CASHIER");

    let err = users
        .update_user(
            &manager,
            student.id,
            UpdateUserRequest {
                verified: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = users
        .update_user(&manager, student.id, UpdateUserRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "EMPTY_UPDATE");
}

#[tokio::test]
async fn test_password_reset_is_throttled_per_client() {
    let store = MemoryStore::new();
    store.seed_user("student1", "Student", Role::Regular).unwrap();
    let limiter = Arc::new(GovernorRateLimiter::per_minute(NonZeroU32::MIN));
    let ctx = ServiceContextBuilder::new()
        .memory(&store)
        .jwt_service(Arc::new(JwtService::new("service-test-secret", 3600)))
        .reset_limiter(limiter.clone())
        .build()
        .unwrap();
    let accounts = AccountService::new(&ctx);
    let utorid = Utorid::new_unchecked("student1");

    let issued = accounts
        .request_password_reset(&utorid, "10.0.0.1")
        .await
        .unwrap();
    assert!(issued.expires_at <= Utc::now() + Duration::minutes(60));

    let err = accounts
        .request_password_reset(&utorid, "10.0.0.1")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 429);
    assert_eq!(err.error_code(), "RATE_LIMITED");

    assert!(accounts
        .request_password_reset(&utorid, "10.0.0.2")
        .await
        .is_ok());

    limiter.reset();
    assert!(accounts
        .request_password_reset(&utorid, "10.0.0.1")
        .await
        .is_ok());

    let err = accounts
        .request_password_reset(&Utorid::new_unchecked("nobody00"), "10.0.0.3")
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
}

#[tokio::test]
async fn test_manager_user_listing() {
    let h = Harness::new();
    let (_, manager) = h.user("manager1", Role::Manager);
    let (_, cashier) = h.user("cashier1", Role::Cashier);
    h.user("student1", Role::Regular);
    register(&h, &cashier, "newbie01").await;
    let users = UserService::new(&h.ctx);

    let all = users.list_users(&manager, UserListQuery::default()).await.unwrap();
    assert_eq!(all.count, 4);
    assert_eq!(all.results.len(), 4);

    let unverified = users
        .list_users(
            &manager,
            UserListQuery {
                verified: Some(false),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(unverified.count, 1);
    assert_eq!(unverified.results[0].utorid.as_str(), "newbie01");

    let cashiers = users
        .list_users(
            &manager,
            UserListQuery {
                role: Some(Role::Cashier),
                name: Some("CASH".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(cashiers.count, 1);

    let paged = users
        .list_users(
            &manager,
            UserListQuery {
                page: Some(2),
                limit: Some(3),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(paged.count, 4);
    assert_eq!(paged.results.len(), 1);

    let err = users
        .list_users(
            &manager,
            UserListQuery {
                page: Some(0),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    let err = users
        .list_users(&cashier, UserListQuery::default())
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
}

#[tokio::test]
async fn test_update_me_profile() {
    let h = Harness::new();
    let (_, cashier) = h.user("cashier1", Role::Cashier);
    let registered = register(&h, &cashier, "newbie01").await;
    let me = Caller::new(registered.id, registered.utorid.clone(), Role::Regular);
    let users = UserService::new(&h.ctx);

    let updated = users
        .update_me(
            &me,
            UpdateMeRequest {
                name: Some("Renamed".to_string()),
                birthday: chrono::NaiveDate::from_ymd_opt(2002, 4, 1),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(updated.name, "Renamed");
    assert_eq!(updated.birthday, chrono::NaiveDate::from_ymd_opt(2002, 4, 1));
    assert!(!updated.verified);
    assert_eq!(updated.email, "newbie01@mail.utoronto.ca");

    let err = users
        .update_me(&me, UpdateMeRequest::default())
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "EMPTY_UPDATE");

    let err = users
        .update_me(
            &me,
            UpdateMeRequest {
                email: Some("cashier1@mail.utoronto.ca".to_string()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.error_code(), "EMAIL_ALREADY_EXISTS");

    let err = users
        .update_me(
            &me,
            UpdateMeRequest {
                name: Some(String::new()),
                ..Default::default()
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);
}

#[tokio::test]
async fn test_reset_token_sets_password_once() {
    let h = Harness::new();
    let (_, cashier) = h.user("cashier1", Role::Cashier);
    let registered = register(&h, &cashier, "newbie01").await;
    let token = registered.reset_token.as_str();
    let accounts = AccountService::new(&h.ctx);

    let err = accounts
        .reset_password("no-such-token", reset("newbie01", "Ledger#2024"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 404);
    assert_eq!(err.error_code(), "UNKNOWN_RESET_TOKEN");

    let err = accounts
        .reset_password(token, reset("cashier1", "Ledger#2024"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 401);
    assert_eq!(err.error_code(), "INVALID_CREDENTIALS");

    let err = accounts
        .reset_password(token, reset("newbie01", "weakpass"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 400);

    accounts
        .reset_password(token, reset("newbie01", "Ledger#2024"))
        .await
        .unwrap();
    let stored = h.store.get_password_hash(registered.id).await.unwrap().unwrap();
    assert!(stored.starts_with("$argon2"));

    let err = accounts
        .reset_password(token, reset("newbie01", "Ledger#2025"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 410);
    assert_eq!(err.error_code(), "RESET_TOKEN_EXPIRED");
    assert_eq!(
        h.store.get_password_hash(registered.id).await.unwrap(),
        Some(stored)
    );
}

#[tokio::test]
async fn test_expired_reset_token_is_gone() {
    let h = Harness::new();
    let (student, _) = h.user("student1", Role::Regular);
    h.store
        .set_reset_token(student.id, "stale-token", Utc::now() - Duration::minutes(1))
        .await
        .unwrap();

    let err = AccountService::new(&h.ctx)
        .reset_password("stale-token", reset("student1", "Ledger#2024"))
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 410);
    assert!(h.store.get_password_hash(student.id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_login_activates_and_password_change() {
    let h = Harness::new();
    let (_, manager) = h.user("manager1", Role::Manager);
    let (_, cashier) = h.user("cashier1", Role::Cashier);
    let registered = register(&h, &cashier, "newbie01").await;
    let accounts = AccountService::new(&h.ctx);
    let users = UserService::new(&h.ctx);

    let err = accounts.login(login("newbie01", "Ledger#2024")).await.unwrap_err();
    assert_eq!(err.error_code(), "INVALID_CREDENTIALS");

    accounts
        .reset_password(&registered.reset_token, reset("newbie01", "Ledger#2024"))
        .await
        .unwrap();

    let err = accounts.login(login("newbie01", "Ledger#2025")).await.unwrap_err();
    assert_eq!(err.status_code(), 401);
    let err = accounts.login(login("nobody00", "Ledger#2024")).await.unwrap_err();
    assert_eq!(err.status_code(), 401);

    let issued = accounts.login(login("newbie01", "Ledger#2024")).await.unwrap();
    assert!(issued.expires_at > Utc::now());
    let caller = h.ctx.jwt_service().authenticate(&issued.token).unwrap();
    assert_eq!(caller.id, registered.id);
    assert_eq!(caller.role, Role::Regular);

    let activated = users
        .list_users(
            &manager,
            UserListQuery {
                activated: Some(true),
                ..Default::default()
            },
        )
        .await
        .unwrap();
    assert_eq!(activated.count, 1);
    assert!(activated.results[0].last_login.is_some());

    let err = users
        .change_password(
            &caller,
            ChangePasswordRequest {
                current: "Ledger#2025".to_string(),
                replacement: "Points&Perks1".to_string(),
            },
        )
        .await
        .unwrap_err();
    assert_eq!(err.status_code(), 403);
    assert_eq!(err.error_code(), "INCORRECT_PASSWORD");

    users
        .change_password(
            &caller,
            ChangePasswordRequest {
                current: "Ledger#2024".to_string(),
                replacement: "Points&Perks1".to_string(),
            },
        )
        .await
        .unwrap();
    assert!(accounts.login(login("newbie01", "Ledger#2024")).await.is_err());
    assert!(accounts.login(login("newbie01", "Points&Perks1")).await.is_ok());
}
