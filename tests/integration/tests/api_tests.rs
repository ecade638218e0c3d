//! API Integration Tests
//!
//! Each test spawns the full application over a fresh in-memory store.
//! Tests against PostgreSQL additionally require `DATABASE_URL` and
//! `JWT_SECRET`.
//!
//! Run with: cargo test -p integration-tests --test api_tests

use integration_tests::{
    assert_error, assert_json, assert_status, award, check_postgres_env, new_event, purchase,
    redemption, running_promotion, transfer, TestServer,
};
use loyalty_core::Role;
use reqwest::StatusCode;
use serde_json::{json, Value};

// ============================================================================
// Health Check Tests
// ============================================================================

#[tokio::test]
async fn test_health_check() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health").await.unwrap();
    let body: Value = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body["status"], "healthy");
}

#[tokio::test]
async fn test_health_ready_in_memory() {
    let server = TestServer::start().await.expect("Failed to start server");
    let response = server.get("/health/ready").await.unwrap();
    let body: Value = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body["checks"]["database"], "in-memory");
}

#[tokio::test]
async fn test_health_ready_postgres() {
    if !check_postgres_env() {
        return;
    }

    let server = TestServer::start_postgres()
        .await
        .expect("Failed to start server");
    let response = server.get("/health/ready").await.unwrap();
    let body: Value = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(body["checks"]["database"], "healthy");
}

// ============================================================================
// Authentication
// ============================================================================

#[tokio::test]
async fn test_missing_and_invalid_tokens() {
    let server = TestServer::start().await.unwrap();

    let response = server.get("/api/v1/users/me").await.unwrap();
    let code = assert_error(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(code, "MISSING_AUTHORIZATION");

    let response = server
        .get_auth("/api/v1/users/me", "not-a-token")
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(code, "INVALID_TOKEN");
}

#[tokio::test]
async fn test_me_and_request_id_header() {
    let server = TestServer::start().await.unwrap();
    let student = server.seed("student1", Role::Regular).unwrap();

    let response = server
        .get_auth("/api/v1/users/me", &student.token)
        .await
        .unwrap();
    assert!(response.headers().contains_key("x-request-id"));
    let me: Value = assert_json(response, StatusCode::OK).await.unwrap();
    assert_eq!(me["utorid"], "student1");
    assert_eq!(me["points"], 0);
    assert_eq!(me["role"], "regular");
}

// ============================================================================
// Ledger
// ============================================================================

#[tokio::test]
async fn test_purchase_earns_points() {
    let server = TestServer::start().await.unwrap();
    let cashier = server.seed("cashier1", Role::Cashier).unwrap();
    let student = server.seed("student1", Role::Regular).unwrap();

    let response = server
        .post_auth(
            "/api/v1/transactions",
            &cashier.token,
            &purchase("student1", 10.0, &[]),
        )
        .await
        .unwrap();
    let row: Value = assert_json(response, StatusCode::CREATED).await.unwrap();
    assert_eq!(row["type"], "purchase");
    assert_eq!(row["earned"], 40);
    assert_eq!(row["createdBy"], "cashier1");

    let me: Value = assert_json(
        server
            .get_auth("/api/v1/users/me", &student.token)
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(me["points"], 40);
}

#[tokio::test]
async fn test_purchase_requires_cashier() {
    let server = TestServer::start().await.unwrap();
    let student = server.seed("student1", Role::Regular).unwrap();

    let response = server
        .post_auth(
            "/api/v1/transactions",
            &student.token,
            &purchase("student1", 10.0, &[]),
        )
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::FORBIDDEN).await.unwrap();
    assert_eq!(code, "MISSING_ROLE");
}

#[tokio::test]
async fn test_transaction_route_rejects_scoped_types() {
    let server = TestServer::start().await.unwrap();
    let manager = server.seed("manager1", Role::Manager).unwrap();

    let response = server
        .post_auth(
            "/api/v1/transactions",
            &manager.token,
            &json!({ "type": "redemption", "amount": 10 }),
        )
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::BAD_REQUEST).await.unwrap();
    assert_eq!(code, "INVALID_BODY");
}

#[tokio::test]
async fn test_automatic_promotion_applies_at_checkout() {
    let server = TestServer::start().await.unwrap();
    let manager = server.seed("manager1", Role::Manager).unwrap();
    let cashier = server.seed("cashier1", Role::Cashier).unwrap();
    server.seed("student1", Role::Regular).unwrap();

    let promotion: Value = assert_json(
        server
            .post_auth("/api/v1/promotions", &manager.token, &running_promotion(15))
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    let promotion_id = promotion["id"].as_i64().unwrap();

    let available: Vec<Value> = assert_json(
        server
            .get_auth("/api/v1/users/student1/promotions", &cashier.token)
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(available.len(), 1);

    let row: Value = assert_json(
        server
            .post_auth(
                "/api/v1/transactions",
                &cashier.token,
                &purchase("student1", 10.0, &[promotion_id]),
            )
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    assert_eq!(row["earned"], 55);
    assert_eq!(row["promotionIds"], json!([promotion_id]));
}

#[tokio::test]
async fn test_transfer_conserves_points() {
    let server = TestServer::start().await.unwrap();
    let cashier = server.seed("cashier1", Role::Cashier).unwrap();
    let sender = server.seed("sender01", Role::Regular).unwrap();
    let recipient = server.seed("recvr001", Role::Regular).unwrap();

    server
        .post_auth(
            "/api/v1/transactions",
            &cashier.token,
            &purchase("sender01", 25.0, &[]),
        )
        .await
        .unwrap();

    let path = format!("/api/v1/users/{}/transactions", recipient.id);
    let row: Value = assert_json(
        server
            .post_auth(&path, &sender.token, &transfer(60))
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    assert_eq!(row["amount"], -60);
    assert_eq!(row["relatedId"], recipient.id);

    let response = server
        .post_auth(&path, &sender.token, &transfer(500))
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::CONFLICT).await.unwrap();
    assert_eq!(code, "INSUFFICIENT_POINTS");

    let response = server
        .post_auth(&path, &sender.token, &redemption(5))
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();

    let history: Value = assert_json(
        server
            .get_auth("/api/v1/users/me/transactions?type=transfer", &recipient.token)
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(history["count"], 1);
    assert_eq!(history["results"][0]["amount"], 60);
}

#[tokio::test]
async fn test_two_phase_redemption() {
    let server = TestServer::start().await.unwrap();
    let cashier = server.seed("cashier1", Role::Cashier).unwrap();
    let student = server.seed("student1", Role::Regular).unwrap();

    server
        .post_auth(
            "/api/v1/transactions",
            &cashier.token,
            &purchase("student1", 25.0, &[]),
        )
        .await
        .unwrap();

    let pending: Value = assert_json(
        server
            .post_auth("/api/v1/users/me/transactions", &student.token, &redemption(40))
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    assert!(pending["processedBy"].is_null());
    let path = format!("/api/v1/transactions/{}/processed", pending["id"]);

    let response = server
        .patch_auth(&path, &cashier.token, &json!({ "processed": false }))
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();

    let processed: Value = assert_json(
        server
            .patch_auth(&path, &cashier.token, &json!({ "processed": true }))
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(processed["processedBy"], "cashier1");

    let response = server
        .patch_auth(&path, &cashier.token, &json!({ "processed": true }))
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::CONFLICT).await.unwrap();
    assert_eq!(code, "ALREADY_PROCESSED");

    let me: Value = assert_json(
        server
            .get_auth("/api/v1/users/me", &student.token)
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(me["points"], 60);
}

#[tokio::test]
async fn test_suspicious_flag_moves_points() {
    let server = TestServer::start().await.unwrap();
    let manager = server.seed("manager1", Role::Manager).unwrap();
    let cashier = server.seed("cashier1", Role::Cashier).unwrap();
    let student = server.seed("student1", Role::Regular).unwrap();

    let row: Value = assert_json(
        server
            .post_auth(
                "/api/v1/transactions",
                &cashier.token,
                &purchase("student1", 10.0, &[]),
            )
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    let path = format!("/api/v1/transactions/{}/suspicious", row["id"]);

    let flagged: Value = assert_json(
        server
            .patch_auth(&path, &manager.token, &json!({ "suspicious": true }))
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(flagged["suspicious"], true);

    let me: Value = assert_json(
        server
            .get_auth("/api/v1/users/me", &student.token)
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(me["points"], 0);

    let listed: Value = assert_json(
        server
            .get_auth("/api/v1/transactions?suspicious=true", &manager.token)
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(listed["count"], 1);

    let response = server
        .get_auth("/api/v1/transactions?page=0", &manager.token)
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();
}

// ============================================================================
// Events
// ============================================================================

#[tokio::test]
async fn test_event_award_respects_pool() {
    let server = TestServer::start().await.unwrap();
    let manager = server.seed("manager1", Role::Manager).unwrap();
    let guests = ["guest001", "guest002", "guest003"];
    for utorid in guests {
        server.seed(utorid, Role::Regular).unwrap();
    }

    let event: Value = assert_json(
        server
            .post_auth("/api/v1/events", &manager.token, &new_event(80, None))
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    let event_path = format!("/api/v1/events/{}", event["id"]);

    for utorid in guests {
        let response = server
            .post_auth(
                &format!("{event_path}/guests"),
                &manager.token,
                &json!({ "utorid": utorid }),
            )
            .await
            .unwrap();
        assert_status(response, StatusCode::CREATED).await.unwrap();
    }

    let awards = format!("{event_path}/transactions");
    let response = server
        .post_auth(&awards, &manager.token, &award(30, None))
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::CONFLICT).await.unwrap();
    assert_eq!(code, "POOL_EXHAUSTED");

    let rows: Vec<Value> = assert_json(
        server
            .post_auth(&awards, &manager.token, &award(20, None))
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    assert_eq!(rows.len(), 3);

    let single: Value = assert_json(
        server
            .post_auth(&awards, &manager.token, &award(20, Some("guest002")))
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    assert_eq!(single["utorid"], "guest002");
    assert_eq!(single["type"], "event");

    let detail: Value = assert_json(
        server.get_auth(&event_path, &manager.token).await.unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(detail["pointsRemain"], 0);
    assert_eq!(detail["pointsAwarded"], 80);
}

#[tokio::test]
async fn test_event_publishing_and_rsvp() {
    let server = TestServer::start().await.unwrap();
    let manager = server.seed("manager1", Role::Manager).unwrap();
    let student = server.seed("student1", Role::Regular).unwrap();

    let event: Value = assert_json(
        server
            .post_auth("/api/v1/events", &manager.token, &new_event(100, Some(10)))
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    let event_path = format!("/api/v1/events/{}", event["id"]);
    let rsvp = format!("{event_path}/guests/me");

    let response = server.get_auth(&event_path, &student.token).await.unwrap();
    assert_status(response, StatusCode::NOT_FOUND).await.unwrap();

    let response = server
        .patch_auth(&event_path, &manager.token, &json!({ "published": true }))
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let joined: Value = assert_json(
        server
            .post_auth(&rsvp, &student.token, &json!({}))
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    assert_eq!(joined["numGuests"], 1);

    let summary: Value = assert_json(
        server.get_auth(&event_path, &student.token).await.unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(summary["numGuests"], 1);
    assert!(summary.get("guests").is_none());

    let response = server.delete_auth(&rsvp, &student.token).await.unwrap();
    assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

    let response = server.delete_auth(&event_path, &manager.token).await.unwrap();
    let code = assert_error(response, StatusCode::GONE).await.unwrap();
    assert_eq!(code, "EVENT_PUBLISHED");
}

// ============================================================================
// Users and accounts
// ============================================================================

#[tokio::test]
async fn test_register_and_manage_user() {
    let server = TestServer::start().await.unwrap();
    let manager = server.seed("manager1", Role::Manager).unwrap();
    let cashier = server.seed("cashier1", Role::Cashier).unwrap();

    let body = json!({
        "utorid": "newbie01",
        "name": "New Student",
        "email": "newbie01@mail.utoronto.ca",
    });
    let registered: Value = assert_json(
        server
            .post_auth("/api/v1/users", &cashier.token, &body)
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    assert_eq!(registered["verified"], false);
    assert!(registered["resetToken"].as_str().is_some_and(|t| !t.is_empty()));

    let response = server
        .post_auth("/api/v1/users", &cashier.token, &body)
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::CONFLICT).await.unwrap();
    assert_eq!(code, "UTORID_ALREADY_EXISTS");

    let response = server
        .post_auth(
            "/api/v1/users",
            &cashier.token,
            &json!({ "utorid": "x", "name": "Bad", "email": "bad@mail.utoronto.ca" }),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();

    let path = format!("/api/v1/users/{}", registered["id"]);
    let updated: Value = assert_json(
        server
            .patch_auth(&path, &manager.token, &json!({ "verified": true }))
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(updated["verified"], true);
    assert!(updated.get("email").is_none());

    let response = server
        .patch_auth(&path, &manager.token, &json!({ "role": "superuser" }))
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::FORBIDDEN).await.unwrap();
    assert_eq!(code, "CANNOT_ASSIGN_ROLE");
}

#[tokio::test]
async fn test_role_change_applies_to_existing_token() {
    let server = TestServer::start().await.unwrap();
    let manager = server.seed("manager1", Role::Manager).unwrap();
    let student = server.seed("student1", Role::Regular).unwrap();
    server.seed("shopper1", Role::Regular).unwrap();

    let response = server
        .patch_auth(
            &format!("/api/v1/users/{}", student.id),
            &manager.token,
            &json!({ "role": "cashier" }),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::OK).await.unwrap();

    let response = server
        .post_auth(
            "/api/v1/transactions",
            &student.token,
            &purchase("shopper1", 5.0, &[]),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::CREATED).await.unwrap();
}

#[tokio::test]
async fn test_password_reset_rate_limited() {
    let server = TestServer::start().await.unwrap();
    server.seed("student1", Role::Regular).unwrap();
    let body = json!({ "utorid": "student1" });

    let issued: Value = assert_json(
        server.post("/api/v1/auth/resets", &body).await.unwrap(),
        StatusCode::ACCEPTED,
    )
    .await
    .unwrap();
    assert!(issued["resetToken"].as_str().is_some());

    let response = server.post("/api/v1/auth/resets", &body).await.unwrap();
    let code = assert_error(response, StatusCode::TOO_MANY_REQUESTS)
        .await
        .unwrap();
    assert_eq!(code, "RATE_LIMITED");
}

#[tokio::test]
async fn test_password_reset_ignores_spoofed_forwarded_for() {
    let server = TestServer::start().await.unwrap();
    server.seed("student1", Role::Regular).unwrap();
    let body = json!({ "utorid": "student1" });

    let mut statuses = Vec::new();
    for hop in ["203.0.113.1", "203.0.113.2", "203.0.113.3"] {
        let response = server
            .client
            .post(server.url("/api/v1/auth/resets"))
            .header("X-Forwarded-For", hop)
            .json(&body)
            .send()
            .await
            .unwrap();
        statuses.push(response.status());
    }

    assert_eq!(
        statuses,
        vec![
            StatusCode::ACCEPTED,
            StatusCode::TOO_MANY_REQUESTS,
            StatusCode::TOO_MANY_REQUESTS,
        ]
    );
}

#[tokio::test]
async fn test_account_lifecycle() {
    let server = TestServer::start().await.unwrap();
    let manager = server.seed("manager1", Role::Manager).unwrap();
    let cashier = server.seed("cashier1", Role::Cashier).unwrap();

    let registered: Value = assert_json(
        server
            .post_auth(
                "/api/v1/users",
                &cashier.token,
                &json!({
                    "utorid": "newbie01",
                    "name": "New Student",
                    "email": "newbie01@mail.utoronto.ca",
                }),
            )
            .await
            .unwrap(),
        StatusCode::CREATED,
    )
    .await
    .unwrap();
    let reset_path = format!(
        "/api/v1/auth/resets/{}",
        registered["resetToken"].as_str().unwrap()
    );
    let credentials = json!({ "utorid": "newbie01", "password": "Ledger#2024" });

    let response = server
        .post("/api/v1/auth/resets/not-a-token", &credentials)
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::NOT_FOUND).await.unwrap();
    assert_eq!(code, "UNKNOWN_RESET_TOKEN");

    let response = server
        .post(&reset_path, &json!({ "utorid": "cashier1", "password": "Ledger#2024" }))
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(code, "INVALID_CREDENTIALS");

    let response = server.post(&reset_path, &credentials).await.unwrap();
    assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

    let response = server.post(&reset_path, &credentials).await.unwrap();
    let code = assert_error(response, StatusCode::GONE).await.unwrap();
    assert_eq!(code, "RESET_TOKEN_EXPIRED");

    let response = server
        .post(
            "/api/v1/auth/tokens",
            &json!({ "utorid": "newbie01", "password": "wrong#Pass1" }),
        )
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::UNAUTHORIZED).await.unwrap();
    assert_eq!(code, "INVALID_CREDENTIALS");

    let login: Value = assert_json(
        server.post("/api/v1/auth/tokens", &credentials).await.unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert!(login["expiresAt"].is_string());
    let token = login["token"].as_str().unwrap().to_string();

    let me: Value = assert_json(
        server.get_auth("/api/v1/users/me", &token).await.unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(me["utorid"], "newbie01");
    assert!(me["lastLogin"].is_string());

    let edited: Value = assert_json(
        server
            .patch_auth(
                "/api/v1/users/me",
                &token,
                &json!({ "name": "Renamed", "birthday": "2001-09-30" }),
            )
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(edited["name"], "Renamed");
    assert_eq!(edited["birthday"], "2001-09-30");
    assert_eq!(edited["verified"], false);

    let response = server
        .patch_auth("/api/v1/users/me", &token, &json!({}))
        .await
        .unwrap();
    assert_status(response, StatusCode::BAD_REQUEST).await.unwrap();

    let response = server
        .patch_auth(
            "/api/v1/users/me/password",
            &token,
            &json!({ "old": "Ledger#2025", "new": "Points&Perks1" }),
        )
        .await
        .unwrap();
    let code = assert_error(response, StatusCode::FORBIDDEN).await.unwrap();
    assert_eq!(code, "INCORRECT_PASSWORD");

    let response = server
        .patch_auth(
            "/api/v1/users/me/password",
            &token,
            &json!({ "old": "Ledger#2024", "new": "Points&Perks1" }),
        )
        .await
        .unwrap();
    assert_status(response, StatusCode::NO_CONTENT).await.unwrap();

    let listing: Value = assert_json(
        server
            .get_auth("/api/v1/users?activated=true", &manager.token)
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(listing["count"], 1);
    assert_eq!(listing["results"][0]["utorid"], "newbie01");
    assert!(listing["results"][0].get("promotions").is_none());

    let listing: Value = assert_json(
        server
            .get_auth("/api/v1/users?role=cashier&page=1&limit=5", &manager.token)
            .await
            .unwrap(),
        StatusCode::OK,
    )
    .await
    .unwrap();
    assert_eq!(listing["count"], 1);

    let response = server.get_auth("/api/v1/users", &token).await.unwrap();
    assert_status(response, StatusCode::FORBIDDEN).await.unwrap();
}
