//! Shared fixtures for service tests

#![allow(dead_code)]

use std::sync::Arc;

use chrono::{Duration, Utc};
use rust_decimal::Decimal;

use loyalty_common::JwtService;
use loyalty_core::{Caller, EventId, PromotionId, PromotionKind, Role, User, Utorid};
use loyalty_db::MemoryStore;
use loyalty_service::dto::{
    CreateEventRequest, CreatePromotionRequest, PurchaseRequest, TransactionOutcome,
    TransactionRequest, TransactionResponse,
};
use loyalty_service::{
    EventService, PromotionService, ServiceContext, ServiceContextBuilder, TransactionService,
};

/// Service context over a fresh in-memory store
pub struct Harness {
    pub store: MemoryStore,
    pub ctx: ServiceContext,
}

impl Harness {
    pub fn new() -> Self {
        let store = MemoryStore::new();
        let ctx = ServiceContextBuilder::new()
            .memory(&store)
            .jwt_service(Arc::new(JwtService::new("service-test-secret", 3600)))
            .build()
            .expect("service context");
        Self { store, ctx }
    }

    /// Seed a verified account and return it with its caller identity
    pub fn user(&self, utorid: &str, role: Role) -> (User, Caller) {
        let user = self.store.seed_user(utorid, utorid, role).expect("seed user");
        let caller = Caller::new(user.id, user.utorid.clone(), user.role);
        (user, caller)
    }

    pub async fn points(&self, utorid: &str) -> i64 {
        use loyalty_core::UserRepository;
        self.store
            .find_by_utorid(&Utorid::new_unchecked(utorid))
            .await
            .unwrap()
            .expect("user exists")
            .points
    }

    pub async fn purchase(
        &self,
        cashier: &Caller,
        utorid: &str,
        spent: i64,
        promotion_ids: Vec<PromotionId>,
    ) -> Result<TransactionResponse, loyalty_service::ServiceError> {
        let request = TransactionRequest::Purchase(PurchaseRequest {
            utorid: Utorid::new_unchecked(utorid),
            spent: Decimal::from(spent),
            promotion_ids,
            remark: None,
        });
        TransactionService::new(&self.ctx)
            .create_transaction(cashier, request)
            .await
            .map(single)
    }

    /// A promotion that started an hour ago and runs for another day
    pub async fn running_promotion(
        &self,
        manager: &Caller,
        kind: PromotionKind,
        points: Option<i64>,
        min_spending: Option<Decimal>,
    ) -> PromotionId {
        let now = Utc::now();
        PromotionService::new(&self.ctx)
            .create_promotion(
                manager,
                CreatePromotionRequest {
                    name: "Welcome bonus".to_string(),
                    description: "Extra points".to_string(),
                    kind,
                    start_time: now - Duration::hours(1),
                    end_time: now + Duration::days(1),
                    min_spending,
                    rate: None,
                    points,
                },
            )
            .await
            .expect("create promotion")
            .id
    }

    /// An unpublished event tomorrow with the given pool
    pub async fn event(&self, manager: &Caller, points: i64, capacity: Option<i32>) -> EventId {
        let now = Utc::now();
        EventService::new(&self.ctx)
            .create_event(
                manager,
                CreateEventRequest {
                    name: "Game night".to_string(),
                    description: "Board games in the lounge".to_string(),
                    location: "BA3200".to_string(),
                    start_time: now + Duration::days(1),
                    end_time: now + Duration::days(1) + Duration::hours(3),
                    capacity,
                    points,
                },
            )
            .await
            .expect("create event")
            .id
    }
}

/// Unwrap an outcome that must hold exactly one row
pub fn single(outcome: TransactionOutcome) -> TransactionResponse {
    match outcome {
        TransactionOutcome::One(row) => row,
        TransactionOutcome::Many(rows) => panic!("expected one row, got {}", rows.len()),
    }
}
