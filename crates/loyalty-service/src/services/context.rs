//! Service context - dependency container for services
//!
//! Holds the repositories, the token service and the reset limiter.

use std::num::NonZeroU32;
use std::sync::Arc;

use loyalty_common::auth::JwtService;
use loyalty_common::{AccountConfig, GovernorRateLimiter, KeyedRateLimiter};
use loyalty_core::traits::{
    EventRepository, LedgerRepository, PromotionRepository, UserRepository,
};
use loyalty_db::{
    MemoryStore, PgEventRepository, PgLedgerRepository, PgPool, PgPromotionRepository,
    PgUserRepository,
};

use super::error::{ServiceError, ServiceResult};

/// Service context containing all dependencies
///
/// Cloning is cheap; every dependency sits behind an `Arc`.
#[derive(Clone)]
pub struct ServiceContext {
    // Repositories
    user_repo: Arc<dyn UserRepository>,
    promotion_repo: Arc<dyn PromotionRepository>,
    event_repo: Arc<dyn EventRepository>,
    ledger: Arc<dyn LedgerRepository>,

    // Services
    jwt_service: Arc<JwtService>,
    reset_limiter: Arc<dyn KeyedRateLimiter>,

    accounts: AccountConfig,
}

impl ServiceContext {
    /// Create a new service context with all dependencies
    pub fn new(
        user_repo: Arc<dyn UserRepository>,
        promotion_repo: Arc<dyn PromotionRepository>,
        event_repo: Arc<dyn EventRepository>,
        ledger: Arc<dyn LedgerRepository>,
        jwt_service: Arc<JwtService>,
        reset_limiter: Arc<dyn KeyedRateLimiter>,
        accounts: AccountConfig,
    ) -> Self {
        Self {
            user_repo,
            promotion_repo,
            event_repo,
            ledger,
            jwt_service,
            reset_limiter,
            accounts,
        }
    }

    // === Repositories ===

    /// Get the user repository
    pub fn user_repo(&self) -> &dyn UserRepository {
        self.user_repo.as_ref()
    }

    /// Get the promotion repository
    pub fn promotion_repo(&self) -> &dyn PromotionRepository {
        self.promotion_repo.as_ref()
    }

    /// Get the event repository
    pub fn event_repo(&self) -> &dyn EventRepository {
        self.event_repo.as_ref()
    }

    /// Get the ledger
    pub fn ledger(&self) -> &dyn LedgerRepository {
        self.ledger.as_ref()
    }

    // === Services ===

    /// Get the JWT service
    pub fn jwt_service(&self) -> &JwtService {
        self.jwt_service.as_ref()
    }

    /// Limiter guarding password reset requests
    pub fn reset_limiter(&self) -> &dyn KeyedRateLimiter {
        self.reset_limiter.as_ref()
    }

    pub fn accounts(&self) -> &AccountConfig {
        &self.accounts
    }
}

impl std::fmt::Debug for ServiceContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ServiceContext")
            .field("repositories", &"...")
            .field("accounts", &self.accounts)
            .finish()
    }
}

/// Builder for creating ServiceContext with custom configuration
#[derive(Default)]
pub struct ServiceContextBuilder {
    user_repo: Option<Arc<dyn UserRepository>>,
    promotion_repo: Option<Arc<dyn PromotionRepository>>,
    event_repo: Option<Arc<dyn EventRepository>>,
    ledger: Option<Arc<dyn LedgerRepository>>,
    jwt_service: Option<Arc<JwtService>>,
    reset_limiter: Option<Arc<dyn KeyedRateLimiter>>,
    accounts: AccountConfig,
}

impl ServiceContextBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wire all four repositories to PostgreSQL
    pub fn postgres(self, pool: PgPool) -> Self {
        self.user_repo(Arc::new(PgUserRepository::new(pool.clone())))
            .promotion_repo(Arc::new(PgPromotionRepository::new(pool.clone())))
            .event_repo(Arc::new(PgEventRepository::new(pool.clone())))
            .ledger(Arc::new(PgLedgerRepository::new(pool)))
    }

    /// Wire all four repositories to one shared in-memory store
    pub fn memory(self, store: &MemoryStore) -> Self {
        self.user_repo(Arc::new(store.clone()))
            .promotion_repo(Arc::new(store.clone()))
            .event_repo(Arc::new(store.clone()))
            .ledger(Arc::new(store.clone()))
    }

    pub fn user_repo(mut self, repo: Arc<dyn UserRepository>) -> Self {
        self.user_repo = Some(repo);
        self
    }

    pub fn promotion_repo(mut self, repo: Arc<dyn PromotionRepository>) -> Self {
        self.promotion_repo = Some(repo);
        self
    }

    pub fn event_repo(mut self, repo: Arc<dyn EventRepository>) -> Self {
        self.event_repo = Some(repo);
        self
    }

    pub fn ledger(mut self, repo: Arc<dyn LedgerRepository>) -> Self {
        self.ledger = Some(repo);
        self
    }

    pub fn jwt_service(mut self, service: Arc<JwtService>) -> Self {
        self.jwt_service = Some(service);
        self
    }

    pub fn reset_limiter(mut self, limiter: Arc<dyn KeyedRateLimiter>) -> Self {
        self.reset_limiter = Some(limiter);
        self
    }

    pub fn accounts(mut self, accounts: AccountConfig) -> Self {
        self.accounts = accounts;
        self
    }

    /// Build the ServiceContext
    ///
    /// Without an explicit limiter, one is built from
    /// `accounts.reset_requests_per_minute`.
    ///
    /// # Errors
    /// Returns `ServiceError::Validation` if any required dependency is missing
    pub fn build(self) -> ServiceResult<ServiceContext> {
        let reset_limiter = match self.reset_limiter {
            Some(limiter) => limiter,
            None => {
                let per_minute = NonZeroU32::new(self.accounts.reset_requests_per_minute)
                    .ok_or_else(|| {
                        ServiceError::validation("reset_requests_per_minute must be positive")
                    })?;
                Arc::new(GovernorRateLimiter::per_minute(per_minute))
            }
        };

        Ok(ServiceContext::new(
            self.user_repo
                .ok_or_else(|| ServiceError::validation("user_repo is required"))?,
            self.promotion_repo
                .ok_or_else(|| ServiceError::validation("promotion_repo is required"))?,
            self.event_repo
                .ok_or_else(|| ServiceError::validation("event_repo is required"))?,
            self.ledger
                .ok_or_else(|| ServiceError::validation("ledger is required"))?,
            self.jwt_service
                .ok_or_else(|| ServiceError::validation("jwt_service is required"))?,
            reset_limiter,
            self.accounts,
        ))
    }
}
