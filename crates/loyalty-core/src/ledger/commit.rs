//! Atomic ledger commit plan
//!
//! Handlers never touch balances directly. They validate against a snapshot,
//! then describe the full effect as a [`LedgerCommit`]. The repository applies
//! the plan as one unit of work after re-checking every [`CommitGuard`]
//! against locked rows, so a concurrent request that raced past validation
//! is rejected instead of overspending.

use crate::entities::NewTransaction;
use crate::error::DomainError;
use crate::value_objects::{EventId, PromotionId, TransactionId, UserId, Utorid};

/// Largest magnitude accepted for a single caller-supplied point amount
pub const MAX_POINT_AMOUNT: i64 = 1_000_000_000;

/// `balance + delta`, rejected when the result leaves the `i64` range
pub fn checked_balance(balance: i64, delta: i64) -> Result<i64, DomainError> {
    balance
        .checked_add(delta)
        .ok_or_else(|| DomainError::InvalidAmount("balance out of range".to_string()))
}

/// Precondition re-evaluated inside the unit of work
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CommitGuard {
    /// User balance must be at least `at_least` before deltas apply
    MinBalance { user_id: UserId, at_least: i64 },
    /// Event pool must still hold `at_least` points
    EventPoolAvailable { event_id: EventId, at_least: i64 },
    /// One-time promotion must not have been consumed by this user
    PromotionUnused { user_id: UserId, promotion_id: PromotionId },
    /// Redemption row must still be pending
    RedemptionPending { transaction_id: TransactionId },
    /// Suspicious flag must still hold the value the caller saw
    SuspiciousIs { transaction_id: TransactionId, current: bool },
}

/// Signed change to one user's balance
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BalanceDelta {
    pub user_id: UserId,
    pub delta: i64,
}

/// Points moved out of an event pool into `points_awarded`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolDraw {
    pub event_id: EventId,
    pub amount: i64,
}

/// Everything a single ledger operation changes
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LedgerCommit {
    pub guards: Vec<CommitGuard>,
    pub entries: Vec<NewTransaction>,
    pub balance_deltas: Vec<BalanceDelta>,
    pub pool_draws: Vec<PoolDraw>,
    pub promotion_usages: Vec<(UserId, PromotionId)>,
    pub mark_processed: Option<(TransactionId, Utorid)>,
    pub set_suspicious: Option<(TransactionId, bool)>,
}

impl LedgerCommit {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn guard(mut self, guard: CommitGuard) -> Self {
        self.guards.push(guard);
        self
    }

    pub fn entry(mut self, entry: NewTransaction) -> Self {
        self.entries.push(entry);
        self
    }

    /// Zero deltas are dropped
    pub fn credit(mut self, user_id: UserId, delta: i64) -> Self {
        if delta != 0 {
            self.balance_deltas.push(BalanceDelta { user_id, delta });
        }
        self
    }

    pub fn draw_pool(mut self, event_id: EventId, amount: i64) -> Self {
        if amount != 0 {
            self.pool_draws.push(PoolDraw { event_id, amount });
        }
        self
    }

    pub fn use_promotion(mut self, user_id: UserId, promotion_id: PromotionId) -> Self {
        self.promotion_usages.push((user_id, promotion_id));
        self
    }

    pub fn process(mut self, transaction_id: TransactionId, by: Utorid) -> Self {
        self.mark_processed = Some((transaction_id, by));
        self
    }

    pub fn flag_suspicious(mut self, transaction_id: TransactionId, value: bool) -> Self {
        self.set_suspicious = Some((transaction_id, value));
        self
    }

    /// Net balance change this plan applies to `user_id`
    pub fn net_delta_for(&self, user_id: UserId) -> i64 {
        self.balance_deltas
            .iter()
            .filter(|d| d.user_id == user_id)
            .map(|d| d.delta)
            .sum()
    }

    /// Total points drawn from event pools
    pub fn pool_total(&self) -> i64 {
        self.pool_draws.iter().map(|d| d.amount).sum()
    }

    /// A plan with no rows and no side effects
    pub fn is_noop(&self) -> bool {
        self.entries.is_empty()
            && self.balance_deltas.is_empty()
            && self.pool_draws.is_empty()
            && self.promotion_usages.is_empty()
            && self.mark_processed.is_none()
            && self.set_suspicious.is_none()
    }
}
