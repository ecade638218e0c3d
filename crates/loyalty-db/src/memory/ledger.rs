//! Ledger commits against the in-memory state
//!
//! A commit is checked in full against the locked state first and only then
//! written, so a rejected plan leaves no partial effects behind.

use std::collections::{BTreeMap, HashSet};

use async_trait::async_trait;
use chrono::Utc;
use tracing::{debug, instrument};

use loyalty_core::entities::Transaction;
use loyalty_core::error::DomainError;
use loyalty_core::ledger::{checked_balance, CommitGuard, LedgerCommit, TransactionFilter};
use loyalty_core::traits::{LedgerRepository, RepoResult};
use loyalty_core::value_objects::{EventId, TransactionId, UserId};

use super::{count, page, MemoryStore, State};

fn check_guard(state: &State, guard: &CommitGuard) -> RepoResult<()> {
    match guard {
        CommitGuard::MinBalance { user_id, at_least } => {
            let user = state
                .users
                .get(user_id)
                .ok_or_else(|| DomainError::UserNotFound(user_id.to_string()))?;
            if !user.can_afford(*at_least) {
                return Err(DomainError::InsufficientPoints {
                    available: user.points,
                    required: *at_least,
                });
            }
        }
        CommitGuard::EventPoolAvailable { event_id, at_least } => {
            let event = state
                .events
                .get(event_id)
                .ok_or(DomainError::EventNotFound(*event_id))?;
            if !event.can_award(*at_least) {
                return Err(DomainError::PoolExhausted {
                    remaining: event.points_remain,
                    requested: *at_least,
                });
            }
        }
        CommitGuard::PromotionUnused {
            user_id,
            promotion_id,
        } => {
            if state.usages.contains(&(*user_id, *promotion_id)) {
                return Err(DomainError::PromotionAlreadyUsed(*promotion_id));
            }
        }
        CommitGuard::RedemptionPending { transaction_id } => {
            let tx = state
                .transactions
                .get(transaction_id)
                .ok_or(DomainError::TransactionNotFound(*transaction_id))?;
            if !tx.is_redemption() {
                return Err(DomainError::NotARedemption(*transaction_id));
            }
            if tx.is_processed() {
                return Err(DomainError::RedemptionAlreadyProcessed(*transaction_id));
            }
        }
        CommitGuard::SuspiciousIs {
            transaction_id,
            current,
        } => {
            let tx = state
                .transactions
                .get(transaction_id)
                .ok_or(DomainError::TransactionNotFound(*transaction_id))?;
            if tx.suspicious != *current {
                return Err(DomainError::StaleWrite);
            }
        }
    }
    Ok(())
}

/// Post-commit values for every user balance and event pool a plan touches
struct Resolved {
    balances: BTreeMap<UserId, i64>,
    pools: BTreeMap<EventId, (i64, i64)>,
}

/// Evaluate guards and every conditional write without mutating anything
fn resolve(state: &State, commit: &LedgerCommit) -> RepoResult<Resolved> {
    for guard in &commit.guards {
        check_guard(state, guard)?;
    }

    for entry in &commit.entries {
        if state.user_by_utorid(&entry.utorid).is_none() {
            return Err(DomainError::UserNotFound(entry.utorid.to_string()));
        }
    }

    let mut balances = BTreeMap::new();
    for delta in &commit.balance_deltas {
        let current = match balances.get(&delta.user_id) {
            Some(points) => *points,
            None => state
                .users
                .get(&delta.user_id)
                .map(|u| u.points)
                .ok_or_else(|| DomainError::UserNotFound(delta.user_id.to_string()))?,
        };
        balances.insert(delta.user_id, checked_balance(current, delta.delta)?);
    }

    let mut pools = BTreeMap::new();
    for draw in &commit.pool_draws {
        let (remain, awarded) = match pools.get(&draw.event_id) {
            Some(pool) => *pool,
            None => state
                .events
                .get(&draw.event_id)
                .map(|e| (e.points_remain, e.points_awarded))
                .ok_or(DomainError::EventNotFound(draw.event_id))?,
        };
        if remain < draw.amount {
            return Err(DomainError::PoolExhausted {
                remaining: remain,
                requested: draw.amount,
            });
        }
        pools.insert(draw.event_id, (remain - draw.amount, awarded + draw.amount));
    }

    let mut usages = HashSet::new();
    for usage in &commit.promotion_usages {
        if state.usages.contains(usage) || !usages.insert(*usage) {
            return Err(DomainError::PromotionAlreadyUsed(usage.1));
        }
    }

    if let Some((transaction_id, _)) = &commit.mark_processed {
        let tx = state
            .transactions
            .get(transaction_id)
            .ok_or(DomainError::TransactionNotFound(*transaction_id))?;
        if tx.is_processed() {
            return Err(DomainError::RedemptionAlreadyProcessed(*transaction_id));
        }
    }

    if let Some((transaction_id, value)) = &commit.set_suspicious {
        let tx = state
            .transactions
            .get(transaction_id)
            .ok_or(DomainError::TransactionNotFound(*transaction_id))?;
        if tx.suspicious == *value {
            return Err(DomainError::StaleWrite);
        }
    }

    Ok(Resolved { balances, pools })
}

/// Apply a plan that [`resolve`] accepted. Nothing here can fail.
fn write(state: &mut State, commit: LedgerCommit, resolved: Resolved) -> Vec<Transaction> {
    let mut appended = Vec::with_capacity(commit.entries.len());
    for entry in commit.entries {
        let row = Transaction {
            id: TransactionId::new(state.next_id()),
            utorid: entry.utorid,
            kind: entry.kind,
            spent: entry.spent,
            amount: entry.amount,
            earned: entry.earned,
            related_id: entry.related_id,
            promotion_ids: entry.promotion_ids,
            suspicious: entry.suspicious,
            processed_by: None,
            remark: entry.remark,
            created_by: entry.created_by,
            created_at: Utc::now(),
        };
        state.transactions.insert(row.id, row.clone());
        appended.push(row);
    }

    for (user_id, points) in resolved.balances {
        if let Some(user) = state.users.get_mut(&user_id) {
            user.points = points;
        }
    }

    for (event_id, (remain, awarded)) in resolved.pools {
        if let Some(event) = state.events.get_mut(&event_id) {
            event.points_remain = remain;
            event.points_awarded = awarded;
        }
    }

    state.usages.extend(commit.promotion_usages);

    if let Some((transaction_id, by)) = commit.mark_processed {
        if let Some(tx) = state.transactions.get_mut(&transaction_id) {
            tx.processed_by = Some(by);
        }
    }

    if let Some((transaction_id, value)) = commit.set_suspicious {
        if let Some(tx) = state.transactions.get_mut(&transaction_id) {
            tx.suspicious = value;
        }
    }

    appended
}

#[async_trait]
impl LedgerRepository for MemoryStore {
    async fn find_by_id(&self, id: TransactionId) -> RepoResult<Option<Transaction>> {
        Ok(self.state.lock().transactions.get(&id).cloned())
    }

    async fn query(&self, filter: &TransactionFilter) -> RepoResult<Vec<Transaction>> {
        let state = self.state.lock();
        let rows = state
            .transactions
            .values()
            .rev()
            .filter(|tx| filter.matches(tx))
            .cloned();
        Ok(page(rows, filter.limit, filter.offset))
    }

    async fn count(&self, filter: &TransactionFilter) -> RepoResult<i64> {
        let state = self.state.lock();
        Ok(count(state.transactions.values().filter(|tx| filter.matches(tx))))
    }

    #[instrument(skip(self, commit), fields(entries = commit.entries.len()))]
    async fn commit(&self, commit: LedgerCommit) -> RepoResult<Vec<Transaction>> {
        let mut state = self.state.lock();
        let resolved = resolve(&state, &commit)?;
        let appended = write(&mut state, commit, resolved);

        debug!(rows = appended.len(), "Ledger commit applied");
        Ok(appended)
    }
}
