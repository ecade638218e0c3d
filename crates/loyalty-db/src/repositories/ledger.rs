//! PostgreSQL implementation of LedgerRepository
//!
//! A commit runs inside one database transaction. Every user and event row
//! the plan touches is locked in id order before the guards are evaluated,
//! so two commits that share rows serialize instead of deadlocking.

use async_trait::async_trait;
use sqlx::{PgConnection, PgPool, Postgres, QueryBuilder};
use tracing::{debug, instrument};

use loyalty_core::entities::{NewTransaction, Transaction, TransactionKind};
use loyalty_core::error::DomainError;
use loyalty_core::ledger::{AmountComparison, CommitGuard, LedgerCommit, TransactionFilter};
use loyalty_core::traits::{LedgerRepository, RepoResult};
use loyalty_core::value_objects::{EventId, TransactionId, UserId};

use crate::models::{InsertedRow, TransactionModel};

use super::error::{map_db_error, map_points_overflow, map_unique_violation};

const TRANSACTION_COLUMNS: &str = "t.id, t.utorid, t.kind, t.spent, t.amount, t.earned, \
     t.related_id, \
     ARRAY(SELECT tp.promotion_id FROM transaction_promotions tp \
           WHERE tp.transaction_id = t.id ORDER BY tp.promotion_id) AS promotion_ids, \
     t.suspicious, t.processed_by, t.remark, t.created_by, t.created_at";

/// PostgreSQL implementation of LedgerRepository
#[derive(Clone)]
pub struct PgLedgerRepository {
    pool: PgPool,
}

impl PgLedgerRepository {
    /// Create a new PgLedgerRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, filter: &TransactionFilter) {
        builder.push(" WHERE TRUE");
        if let Some(utorid) = &filter.utorid {
            builder
                .push(" AND t.utorid = ")
                .push_bind(utorid.as_str().to_owned());
        }
        if let Some(utorids) = &filter.utorids {
            let utorids: Vec<String> = utorids.iter().map(|u| u.as_str().to_owned()).collect();
            builder.push(" AND t.utorid = ANY(").push_bind(utorids).push(")");
        }
        if let Some(kind) = filter.kind {
            builder.push(" AND t.kind = ").push_bind(kind.as_str());
        }
        if let Some(created_by) = &filter.created_by {
            builder
                .push(" AND t.created_by = ")
                .push_bind(created_by.as_str().to_owned());
        }
        if let Some(suspicious) = filter.suspicious {
            builder.push(" AND t.suspicious = ").push_bind(suspicious);
        }
        if let Some(promotion_id) = filter.promotion_id {
            builder
                .push(
                    " AND EXISTS (SELECT 1 FROM transaction_promotions tp \
                     WHERE tp.transaction_id = t.id AND tp.promotion_id = ",
                )
                .push_bind(promotion_id.into_inner())
                .push(")");
        }
        if let Some(related_id) = filter.related_id {
            builder.push(" AND t.related_id = ").push_bind(related_id);
        }
        match filter.amount {
            Some(AmountComparison::Gte(bound)) => {
                builder.push(" AND t.amount >= ").push_bind(bound);
            }
            Some(AmountComparison::Lte(bound)) => {
                builder.push(" AND t.amount <= ").push_bind(bound);
            }
            None => {}
        }
    }

    /// Lock every user and event row the plan touches, in id order
    async fn lock_rows(conn: &mut PgConnection, commit: &LedgerCommit) -> RepoResult<()> {
        let mut user_ids: Vec<i64> = commit
            .balance_deltas
            .iter()
            .map(|d| d.user_id.into_inner())
            .chain(commit.guards.iter().filter_map(|g| match g {
                CommitGuard::MinBalance { user_id, .. } => Some(user_id.into_inner()),
                _ => None,
            }))
            .collect();
        user_ids.sort_unstable();
        user_ids.dedup();

        let mut event_ids: Vec<i64> = commit
            .pool_draws
            .iter()
            .map(|d| d.event_id.into_inner())
            .chain(commit.guards.iter().filter_map(|g| match g {
                CommitGuard::EventPoolAvailable { event_id, .. } => Some(event_id.into_inner()),
                _ => None,
            }))
            .collect();
        event_ids.sort_unstable();
        event_ids.dedup();

        if !user_ids.is_empty() {
            sqlx::query("SELECT id FROM users WHERE id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(&user_ids)
                .execute(&mut *conn)
                .await
                .map_err(map_db_error)?;
        }
        if !event_ids.is_empty() {
            sqlx::query("SELECT id FROM events WHERE id = ANY($1) ORDER BY id FOR UPDATE")
                .bind(&event_ids)
                .execute(&mut *conn)
                .await
                .map_err(map_db_error)?;
        }

        Ok(())
    }

    async fn pool_remaining(conn: &mut PgConnection, event_id: EventId) -> RepoResult<i64> {
        sqlx::query_scalar::<_, i64>("SELECT points_remain FROM events WHERE id = $1")
            .bind(event_id.into_inner())
            .fetch_optional(&mut *conn)
            .await
            .map_err(map_db_error)?
            .ok_or(DomainError::EventNotFound(event_id))
    }

    async fn check_guard(conn: &mut PgConnection, guard: &CommitGuard) -> RepoResult<()> {
        match guard {
            CommitGuard::MinBalance { user_id, at_least } => {
                let points =
                    sqlx::query_scalar::<_, i64>("SELECT points FROM users WHERE id = $1")
                        .bind(user_id.into_inner())
                        .fetch_optional(&mut *conn)
                        .await
                        .map_err(map_db_error)?
                        .ok_or_else(|| DomainError::UserNotFound(user_id.to_string()))?;
                if points < *at_least {
                    return Err(DomainError::InsufficientPoints {
                        available: points,
                        required: *at_least,
                    });
                }
            }
            CommitGuard::EventPoolAvailable { event_id, at_least } => {
                let remaining = Self::pool_remaining(conn, *event_id).await?;
                if remaining < *at_least {
                    return Err(DomainError::PoolExhausted {
                        remaining,
                        requested: *at_least,
                    });
                }
            }
            CommitGuard::PromotionUnused {
                user_id,
                promotion_id,
            } => {
                let used = sqlx::query_scalar::<_, bool>(
                    r#"
                    SELECT EXISTS(
                        SELECT 1 FROM promotion_usages WHERE user_id = $1 AND promotion_id = $2
                    )
                    "#,
                )
                .bind(user_id.into_inner())
                .bind(promotion_id.into_inner())
                .fetch_one(&mut *conn)
                .await
                .map_err(map_db_error)?;
                if used {
                    return Err(DomainError::PromotionAlreadyUsed(*promotion_id));
                }
            }
            CommitGuard::RedemptionPending { transaction_id } => {
                let (kind, processed_by) = sqlx::query_as::<_, (String, Option<String>)>(
                    "SELECT kind, processed_by FROM transactions WHERE id = $1 FOR UPDATE",
                )
                .bind(transaction_id.into_inner())
                .fetch_optional(&mut *conn)
                .await
                .map_err(map_db_error)?
                .ok_or(DomainError::TransactionNotFound(*transaction_id))?;
                if kind != TransactionKind::Redemption.as_str() {
                    return Err(DomainError::NotARedemption(*transaction_id));
                }
                if processed_by.is_some() {
                    return Err(DomainError::RedemptionAlreadyProcessed(*transaction_id));
                }
            }
            CommitGuard::SuspiciousIs {
                transaction_id,
                current,
            } => {
                let suspicious = sqlx::query_scalar::<_, bool>(
                    "SELECT suspicious FROM transactions WHERE id = $1 FOR UPDATE",
                )
                .bind(transaction_id.into_inner())
                .fetch_optional(&mut *conn)
                .await
                .map_err(map_db_error)?
                .ok_or(DomainError::TransactionNotFound(*transaction_id))?;
                if suspicious != *current {
                    return Err(DomainError::StaleWrite);
                }
            }
        }
        Ok(())
    }

    async fn insert_entry(conn: &mut PgConnection, entry: NewTransaction) -> RepoResult<Transaction> {
        let row = sqlx::query_as::<_, InsertedRow>(
            r#"
            INSERT INTO transactions
                (utorid, kind, spent, amount, earned, related_id, suspicious, remark, created_by)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            RETURNING id, created_at
            "#,
        )
        .bind(entry.utorid.as_str())
        .bind(entry.kind.as_str())
        .bind(entry.spent)
        .bind(entry.amount)
        .bind(entry.earned)
        .bind(entry.related_id)
        .bind(entry.suspicious)
        .bind(&entry.remark)
        .bind(entry.created_by.as_str())
        .fetch_one(&mut *conn)
        .await
        .map_err(map_db_error)?;

        if !entry.promotion_ids.is_empty() {
            let ids: Vec<i64> = entry.promotion_ids.iter().map(|p| p.into_inner()).collect();
            sqlx::query(
                r#"
                INSERT INTO transaction_promotions (transaction_id, promotion_id)
                SELECT $1, UNNEST($2::BIGINT[])
                "#,
            )
            .bind(row.id)
            .bind(&ids)
            .execute(&mut *conn)
            .await
            .map_err(map_db_error)?;
        }

        Ok(Transaction {
            id: TransactionId::new(row.id),
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
            created_at: row.created_at,
        })
    }
}

#[async_trait]
impl LedgerRepository for PgLedgerRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: TransactionId) -> RepoResult<Option<Transaction>> {
        let result = sqlx::query_as::<_, TransactionModel>(&format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions t WHERE t.id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Transaction::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn query(&self, filter: &TransactionFilter) -> RepoResult<Vec<Transaction>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {TRANSACTION_COLUMNS} FROM transactions t"
        ));
        Self::push_filters(&mut builder, filter);
        builder
            .push(" ORDER BY t.id DESC LIMIT ")
            .push_bind(filter.limit)
            .push(" OFFSET ")
            .push_bind(filter.offset);

        let models = builder
            .build_query_as::<TransactionModel>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        models.into_iter().map(Transaction::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn count(&self, filter: &TransactionFilter) -> RepoResult<i64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM transactions t");
        Self::push_filters(&mut builder, filter);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    #[instrument(skip(self, commit), fields(entries = commit.entries.len()))]
    async fn commit(&self, commit: LedgerCommit) -> RepoResult<Vec<Transaction>> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        Self::lock_rows(&mut *tx, &commit).await?;
        for guard in &commit.guards {
            Self::check_guard(&mut *tx, guard).await?;
        }

        let LedgerCommit {
            entries,
            balance_deltas,
            pool_draws,
            promotion_usages,
            mark_processed,
            set_suspicious,
            ..
        } = commit;

        let mut appended = Vec::with_capacity(entries.len());
        for entry in entries {
            appended.push(Self::insert_entry(&mut *tx, entry).await?);
        }

        for delta in &balance_deltas {
            let result = sqlx::query("UPDATE users SET points = points + $2 WHERE id = $1")
                .bind(delta.user_id.into_inner())
                .bind(delta.delta)
                .execute(&mut *tx)
                .await
                .map_err(map_points_overflow)?;
            if result.rows_affected() == 0 {
                return Err(DomainError::UserNotFound(delta.user_id.to_string()));
            }
        }

        for draw in &pool_draws {
            let result = sqlx::query(
                r#"
                UPDATE events
                SET points_remain = points_remain - $2, points_awarded = points_awarded + $2
                WHERE id = $1 AND points_remain >= $2
                "#,
            )
            .bind(draw.event_id.into_inner())
            .bind(draw.amount)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
            if result.rows_affected() == 0 {
                let remaining = Self::pool_remaining(&mut *tx, draw.event_id).await?;
                return Err(DomainError::PoolExhausted {
                    remaining,
                    requested: draw.amount,
                });
            }
        }

        for (user_id, promotion_id) in promotion_usages {
            sqlx::query("INSERT INTO promotion_usages (user_id, promotion_id) VALUES ($1, $2)")
                .bind(user_id.into_inner())
                .bind(promotion_id.into_inner())
                .execute(&mut *tx)
                .await
                .map_err(|e| {
                    map_unique_violation(e, || DomainError::PromotionAlreadyUsed(promotion_id))
                })?;
        }

        if let Some((transaction_id, by)) = mark_processed {
            let result = sqlx::query(
                "UPDATE transactions SET processed_by = $2 WHERE id = $1 AND processed_by IS NULL",
            )
            .bind(transaction_id.into_inner())
            .bind(by.as_str())
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
            if result.rows_affected() == 0 {
                return Err(DomainError::RedemptionAlreadyProcessed(transaction_id));
            }
        }

        if let Some((transaction_id, value)) = set_suspicious {
            let result = sqlx::query(
                "UPDATE transactions SET suspicious = $2 WHERE id = $1 AND suspicious <> $2",
            )
            .bind(transaction_id.into_inner())
            .bind(value)
            .execute(&mut *tx)
            .await
            .map_err(map_db_error)?;
            if result.rows_affected() == 0 {
                return Err(DomainError::StaleWrite);
            }
        }

        tx.commit().await.map_err(map_db_error)?;

        debug!(rows = appended.len(), "Ledger commit applied");
        Ok(appended)
    }
}
