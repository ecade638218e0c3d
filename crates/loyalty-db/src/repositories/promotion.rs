//! PostgreSQL implementation of PromotionRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use loyalty_core::entities::{NewPromotion, Promotion, PromotionUpdate};
use loyalty_core::error::DomainError;
use loyalty_core::traits::{PromotionQuery, PromotionRepository, RepoResult};
use loyalty_core::value_objects::{PromotionId, UserId};

use crate::models::PromotionModel;

use super::error::{map_db_error, map_unique_violation};

const PROMOTION_COLUMNS: &str =
    "id, name, description, kind, start_time, end_time, min_spending, rate, points";

/// PostgreSQL implementation of PromotionRepository
#[derive(Clone)]
pub struct PgPromotionRepository {
    pool: PgPool,
}

impl PgPromotionRepository {
    /// Create a new PgPromotionRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &PromotionQuery) {
        builder.push(" WHERE TRUE");
        if let Some(name) = &query.name {
            builder.push(" AND name ILIKE ").push_bind(format!("%{name}%"));
        }
        if let Some(kind) = query.kind {
            builder.push(" AND kind = ").push_bind(kind.as_str());
        }
        if query.active_only {
            builder
                .push(" AND start_time <= ")
                .push_bind(query.now)
                .push(" AND end_time >= ")
                .push_bind(query.now);
        }
        if let Some(started) = query.started {
            builder
                .push(if started { " AND start_time <= " } else { " AND start_time > " })
                .push_bind(query.now);
        }
        if let Some(ended) = query.ended {
            builder
                .push(if ended { " AND end_time <= " } else { " AND end_time > " })
                .push_bind(query.now);
        }
    }
}

#[async_trait]
impl PromotionRepository for PgPromotionRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: PromotionId) -> RepoResult<Option<Promotion>> {
        let result = sqlx::query_as::<_, PromotionModel>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(Promotion::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn list(&self, query: &PromotionQuery) -> RepoResult<Vec<Promotion>> {
        let mut builder = QueryBuilder::<Postgres>::new(format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions"
        ));
        Self::push_filters(&mut builder, query);
        builder
            .push(" ORDER BY end_time, id LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let models = builder
            .build_query_as::<PromotionModel>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        models.into_iter().map(Promotion::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn count(&self, query: &PromotionQuery) -> RepoResult<i64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM promotions");
        Self::push_filters(&mut builder, query);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn list_available(&self, now: DateTime<Utc>) -> RepoResult<Vec<Promotion>> {
        let models = sqlx::query_as::<_, PromotionModel>(&format!(
            r#"
            SELECT {PROMOTION_COLUMNS} FROM promotions
            WHERE start_time <= $1 AND end_time > $1
            ORDER BY id
            "#
        ))
        .bind(now)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        models.into_iter().map(Promotion::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn used_promotion_ids(&self, user_id: UserId) -> RepoResult<Vec<PromotionId>> {
        let ids = sqlx::query_scalar::<_, i64>(
            r#"
            SELECT promotion_id FROM promotion_usages WHERE user_id = $1 ORDER BY promotion_id
            "#,
        )
        .bind(user_id.into_inner())
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(ids.into_iter().map(PromotionId::new).collect())
    }

    #[instrument(skip(self))]
    async fn has_usage(&self, user_id: UserId, promotion_id: PromotionId) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            r#"
            SELECT EXISTS(
                SELECT 1 FROM promotion_usages WHERE user_id = $1 AND promotion_id = $2
            )
            "#,
        )
        .bind(user_id.into_inner())
        .bind(promotion_id.into_inner())
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)
    }

    #[instrument(skip(self))]
    async fn record_usage(&self, user_id: UserId, promotion_id: PromotionId) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO promotion_usages (user_id, promotion_id) VALUES ($1, $2)
            "#,
        )
        .bind(user_id.into_inner())
        .bind(promotion_id.into_inner())
        .execute(&self.pool)
        .await
        .map_err(|e| {
            map_unique_violation(e, || DomainError::PromotionAlreadyUsed(promotion_id))
        })?;

        Ok(())
    }

    #[instrument(skip(self, promotion), fields(name = %promotion.name))]
    async fn create(&self, promotion: &NewPromotion) -> RepoResult<Promotion> {
        let model = sqlx::query_as::<_, PromotionModel>(&format!(
            r#"
            INSERT INTO promotions
                (name, description, kind, start_time, end_time, min_spending, rate, points)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(&promotion.name)
        .bind(&promotion.description)
        .bind(promotion.kind.as_str())
        .bind(promotion.start_time)
        .bind(promotion.end_time)
        .bind(promotion.min_spending)
        .bind(promotion.rate)
        .bind(promotion.points)
        .fetch_one(&self.pool)
        .await
        .map_err(map_db_error)?;

        Promotion::try_from(model)
    }

    #[instrument(skip(self))]
    async fn update(&self, id: PromotionId, update: &PromotionUpdate) -> RepoResult<Promotion> {
        let mut tx = self.pool.begin().await.map_err(map_db_error)?;

        let model = sqlx::query_as::<_, PromotionModel>(&format!(
            "SELECT {PROMOTION_COLUMNS} FROM promotions WHERE id = $1 FOR UPDATE"
        ))
        .bind(id.into_inner())
        .fetch_optional(&mut *tx)
        .await
        .map_err(map_db_error)?
        .ok_or(DomainError::PromotionNotFound(id))?;

        let mut promotion = Promotion::try_from(model)?;
        update.apply_to(&mut promotion);
        if promotion.end_time <= promotion.start_time {
            return Err(DomainError::InvalidTimeRange);
        }

        let model = sqlx::query_as::<_, PromotionModel>(&format!(
            r#"
            UPDATE promotions
            SET name = $2, description = $3, kind = $4, start_time = $5, end_time = $6,
                min_spending = $7, rate = $8, points = $9
            WHERE id = $1
            RETURNING {PROMOTION_COLUMNS}
            "#
        ))
        .bind(id.into_inner())
        .bind(&promotion.name)
        .bind(&promotion.description)
        .bind(promotion.kind.as_str())
        .bind(promotion.start_time)
        .bind(promotion.end_time)
        .bind(promotion.min_spending)
        .bind(promotion.rate)
        .bind(promotion.points)
        .fetch_one(&mut *tx)
        .await
        .map_err(map_db_error)?;

        tx.commit().await.map_err(map_db_error)?;

        Promotion::try_from(model)
    }

    #[instrument(skip(self))]
    async fn delete(&self, id: PromotionId) -> RepoResult<()> {
        let result = sqlx::query("DELETE FROM promotions WHERE id = $1")
            .bind(id.into_inner())
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::PromotionNotFound(id));
        }

        Ok(())
    }
}
