//! Promotion service
//!
//! Eligibility queries used by purchases and user lookups, plus promotion
//! management for managers.

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument};
use validator::Validate;

use loyalty_core::{
    Caller, DomainError, NewPromotion, Promotion, PromotionId, PromotionQuery, PromotionUpdate,
    Role, UserId, Utorid,
};

use crate::dto::{
    CreatePromotionRequest, PageResponse, PromotionListQuery, PromotionResponse,
    UpdatePromotionRequest,
};

use super::access::{is_manager, require_role};
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

fn require_non_negative(field: &str, value: Option<Decimal>) -> ServiceResult<()> {
    if value.is_some_and(|v| v.is_sign_negative() && !v.is_zero()) {
        return Err(ServiceError::validation(format!("{field} must be non-negative")));
    }
    Ok(())
}

/// Promotion service
pub struct PromotionService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> PromotionService<'a> {
    /// Create a new PromotionService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Promotions the user could apply right now: every promotion with
    /// `start <= now < end`, minus one-time promotions the user already used.
    #[instrument(skip(self))]
    pub async fn available_promotions(&self, utorid: &Utorid) -> ServiceResult<Vec<Promotion>> {
        let user = self
            .ctx
            .user_repo()
            .find_by_utorid(utorid)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(utorid.to_string()))?;
        self.available_for(user.id).await
    }

    /// Same as [`Self::available_promotions`] for a user already loaded
    pub async fn available_for(&self, user_id: UserId) -> ServiceResult<Vec<Promotion>> {
        let promotions = self.ctx.promotion_repo().list_available(Utc::now()).await?;
        let used = self.ctx.promotion_repo().used_promotion_ids(user_id).await?;

        Ok(promotions
            .into_iter()
            .filter(|p| !(p.is_one_time() && used.contains(&p.id)))
            .collect())
    }

    /// Record that a user consumed a one-time promotion
    #[instrument(skip(self))]
    pub async fn use_promotion(
        &self,
        user_id: UserId,
        promotion_id: PromotionId,
    ) -> ServiceResult<()> {
        self.find(promotion_id).await?;
        self.ctx
            .promotion_repo()
            .record_usage(user_id, promotion_id)
            .await?;

        info!(user_id = %user_id, promotion_id = %promotion_id, "Promotion usage recorded");
        Ok(())
    }

    /// Create a promotion (manager+)
    #[instrument(skip(self, request))]
    pub async fn create_promotion(
        &self,
        caller: &Caller,
        request: CreatePromotionRequest,
    ) -> ServiceResult<PromotionResponse> {
        require_role(caller, Role::Manager)?;
        request.validate()?;
        if request.end_time <= request.start_time {
            return Err(DomainError::InvalidTimeRange.into());
        }
        require_non_negative("minSpending", request.min_spending)?;
        require_non_negative("rate", request.rate)?;

        let promotion = self
            .ctx
            .promotion_repo()
            .create(&NewPromotion {
                name: request.name,
                description: request.description,
                kind: request.kind,
                start_time: request.start_time,
                end_time: request.end_time,
                min_spending: request.min_spending,
                rate: request.rate,
                points: request.points,
            })
            .await?;

        info!(promotion_id = %promotion.id, kind = %promotion.kind, "Promotion created");
        Ok(PromotionResponse::from(promotion))
    }

    /// Get one promotion. Regular users and cashiers only see active ones.
    #[instrument(skip(self))]
    pub async fn get_promotion(
        &self,
        caller: &Caller,
        promotion_id: PromotionId,
    ) -> ServiceResult<PromotionResponse> {
        let promotion = self.find(promotion_id).await?;
        if !is_manager(caller) && !promotion.is_active_at(Utc::now()) {
            return Err(DomainError::PromotionNotFound(promotion_id).into());
        }
        Ok(PromotionResponse::from(promotion))
    }

    /// List promotions. Non-managers only see active ones and cannot filter
    /// on started/ended.
    #[instrument(skip(self, query))]
    pub async fn list_promotions(
        &self,
        caller: &Caller,
        query: PromotionListQuery,
    ) -> ServiceResult<PageResponse<PromotionResponse>> {
        let (limit, offset) = query.pagination().resolve()?;
        let manager = is_manager(caller);
        if manager && query.started.is_some() && query.ended.is_some() {
            return Err(ServiceError::validation("started and ended cannot both be set"));
        }

        let repo_query = PromotionQuery {
            name: query.name,
            kind: query.kind,
            active_only: !manager,
            started: query.started.filter(|_| manager),
            ended: query.ended.filter(|_| manager),
            now: Utc::now(),
            limit,
            offset,
        };
        let count = self.ctx.promotion_repo().count(&repo_query).await?;
        let promotions = self.ctx.promotion_repo().list(&repo_query).await?;

        Ok(PageResponse::new(
            count,
            promotions.iter().map(PromotionResponse::from).collect(),
        ))
    }

    /// Update a promotion (manager+)
    #[instrument(skip(self, request))]
    pub async fn update_promotion(
        &self,
        caller: &Caller,
        promotion_id: PromotionId,
        request: UpdatePromotionRequest,
    ) -> ServiceResult<PromotionResponse> {
        require_role(caller, Role::Manager)?;
        request.validate()?;
        require_non_negative("minSpending", request.min_spending)?;
        require_non_negative("rate", request.rate)?;

        let patch = PromotionUpdate {
            name: request.name,
            description: request.description,
            kind: request.kind,
            start_time: request.start_time,
            end_time: request.end_time,
            min_spending: request.min_spending,
            rate: request.rate,
            points: request.points,
        };
        if patch.is_empty() {
            return Err(DomainError::EmptyUpdate.into());
        }

        let now = Utc::now();
        if patch.start_time.is_some_and(|t| t < now) {
            return Err(DomainError::TimeInPast("startTime").into());
        }
        if patch.end_time.is_some_and(|t| t < now) {
            return Err(DomainError::TimeInPast("endTime").into());
        }

        let current = self.find(promotion_id).await?;
        if current.has_ended_at(now) && patch.touches_terms() {
            return Err(DomainError::PromotionEnded.into());
        }

        let promotion = self
            .ctx
            .promotion_repo()
            .update(promotion_id, &patch)
            .await?;

        info!(promotion_id = %promotion_id, "Promotion updated");
        Ok(PromotionResponse::from(promotion))
    }

    /// Delete a promotion that has not started yet (manager+)
    #[instrument(skip(self))]
    pub async fn delete_promotion(
        &self,
        caller: &Caller,
        promotion_id: PromotionId,
    ) -> ServiceResult<()> {
        require_role(caller, Role::Manager)?;
        let promotion = self.find(promotion_id).await?;
        if promotion.has_started_at(Utc::now()) {
            return Err(DomainError::PromotionStarted.into());
        }

        self.ctx.promotion_repo().delete(promotion_id).await?;
        info!(promotion_id = %promotion_id, "Promotion deleted");
        Ok(())
    }

    async fn find(&self, promotion_id: PromotionId) -> ServiceResult<Promotion> {
        self.ctx
            .promotion_repo()
            .find_by_id(promotion_id)
            .await?
            .ok_or_else(|| DomainError::PromotionNotFound(promotion_id).into())
    }
}
