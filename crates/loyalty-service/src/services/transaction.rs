//! Transaction service - the points ledger
//!
//! Each handler validates the request against current state, then hands the
//! complete effect to [`LedgerRepository::commit`](loyalty_core::LedgerRepository::commit)
//! as a single plan. Guards in the plan re-check balances, pools and usages
//! inside the store's unit of work.

use std::collections::HashSet;

use chrono::Utc;
use rust_decimal::Decimal;
use tracing::{info, instrument, warn};
use validator::Validate;

use loyalty_core::ledger::earning::purchase_earnings;
use loyalty_core::{
    AmountComparison, Caller, CommitGuard, DomainError, Event, LedgerCommit, NewTransaction,
    Promotion, PromotionId, Role, Transaction, TransactionFilter, TransactionId,
    TransactionKind, User, UserId, Utorid,
};

use crate::dto::{
    AdjustmentRequest, EventAwardRequest, PageResponse, PurchaseRequest, RedemptionRequest,
    TransactionListQuery, TransactionOutcome, TransactionRequest, TransactionResponse,
    TransferRequest,
};

use super::access::{is_manager, require_role};
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};

/// Transaction service
pub struct TransactionService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> TransactionService<'a> {
    /// Create a new TransactionService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Create ledger rows for any request type
    #[instrument(skip(self, request), fields(caller = %caller.utorid, kind = %request.kind()))]
    pub async fn create_transaction(
        &self,
        caller: &Caller,
        request: TransactionRequest,
    ) -> ServiceResult<TransactionOutcome> {
        request.validate()?;

        match request {
            TransactionRequest::Purchase(r) => self.purchase(caller, r).await.map(Into::into),
            TransactionRequest::Adjustment(r) => self.adjustment(caller, r).await.map(Into::into),
            TransactionRequest::Transfer(r) => self.transfer(caller, r).await.map(Into::into),
            TransactionRequest::Redemption(r) => self.redemption(caller, r).await.map(Into::into),
            TransactionRequest::EventAward(r) => self.award_event(caller, r).await,
        }
    }

    // =========================================================================
    // Handlers
    // =========================================================================

    async fn purchase(
        &self,
        caller: &Caller,
        request: PurchaseRequest,
    ) -> ServiceResult<TransactionResponse> {
        require_role(caller, Role::Cashier)?;
        if request.spent.is_sign_negative() && !request.spent.is_zero() {
            return Err(DomainError::InvalidAmount("spent must be non-negative".to_string()).into());
        }

        let customer = self.user_by_utorid(&request.utorid).await?;
        let cashier = self.user_by_id(caller.id).await?;

        let promotions = self
            .eligible_promotions(&customer, &request.promotion_ids, request.spent)
            .await?;
        let earned = purchase_earnings(request.spent, &promotions)?;

        let mut entry = NewTransaction::new(
            TransactionKind::Purchase,
            customer.utorid.clone(),
            cashier.utorid.clone(),
        )
        .with_promotions(request.promotion_ids)
        .with_remark(request.remark);
        entry.spent = Some(request.spent);

        // Withheld purchases keep the points in `amount` until a manager clears the flag
        let credited = if cashier.suspicious {
            entry.suspicious = true;
            entry.amount = Some(earned);
            entry.earned = Some(0);
            0
        } else {
            entry.earned = Some(earned);
            earned
        };

        let mut plan = LedgerCommit::new().entry(entry).credit(customer.id, credited);
        for promotion in promotions.iter().filter(|p| p.is_one_time()) {
            plan = plan
                .guard(CommitGuard::PromotionUnused {
                    user_id: customer.id,
                    promotion_id: promotion.id,
                })
                .use_promotion(customer.id, promotion.id);
        }

        let row = self.commit_one(plan).await?;
        info!(
            transaction_id = %row.id,
            utorid = %row.utorid,
            points = earned,
            withheld = cashier.suspicious,
            "Purchase recorded"
        );
        Ok(TransactionResponse::from(row))
    }

    async fn adjustment(
        &self,
        caller: &Caller,
        request: AdjustmentRequest,
    ) -> ServiceResult<TransactionResponse> {
        require_role(caller, Role::Manager)?;

        let subject = self.user_by_utorid(&request.utorid).await?;
        self.find(request.related_id).await?;
        self.check_promotion_ids(&request.promotion_ids).await?;

        let entry = NewTransaction::new(
            TransactionKind::Adjustment,
            subject.utorid.clone(),
            caller.utorid.clone(),
        )
        .with_amount(request.amount)
        .with_related(request.related_id.into_inner())
        .with_promotions(request.promotion_ids)
        .with_remark(request.remark);

        let plan = LedgerCommit::new().entry(entry).credit(subject.id, request.amount);
        let row = self.commit_one(plan).await?;
        info!(
            transaction_id = %row.id,
            utorid = %row.utorid,
            points = request.amount,
            related_id = %request.related_id,
            "Adjustment recorded"
        );
        Ok(TransactionResponse::from(row))
    }

    async fn transfer(
        &self,
        caller: &Caller,
        request: TransferRequest,
    ) -> ServiceResult<TransactionResponse> {
        let sender = self.verified_caller(caller).await?;
        if request.recipient_id == sender.id {
            return Err(DomainError::SelfTransfer.into());
        }
        let recipient = self.user_by_id(request.recipient_id).await?;
        if !sender.can_afford(request.amount) {
            return Err(DomainError::InsufficientPoints {
                available: sender.points,
                required: request.amount,
            }
            .into());
        }

        let outgoing = NewTransaction::new(
            TransactionKind::Transfer,
            sender.utorid.clone(),
            sender.utorid.clone(),
        )
        .with_amount(-request.amount)
        .with_related(recipient.id.into_inner())
        .with_remark(request.remark.clone());
        let incoming = NewTransaction::new(
            TransactionKind::Transfer,
            recipient.utorid.clone(),
            sender.utorid.clone(),
        )
        .with_amount(request.amount)
        .with_related(sender.id.into_inner())
        .with_remark(request.remark);

        let plan = LedgerCommit::new()
            .guard(CommitGuard::MinBalance {
                user_id: sender.id,
                at_least: request.amount,
            })
            .entry(outgoing)
            .entry(incoming)
            .credit(sender.id, -request.amount)
            .credit(recipient.id, request.amount);

        // The sender's row comes first and is the one reported back
        let row = self.commit_one(plan).await?;
        info!(
            transaction_id = %row.id,
            sender = %sender.utorid,
            recipient = %recipient.utorid,
            points = request.amount,
            "Transfer recorded"
        );
        Ok(TransactionResponse::from(row))
    }

    async fn redemption(
        &self,
        caller: &Caller,
        request: RedemptionRequest,
    ) -> ServiceResult<TransactionResponse> {
        let user = self.verified_caller(caller).await?;
        if !user.can_afford(request.amount) {
            return Err(DomainError::InsufficientPoints {
                available: user.points,
                required: request.amount,
            }
            .into());
        }

        let entry = NewTransaction::new(
            TransactionKind::Redemption,
            user.utorid.clone(),
            user.utorid.clone(),
        )
        .with_amount(request.amount)
        .with_remark(request.remark);

        let row = self.commit_one(LedgerCommit::new().entry(entry)).await?;
        info!(
            transaction_id = %row.id,
            utorid = %row.utorid,
            points = request.amount,
            "Redemption requested"
        );
        Ok(TransactionResponse::from(row))
    }

    async fn award_event(
        &self,
        caller: &Caller,
        request: EventAwardRequest,
    ) -> ServiceResult<TransactionOutcome> {
        let event = self
            .ctx
            .event_repo()
            .find_by_id(request.event_id)
            .await?
            .ok_or(DomainError::EventNotFound(request.event_id))?;
        if !is_manager(caller) && !event.is_organizer(caller.id) {
            return Err(DomainError::NotOrganizer.into());
        }

        let recipients = match &request.utorid {
            Some(utorid) => vec![event
                .guest_by_utorid(utorid)
                .cloned()
                .ok_or_else(|| DomainError::NotAGuest(utorid.clone()))?],
            None => event.guests.clone(),
        };

        let total = i64::try_from(recipients.len())
            .ok()
            .and_then(|n| n.checked_mul(request.amount))
            .ok_or_else(|| DomainError::InvalidAmount("award total overflow".to_string()))?;
        check_pool(&event, total)?;

        if recipients.is_empty() {
            return Ok(TransactionOutcome::Many(Vec::new()));
        }

        let mut plan = LedgerCommit::new().guard(CommitGuard::EventPoolAvailable {
            event_id: event.id,
            at_least: total,
        });
        for guest in &recipients {
            plan = plan
                .entry(
                    NewTransaction::new(
                        TransactionKind::Event,
                        guest.utorid.clone(),
                        caller.utorid.clone(),
                    )
                    .with_amount(request.amount)
                    .with_related(event.id.into_inner())
                    .with_remark(request.remark.clone()),
                )
                .credit(guest.id, request.amount);
        }
        plan = plan.draw_pool(event.id, total);

        let rows = self.commit(plan).await?;
        info!(
            event_id = %event.id,
            guests = rows.len(),
            points = total,
            "Event points awarded"
        );

        let mut responses: Vec<TransactionResponse> =
            rows.iter().map(TransactionResponse::from).collect();
        if request.utorid.is_some() {
            if let Some(row) = responses.pop() {
                return Ok(TransactionOutcome::One(row));
            }
        }
        Ok(TransactionOutcome::Many(responses))
    }

    // =========================================================================
    // Row updates
    // =========================================================================

    /// Mark a pending redemption processed and debit the points (cashier+)
    #[instrument(skip(self), fields(caller = %caller.utorid))]
    pub async fn process_redemption(
        &self,
        caller: &Caller,
        transaction_id: TransactionId,
    ) -> ServiceResult<TransactionResponse> {
        require_role(caller, Role::Cashier)?;

        let tx = self.find(transaction_id).await?;
        if !tx.is_redemption() {
            return Err(DomainError::NotARedemption(transaction_id).into());
        }
        if tx.is_processed() {
            return Err(DomainError::RedemptionAlreadyProcessed(transaction_id).into());
        }
        let subject = self.user_by_utorid(&tx.utorid).await?;
        let amount = tx.amount.unwrap_or(0);

        let plan = LedgerCommit::new()
            .guard(CommitGuard::RedemptionPending { transaction_id })
            .credit(subject.id, -amount)
            .process(transaction_id, caller.utorid.clone());
        self.commit(plan).await?;

        info!(
            transaction_id = %transaction_id,
            utorid = %subject.utorid,
            points = amount,
            "Redemption processed"
        );
        Ok(TransactionResponse::from(self.find(transaction_id).await?))
    }

    /// Flag or clear a row as suspicious, reversing or restoring its points
    /// (manager+). Setting the current value again changes nothing.
    #[instrument(skip(self), fields(caller = %caller.utorid))]
    pub async fn set_suspicious(
        &self,
        caller: &Caller,
        transaction_id: TransactionId,
        suspicious: bool,
    ) -> ServiceResult<TransactionResponse> {
        require_role(caller, Role::Manager)?;

        let tx = self.find(transaction_id).await?;
        if tx.suspicious == suspicious {
            return Ok(TransactionResponse::from(tx));
        }
        let subject = self.user_by_utorid(&tx.utorid).await?;
        let base = tx.base_points();
        let delta = if suspicious {
            base.checked_neg()
                .ok_or_else(|| DomainError::InvalidAmount("points out of range".to_string()))?
        } else {
            base
        };

        let plan = LedgerCommit::new()
            .guard(CommitGuard::SuspiciousIs {
                transaction_id,
                current: tx.suspicious,
            })
            .flag_suspicious(transaction_id, suspicious)
            .credit(subject.id, delta);
        self.commit(plan).await?;

        info!(
            transaction_id = %transaction_id,
            utorid = %subject.utorid,
            suspicious,
            points = delta,
            "Suspicious flag changed"
        );
        Ok(TransactionResponse::from(self.find(transaction_id).await?))
    }

    // =========================================================================
    // Reads
    // =========================================================================

    /// Get one row (manager+)
    #[instrument(skip(self))]
    pub async fn get_transaction(
        &self,
        caller: &Caller,
        transaction_id: TransactionId,
    ) -> ServiceResult<TransactionResponse> {
        require_role(caller, Role::Manager)?;
        Ok(TransactionResponse::from(self.find(transaction_id).await?))
    }

    /// List the whole ledger with filters (manager+)
    #[instrument(skip(self, query))]
    pub async fn list_transactions(
        &self,
        caller: &Caller,
        query: TransactionListQuery,
    ) -> ServiceResult<PageResponse<TransactionResponse>> {
        require_role(caller, Role::Manager)?;

        let mut filter = self.build_filter(&query)?;
        if let Some(needle) = query.name.as_deref().filter(|n| !n.is_empty()) {
            filter.utorids = Some(self.ctx.user_repo().search_utorids(needle).await?);
        }
        filter.created_by = query.created_by;
        filter.suspicious = query.suspicious;

        self.page(&filter).await
    }

    /// List the caller's own rows
    #[instrument(skip(self, query))]
    pub async fn list_my_transactions(
        &self,
        caller: &Caller,
        query: TransactionListQuery,
    ) -> ServiceResult<PageResponse<TransactionResponse>> {
        let mut filter = self.build_filter(&query)?;
        filter.utorid = Some(caller.utorid.clone());
        self.page(&filter).await
    }

    // =========================================================================
    // Helpers
    // =========================================================================

    fn build_filter(&self, query: &TransactionListQuery) -> ServiceResult<TransactionFilter> {
        let (limit, offset) = query.pagination().resolve()?;
        if query.related_id.is_some() && query.kind.is_none() {
            return Err(ServiceError::validation("relatedId must be used with type"));
        }
        let amount = match (query.amount, query.operator.as_deref()) {
            (None, None) => None,
            (Some(v), Some("gte")) => Some(AmountComparison::Gte(v)),
            (Some(v), Some("lte")) => Some(AmountComparison::Lte(v)),
            (Some(_), Some(_)) => {
                return Err(ServiceError::validation("operator must be gte or lte"))
            }
            (Some(_), None) => {
                return Err(ServiceError::validation("amount must be used with operator"))
            }
            (None, Some(_)) => {
                return Err(ServiceError::validation("operator must be used with amount"))
            }
        };

        Ok(TransactionFilter {
            kind: query.kind,
            promotion_id: query.promotion_id,
            related_id: query.related_id,
            amount,
            limit,
            offset,
            ..TransactionFilter::default()
        })
    }

    async fn page(
        &self,
        filter: &TransactionFilter,
    ) -> ServiceResult<PageResponse<TransactionResponse>> {
        let count = self.ctx.ledger().count(filter).await?;
        let rows = self.ctx.ledger().query(filter).await?;
        Ok(PageResponse::new(
            count,
            rows.iter().map(TransactionResponse::from).collect(),
        ))
    }

    /// Resolve purchase promotions and check each can apply to this purchase
    async fn eligible_promotions(
        &self,
        customer: &User,
        promotion_ids: &[PromotionId],
        spent: Decimal,
    ) -> ServiceResult<Vec<Promotion>> {
        let promotions = self.check_promotion_ids(promotion_ids).await?;
        let now = Utc::now();

        for promotion in &promotions {
            if !promotion.is_available_at(now) {
                return Err(DomainError::PromotionNotActive(promotion.id).into());
            }
            if promotion.is_one_time()
                && self
                    .ctx
                    .promotion_repo()
                    .has_usage(customer.id, promotion.id)
                    .await?
            {
                return Err(DomainError::PromotionAlreadyUsed(promotion.id).into());
            }
            if !promotion.accepts_spending(spent) {
                return Err(DomainError::MinSpendingNotMet(promotion.id).into());
            }
        }
        Ok(promotions)
    }

    /// Load every listed promotion, rejecting duplicates and unknown ids
    async fn check_promotion_ids(&self, ids: &[PromotionId]) -> ServiceResult<Vec<Promotion>> {
        let mut seen = HashSet::with_capacity(ids.len());
        let mut promotions = Vec::with_capacity(ids.len());
        for &id in ids {
            if !seen.insert(id) {
                return Err(DomainError::DuplicatePromotion(id).into());
            }
            let promotion = self
                .ctx
                .promotion_repo()
                .find_by_id(id)
                .await?
                .ok_or(DomainError::PromotionNotFound(id))?;
            promotions.push(promotion);
        }
        Ok(promotions)
    }

    async fn verified_caller(&self, caller: &Caller) -> ServiceResult<User> {
        let user = self.user_by_id(caller.id).await?;
        if !user.verified {
            return Err(DomainError::Unverified.into());
        }
        Ok(user)
    }

    async fn user_by_id(&self, user_id: UserId) -> ServiceResult<User> {
        self.ctx
            .user_repo()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(user_id.to_string()).into())
    }

    async fn user_by_utorid(&self, utorid: &Utorid) -> ServiceResult<User> {
        self.ctx
            .user_repo()
            .find_by_utorid(utorid)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(utorid.to_string()).into())
    }

    async fn find(&self, transaction_id: TransactionId) -> ServiceResult<Transaction> {
        self.ctx
            .ledger()
            .find_by_id(transaction_id)
            .await?
            .ok_or_else(|| DomainError::TransactionNotFound(transaction_id).into())
    }

    async fn commit(&self, plan: LedgerCommit) -> ServiceResult<Vec<Transaction>> {
        self.ctx.ledger().commit(plan).await.map_err(|e| {
            if e.is_conflict() {
                warn!(code = e.code(), error = %e, "Ledger commit rejected");
            }
            ServiceError::from(e)
        })
    }

    async fn commit_one(&self, plan: LedgerCommit) -> ServiceResult<Transaction> {
        self.commit(plan)
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| ServiceError::internal("ledger commit produced no rows"))
    }
}

fn check_pool(event: &Event, total: i64) -> ServiceResult<()> {
    if event.can_award(total) {
        Ok(())
    } else {
        Err(DomainError::PoolExhausted {
            remaining: event.points_remain,
            requested: total,
        }
        .into())
    }
}
