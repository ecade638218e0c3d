//! Transaction handlers
//!
//! Purchases and adjustments, ledger queries, and the two row-level
//! state changes (suspicion flag, redemption processing).

use axum::{
    extract::{Path, State},
    Json,
};
use loyalty_core::TransactionId;
use loyalty_service::dto::{
    PageResponse, ProcessRedemptionRequest, SetSuspiciousRequest, TransactionListQuery,
    TransactionOutcome, TransactionRequest, TransactionResponse,
};
use loyalty_service::TransactionService;

use crate::extractors::{ApiQuery, AuthUser, JsonBody, ValidatedJson};
use crate::response::{ApiError, ApiResult, Created};
use crate::state::AppState;

/// Record a purchase or an adjustment
///
/// POST /transactions
pub async fn create_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<TransactionRequest>,
) -> ApiResult<Created<Json<TransactionOutcome>>> {
    if !matches!(
        request,
        TransactionRequest::Purchase(_) | TransactionRequest::Adjustment(_)
    ) {
        return Err(ApiError::invalid_body(
            "type must be 'purchase' or 'adjustment'",
        ));
    }

    let service = TransactionService::new(state.service_context());
    let outcome = service.create_transaction(&auth.caller, request).await?;
    Ok(Created(Json(outcome)))
}

/// GET /transactions
pub async fn list_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<TransactionListQuery>,
) -> ApiResult<Json<PageResponse<TransactionResponse>>> {
    let service = TransactionService::new(state.service_context());
    Ok(Json(service.list_transactions(&auth.caller, query).await?))
}

/// GET /transactions/{id}
pub async fn get_transaction(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<TransactionId>,
) -> ApiResult<Json<TransactionResponse>> {
    let service = TransactionService::new(state.service_context());
    Ok(Json(
        service.get_transaction(&auth.caller, transaction_id).await?,
    ))
}

/// Flag or clear a row, moving its points accordingly
///
/// PATCH /transactions/{id}/suspicious
pub async fn set_suspicious(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<TransactionId>,
    JsonBody(request): JsonBody<SetSuspiciousRequest>,
) -> ApiResult<Json<TransactionResponse>> {
    let service = TransactionService::new(state.service_context());
    let response = service
        .set_suspicious(&auth.caller, transaction_id, request.suspicious)
        .await?;
    Ok(Json(response))
}

/// Complete a pending redemption
///
/// PATCH /transactions/{id}/processed
pub async fn process_redemption(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(transaction_id): Path<TransactionId>,
    JsonBody(request): JsonBody<ProcessRedemptionRequest>,
) -> ApiResult<Json<TransactionResponse>> {
    if !request.processed {
        return Err(ApiError::invalid_body("processed can only be set to true"));
    }

    let service = TransactionService::new(state.service_context());
    let response = service
        .process_redemption(&auth.caller, transaction_id)
        .await?;
    Ok(Json(response))
}
