//! Promotion handlers

use axum::{
    extract::{Path, State},
    Json,
};
use loyalty_core::PromotionId;
use loyalty_service::dto::{
    CreatePromotionRequest, PageResponse, PromotionListQuery, PromotionResponse,
    UpdatePromotionRequest,
};
use loyalty_service::PromotionService;

use crate::extractors::{ApiQuery, AuthUser, ValidatedJson};
use crate::response::{ApiResult, Created, NoContent};
use crate::state::AppState;

/// POST /promotions
pub async fn create_promotion(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<CreatePromotionRequest>,
) -> ApiResult<Created<Json<PromotionResponse>>> {
    let service = PromotionService::new(state.service_context());
    let response = service.create_promotion(&auth.caller, request).await?;
    Ok(Created(Json(response)))
}

/// GET /promotions
pub async fn list_promotions(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<PromotionListQuery>,
) -> ApiResult<Json<PageResponse<PromotionResponse>>> {
    let service = PromotionService::new(state.service_context());
    Ok(Json(service.list_promotions(&auth.caller, query).await?))
}

/// GET /promotions/{id}
pub async fn get_promotion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(promotion_id): Path<PromotionId>,
) -> ApiResult<Json<PromotionResponse>> {
    let service = PromotionService::new(state.service_context());
    Ok(Json(service.get_promotion(&auth.caller, promotion_id).await?))
}

/// PATCH /promotions/{id}
pub async fn update_promotion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(promotion_id): Path<PromotionId>,
    ValidatedJson(request): ValidatedJson<UpdatePromotionRequest>,
) -> ApiResult<Json<PromotionResponse>> {
    let service = PromotionService::new(state.service_context());
    let response = service
        .update_promotion(&auth.caller, promotion_id, request)
        .await?;
    Ok(Json(response))
}

/// DELETE /promotions/{id}
pub async fn delete_promotion(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(promotion_id): Path<PromotionId>,
) -> ApiResult<NoContent> {
    let service = PromotionService::new(state.service_context());
    service.delete_promotion(&auth.caller, promotion_id).await?;
    Ok(NoContent)
}
