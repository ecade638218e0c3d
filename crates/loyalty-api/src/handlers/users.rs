//! User handlers
//!
//! Registration, profiles, and the caller-scoped ledger routes
//! (redemption requests, transfers, own history).

use axum::{
    extract::{Path, State},
    Json,
};
use loyalty_core::{Role, UserId, Utorid};
use loyalty_service::dto::{
    ChangePasswordRequest, PageResponse, PromotionResponse, RegisterUserRequest,
    RegisteredUserResponse, ScopedTransactionBody, TransactionListQuery, TransactionOutcome,
    TransactionResponse, UpdateMeRequest, UpdateUserRequest, UpdatedUserResponse, UserListItem,
    UserListQuery, UserResponse, UserView,
};
use loyalty_service::{PromotionService, ServiceError, TransactionService, UserService};

use crate::extractors::{ApiQuery, AuthUser, JsonBody, ValidatedJson};
use crate::response::{ApiError, ApiResult, Created, NoContent};
use crate::state::AppState;

/// Register a new account (cashier+)
///
/// POST /users
pub async fn register_user(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<RegisterUserRequest>,
) -> ApiResult<Created<Json<RegisteredUserResponse>>> {
    let service = UserService::new(state.service_context());
    let response = service.register_user(&auth.caller, request).await?;
    Ok(Created(Json(response)))
}

/// GET /users
pub async fn list_users(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<UserListQuery>,
) -> ApiResult<Json<PageResponse<UserListItem>>> {
    let service = UserService::new(state.service_context());
    Ok(Json(service.list_users(&auth.caller, query).await?))
}

/// GET /users/me
pub async fn get_me(
    State(state): State<AppState>,
    auth: AuthUser,
) -> ApiResult<Json<UserResponse>> {
    let service = UserService::new(state.service_context());
    Ok(Json(service.get_me(&auth.caller).await?))
}

/// PATCH /users/me
pub async fn update_me(
    State(state): State<AppState>,
    auth: AuthUser,
    ValidatedJson(request): ValidatedJson<UpdateMeRequest>,
) -> ApiResult<Json<UserResponse>> {
    let service = UserService::new(state.service_context());
    Ok(Json(service.update_me(&auth.caller, request).await?))
}

/// PATCH /users/me/password
pub async fn change_password(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(request): JsonBody<ChangePasswordRequest>,
) -> ApiResult<NoContent> {
    let service = UserService::new(state.service_context());
    service.change_password(&auth.caller, request).await?;
    Ok(NoContent)
}

/// GET /users/{id}
pub async fn get_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<UserId>,
) -> ApiResult<Json<UserView>> {
    let service = UserService::new(state.service_context());
    Ok(Json(service.get_user(&auth.caller, user_id).await?))
}

/// PATCH /users/{id}
pub async fn update_user(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(user_id): Path<UserId>,
    ValidatedJson(request): ValidatedJson<UpdateUserRequest>,
) -> ApiResult<Json<UpdatedUserResponse>> {
    let service = UserService::new(state.service_context());
    Ok(Json(
        service.update_user(&auth.caller, user_id, request).await?,
    ))
}

/// Request a redemption against the caller's balance
///
/// POST /users/me/transactions
pub async fn create_redemption(
    State(state): State<AppState>,
    auth: AuthUser,
    JsonBody(body): JsonBody<ScopedTransactionBody>,
) -> ApiResult<Created<Json<TransactionOutcome>>> {
    let request = body.into_redemption()?;
    let service = TransactionService::new(state.service_context());
    let outcome = service.create_transaction(&auth.caller, request).await?;
    Ok(Created(Json(outcome)))
}

/// GET /users/me/transactions
pub async fn list_my_transactions(
    State(state): State<AppState>,
    auth: AuthUser,
    ApiQuery(query): ApiQuery<TransactionListQuery>,
) -> ApiResult<Json<PageResponse<TransactionResponse>>> {
    let service = TransactionService::new(state.service_context());
    Ok(Json(service.list_my_transactions(&auth.caller, query).await?))
}

/// Send points to another user
///
/// POST /users/{id}/transactions
pub async fn create_transfer(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(recipient_id): Path<UserId>,
    JsonBody(body): JsonBody<ScopedTransactionBody>,
) -> ApiResult<Created<Json<TransactionOutcome>>> {
    let request = body.into_transfer(recipient_id)?;
    let service = TransactionService::new(state.service_context());
    let outcome = service.create_transaction(&auth.caller, request).await?;
    Ok(Created(Json(outcome)))
}

/// Promotions the user could apply at checkout right now. Visible to the
/// user themself and to cashiers and above.
///
/// GET /users/{utorid}/promotions
pub async fn available_promotions(
    State(state): State<AppState>,
    auth: AuthUser,
    Path(utorid): Path<String>,
) -> ApiResult<Json<Vec<PromotionResponse>>> {
    let utorid: Utorid = utorid
        .parse()
        .map_err(|e: loyalty_core::UtoridError| ApiError::invalid_path(e.to_string()))?;
    if auth.caller.utorid != utorid && !auth.caller.is_at_least(Role::Cashier) {
        return Err(ServiceError::permission_denied("view another user's promotions").into());
    }

    let service = PromotionService::new(state.service_context());
    let promotions = service.available_promotions(&utorid).await?;
    Ok(Json(
        promotions.into_iter().map(PromotionResponse::from).collect(),
    ))
}
