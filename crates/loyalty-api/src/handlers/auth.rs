//! Login and account recovery handlers

use axum::{
    extract::{Path, State},
    Json,
};
use loyalty_service::dto::{
    LoginRequest, LoginResponse, ResetPasswordRequest, ResetRequest, ResetTokenResponse,
};
use loyalty_service::AccountService;

use crate::extractors::{ClientKey, JsonBody};
use crate::response::{Accepted, ApiResult, NoContent};
use crate::state::AppState;

/// Exchange credentials for a bearer token
///
/// POST /auth/tokens
pub async fn login(
    State(state): State<AppState>,
    JsonBody(request): JsonBody<LoginRequest>,
) -> ApiResult<Json<LoginResponse>> {
    let service = AccountService::new(state.service_context());
    Ok(Json(service.login(request).await?))
}

/// Issue a password reset token
///
/// POST /auth/resets
pub async fn request_reset(
    State(state): State<AppState>,
    client: ClientKey,
    JsonBody(request): JsonBody<ResetRequest>,
) -> ApiResult<Accepted<Json<ResetTokenResponse>>> {
    let service = AccountService::new(state.service_context());
    let response = service
        .request_password_reset(&request.utorid, client.as_str())
        .await?;
    Ok(Accepted(Json(response)))
}

/// Set a new password with a reset token
///
/// POST /auth/resets/{reset_token}
pub async fn reset_password(
    State(state): State<AppState>,
    Path(reset_token): Path<String>,
    JsonBody(request): JsonBody<ResetPasswordRequest>,
) -> ApiResult<NoContent> {
    let service = AccountService::new(state.service_context());
    service.reset_password(&reset_token, request).await?;
    Ok(NoContent)
}
