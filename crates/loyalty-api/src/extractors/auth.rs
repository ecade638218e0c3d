//! Authentication extractor
//!
//! Validates the bearer token and resolves it to the caller's current
//! account, so role changes apply to tokens that are already issued.

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::request::Parts,
};
use axum_extra::{
    headers::{authorization::Bearer, Authorization},
    TypedHeader,
};
use loyalty_common::AppError;
use loyalty_core::Caller;

use crate::response::ApiError;
use crate::state::AppState;

/// Authenticated caller extracted from a JWT bearer token
#[derive(Debug, Clone)]
pub struct AuthUser {
    pub caller: Caller,
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    S: Send + Sync,
    AppState: FromRef<S>,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let TypedHeader(Authorization(bearer)) =
            TypedHeader::<Authorization<Bearer>>::from_request_parts(parts, state)
                .await
                .map_err(|_| ApiError::MissingAuth)?;

        let app_state = AppState::from_ref(state);

        let claimed = app_state
            .jwt_service()
            .authenticate(bearer.token())
            .map_err(|e| {
                tracing::warn!(error = %e, "Invalid access token");
                ApiError::App(e)
            })?;

        let user = app_state
            .service_context()
            .user_repo()
            .find_by_id(claimed.id)
            .await?
            .ok_or_else(|| {
                tracing::warn!(user_id = %claimed.id, "Token for unknown account");
                ApiError::App(AppError::InvalidToken)
            })?;

        Ok(AuthUser {
            caller: Caller::new(user.id, user.utorid, user.role),
        })
    }
}
