//! Account service - login and password reset tokens

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use loyalty_common::auth::{hash_password, validate_password_strength, verify_password};
use loyalty_common::AppError;
use loyalty_core::{Caller, DomainError, Utorid};

use crate::dto::{LoginRequest, LoginResponse, ResetPasswordRequest, ResetTokenResponse};

use super::context::ServiceContext;
use super::error::ServiceResult;

/// Account service
pub struct AccountService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> AccountService<'a> {
    /// Create a new AccountService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Exchange a utorid and password for a bearer token. The first
    /// successful login activates the account.
    #[instrument(skip(self, request), fields(utorid = %request.utorid))]
    pub async fn login(&self, request: LoginRequest) -> ServiceResult<LoginResponse> {
        let user = self
            .ctx
            .user_repo()
            .find_by_utorid(&request.utorid)
            .await?
            .ok_or_else(|| {
                warn!("Login failed: unknown utorid");
                AppError::InvalidCredentials
            })?;

        let password_hash = self
            .ctx
            .user_repo()
            .get_password_hash(user.id)
            .await?
            .ok_or_else(|| {
                warn!(user_id = %user.id, "Login failed: no password set");
                AppError::InvalidCredentials
            })?;

        if !verify_password(&request.password, &password_hash)? {
            warn!(user_id = %user.id, "Login failed: invalid password");
            return Err(AppError::InvalidCredentials.into());
        }

        let now = Utc::now();
        self.ctx.user_repo().record_login(user.id, now).await?;

        let jwt = self.ctx.jwt_service();
        let token = jwt.issue(&Caller::new(user.id, user.utorid.clone(), user.role))?;

        info!(user_id = %user.id, "User logged in");
        Ok(LoginResponse {
            token,
            expires_at: now + Duration::seconds(jwt.token_expiry()),
        })
    }

    /// Issue a fresh reset token for `utorid`.
    ///
    /// Requests are throttled per `client_key` (the caller's address in the
    /// HTTP layer). The token is returned to the caller; delivering it by
    /// email is left to the deployment.
    #[instrument(skip(self))]
    pub async fn request_password_reset(
        &self,
        utorid: &Utorid,
        client_key: &str,
    ) -> ServiceResult<ResetTokenResponse> {
        let user = self
            .ctx
            .user_repo()
            .find_by_utorid(utorid)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(utorid.to_string()))?;

        if !self.ctx.reset_limiter().check(client_key) {
            warn!(client_key, "Password reset throttled");
            return Err(AppError::RateLimitExceeded.into());
        }

        let reset_token = Uuid::new_v4().to_string();
        let expires_at =
            Utc::now() + Duration::minutes(self.ctx.accounts().reset_token_ttl_minutes);
        self.ctx
            .user_repo()
            .set_reset_token(user.id, &reset_token, expires_at)
            .await?;

        info!(user_id = %user.id, utorid = %user.utorid, "Reset token issued");
        Ok(ResetTokenResponse {
            expires_at,
            reset_token,
        })
    }

    /// Set a new password with a reset or activation token. The token
    /// expires as it is used.
    #[instrument(skip(self, reset_token, request), fields(utorid = %request.utorid))]
    pub async fn reset_password(
        &self,
        reset_token: &str,
        request: ResetPasswordRequest,
    ) -> ServiceResult<()> {
        validate_password_strength(&request.password)?;

        let user = self
            .ctx
            .user_repo()
            .find_by_reset_token(reset_token)
            .await?
            .ok_or(DomainError::ResetTokenNotFound)?;

        if user.utorid != request.utorid {
            warn!(user_id = %user.id, "Reset rejected: utorid does not match token");
            return Err(AppError::InvalidCredentials.into());
        }

        let now = Utc::now();
        if user.reset_expired_at(now) {
            return Err(DomainError::ResetTokenExpired.into());
        }

        let password_hash = hash_password(&request.password)?;
        self.ctx
            .user_repo()
            .consume_reset_token(user.id, reset_token, &password_hash, now)
            .await?;

        info!(user_id = %user.id, "Password reset");
        Ok(())
    }
}
