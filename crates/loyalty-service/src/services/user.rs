//! User service - registration, lookups, profile edits and passwords

use chrono::{Duration, Utc};
use tracing::{info, instrument, warn};
use uuid::Uuid;
use validator::Validate;

use loyalty_common::auth::{hash_password, validate_password_strength, verify_password};
use loyalty_core::{Caller, DomainError, NewUser, Role, User, UserId, UserQuery, UserUpdate};

use crate::dto::{
    CashierUserResponse, ChangePasswordRequest, PageResponse, RegisterUserRequest,
    RegisteredUserResponse, UpdateMeRequest, UpdateUserRequest, UpdatedUserResponse,
    UserListItem, UserListQuery, UserResponse, UserView,
};

use super::access::{is_manager, require_role};
use super::context::ServiceContext;
use super::error::{ServiceError, ServiceResult};
use super::promotion::PromotionService;

/// User service
pub struct UserService<'a> {
    ctx: &'a ServiceContext,
}

impl<'a> UserService<'a> {
    /// Create a new UserService
    pub fn new(ctx: &'a ServiceContext) -> Self {
        Self { ctx }
    }

    /// Register an account (cashier+). The new account is unverified and
    /// carries an activation token.
    #[instrument(skip(self, request), fields(utorid = %request.utorid))]
    pub async fn register_user(
        &self,
        caller: &Caller,
        request: RegisterUserRequest,
    ) -> ServiceResult<RegisteredUserResponse> {
        require_role(caller, Role::Cashier)?;
        request.validate()?;

        if self
            .ctx
            .user_repo()
            .find_by_utorid(&request.utorid)
            .await?
            .is_some()
        {
            return Err(DomainError::UtoridAlreadyExists.into());
        }
        if self
            .ctx
            .user_repo()
            .find_by_email(&request.email)
            .await?
            .is_some()
        {
            return Err(DomainError::EmailAlreadyExists.into());
        }

        let ttl = Duration::days(self.ctx.accounts().registration_token_ttl_days);
        let user = self
            .ctx
            .user_repo()
            .create(&NewUser {
                utorid: request.utorid,
                name: request.name,
                email: request.email,
                reset_token: Uuid::new_v4().to_string(),
                reset_expires_at: Utc::now() + ttl,
            })
            .await?;

        info!(user_id = %user.id, utorid = %user.utorid, "User registered");

        let (reset_token, expires_at) = user
            .reset_token
            .clone()
            .zip(user.reset_expires_at)
            .ok_or_else(|| ServiceError::internal("registered user has no activation token"))?;
        Ok(RegisteredUserResponse {
            id: user.id,
            utorid: user.utorid,
            name: user.name,
            email: user.email,
            verified: user.verified,
            expires_at,
            reset_token,
        })
    }

    /// Filtered, paged user listing (manager+)
    #[instrument(skip(self))]
    pub async fn list_users(
        &self,
        caller: &Caller,
        query: UserListQuery,
    ) -> ServiceResult<PageResponse<UserListItem>> {
        require_role(caller, Role::Manager)?;
        let (limit, offset) = query.pagination().resolve()?;

        let repo_query = UserQuery {
            name: query.name,
            role: query.role,
            verified: query.verified,
            activated: query.activated,
            limit,
            offset,
        };
        let count = self.ctx.user_repo().count(&repo_query).await?;
        let users = self.ctx.user_repo().list(&repo_query).await?;

        Ok(PageResponse::new(
            count,
            users.iter().map(UserListItem::from).collect(),
        ))
    }

    /// Look up an account. Cashiers get the checkout view, managers the
    /// full profile.
    #[instrument(skip(self))]
    pub async fn get_user(&self, caller: &Caller, user_id: UserId) -> ServiceResult<UserView> {
        require_role(caller, Role::Cashier)?;
        let user = self.find(user_id).await?;
        let promotions = PromotionService::new(self.ctx).available_for(user.id).await?;

        if is_manager(caller) {
            Ok(UserView::Full(UserResponse::with_promotions(&user, &promotions)))
        } else {
            Ok(UserView::Cashier(CashierUserResponse::with_promotions(
                &user,
                &promotions,
            )))
        }
    }

    /// The caller's own profile
    #[instrument(skip(self))]
    pub async fn get_me(&self, caller: &Caller) -> ServiceResult<UserResponse> {
        let user = self.find(caller.id).await?;
        let promotions = PromotionService::new(self.ctx).available_for(user.id).await?;
        Ok(UserResponse::with_promotions(&user, &promotions))
    }

    /// Owner edit of name, email and birthday. Verification stays a
    /// manager decision.
    #[instrument(skip(self, request))]
    pub async fn update_me(
        &self,
        caller: &Caller,
        request: UpdateMeRequest,
    ) -> ServiceResult<UserResponse> {
        request.validate()?;
        let patch = UserUpdate {
            name: request.name,
            email: request.email,
            birthday: request.birthday,
            ..Default::default()
        };
        if patch.is_empty() {
            return Err(DomainError::EmptyUpdate.into());
        }

        if let Some(email) = &patch.email {
            let taken = self.ctx.user_repo().find_by_email(email).await?;
            if taken.is_some_and(|other| other.id != caller.id) {
                return Err(DomainError::EmailAlreadyExists.into());
            }
        }

        let updated = self.ctx.user_repo().update(caller.id, &patch).await?;
        info!(user_id = %caller.id, "Profile updated");

        let promotions = PromotionService::new(self.ctx).available_for(updated.id).await?;
        Ok(UserResponse::with_promotions(&updated, &promotions))
    }

    /// Replace the caller's password after checking the current one
    #[instrument(skip(self, request))]
    pub async fn change_password(
        &self,
        caller: &Caller,
        request: ChangePasswordRequest,
    ) -> ServiceResult<()> {
        validate_password_strength(&request.replacement)?;

        let current = self.ctx.user_repo().get_password_hash(caller.id).await?;
        let matches = match current {
            Some(hash) => verify_password(&request.current, &hash)?,
            None => false,
        };
        if !matches {
            warn!(user_id = %caller.id, "Password change rejected");
            return Err(DomainError::IncorrectPassword.into());
        }

        let password_hash = hash_password(&request.replacement)?;
        self.ctx
            .user_repo()
            .update_password(caller.id, &password_hash)
            .await?;

        info!(user_id = %caller.id, "Password changed");
        Ok(())
    }

    /// Manager edit of email, verification, suspicion and role
    #[instrument(skip(self, request))]
    pub async fn update_user(
        &self,
        caller: &Caller,
        user_id: UserId,
        request: UpdateUserRequest,
    ) -> ServiceResult<UpdatedUserResponse> {
        require_role(caller, Role::Manager)?;
        request.validate()?;
        if request.verified == Some(false) {
            return Err(ServiceError::validation("verified can only be set to true"));
        }

        let patch = UserUpdate {
            email: request.email,
            verified: request.verified,
            suspicious: request.suspicious,
            role: request.role,
            ..Default::default()
        };
        if patch.is_empty() {
            return Err(DomainError::EmptyUpdate.into());
        }

        let user = self.find(user_id).await?;
        if let Some(role) = patch.role {
            let suspicious = patch.suspicious.unwrap_or(user.suspicious);
            if role == Role::Cashier && suspicious {
                return Err(DomainError::SuspiciousCashier.into());
            }
            if !caller.role.can_assign(role) {
                return Err(DomainError::CannotAssignRole(role).into());
            }
        }
        if let Some(email) = &patch.email {
            let taken = self.ctx.user_repo().find_by_email(email).await?;
            if taken.is_some_and(|other| other.id != user.id) {
                return Err(DomainError::EmailAlreadyExists.into());
            }
        }

        let updated = self.ctx.user_repo().update(user_id, &patch).await?;
        info!(
            user_id = %user_id,
            utorid = %updated.utorid,
            role = ?patch.role,
            suspicious = ?patch.suspicious,
            "User updated"
        );

        Ok(UpdatedUserResponse {
            id: updated.id,
            utorid: updated.utorid.clone(),
            name: updated.name.clone(),
            email: patch.email.map(|_| updated.email.clone()),
            verified: patch.verified.map(|_| updated.verified),
            suspicious: patch.suspicious.map(|_| updated.suspicious),
            role: patch.role.map(|_| updated.role),
        })
    }

    async fn find(&self, user_id: UserId) -> ServiceResult<User> {
        self.ctx
            .user_repo()
            .find_by_id(user_id)
            .await?
            .ok_or_else(|| DomainError::UserNotFound(user_id.to_string()).into())
    }
}
