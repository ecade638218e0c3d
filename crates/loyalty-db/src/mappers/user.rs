//! User model -> entity mapper

use loyalty_core::entities::{User, UserSummary};
use loyalty_core::error::DomainError;
use loyalty_core::value_objects::{Role, UserId, Utorid};

use crate::models::{RosterModel, UserModel};

use super::corrupt;

impl TryFrom<UserModel> for User {
    type Error = DomainError;

    fn try_from(model: UserModel) -> Result<Self, Self::Error> {
        let role = model
            .role
            .parse::<Role>()
            .map_err(|_| corrupt("role", &model.role))?;
        Ok(User {
            id: UserId::new(model.id),
            utorid: Utorid::new_unchecked(model.utorid),
            name: model.name,
            email: model.email,
            birthday: model.birthday,
            role,
            points: model.points,
            verified: model.verified,
            suspicious: model.suspicious,
            reset_token: model.reset_token,
            reset_expires_at: model.reset_expires_at,
            created_at: model.created_at,
            last_login: model.last_login,
        })
    }
}

impl From<RosterModel> for UserSummary {
    fn from(model: RosterModel) -> Self {
        UserSummary {
            id: UserId::new(model.id),
            utorid: Utorid::new_unchecked(model.utorid),
            name: model.name,
        }
    }
}
