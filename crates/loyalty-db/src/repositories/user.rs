//! PostgreSQL implementation of UserRepository

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{PgPool, Postgres, QueryBuilder};
use tracing::instrument;

use loyalty_core::entities::{NewUser, User, UserUpdate};
use loyalty_core::error::DomainError;
use loyalty_core::traits::{RepoResult, UserQuery, UserRepository};
use loyalty_core::value_objects::{UserId, Utorid};

use crate::models::UserModel;

use super::error::{map_db_error, map_user_unique};

const USER_COLUMNS: &str = "id, utorid, name, email, birthday, role, points, verified, \
                            suspicious, reset_token, reset_expires_at, created_at, last_login";

/// PostgreSQL implementation of UserRepository
#[derive(Clone)]
pub struct PgUserRepository {
    pool: PgPool,
}

impl PgUserRepository {
    /// Create a new PgUserRepository
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    fn push_filters(builder: &mut QueryBuilder<'_, Postgres>, query: &UserQuery) {
        builder.push(" WHERE TRUE");
        if let Some(name) = &query.name {
            let pattern = format!("%{name}%");
            builder
                .push(" AND (utorid ILIKE ")
                .push_bind(pattern.clone())
                .push(" OR name ILIKE ")
                .push_bind(pattern)
                .push(")");
        }
        if let Some(role) = query.role {
            builder.push(" AND role = ").push_bind(role.as_str());
        }
        if let Some(verified) = query.verified {
            builder.push(" AND verified = ").push_bind(verified);
        }
        if let Some(activated) = query.activated {
            builder.push(if activated {
                " AND last_login IS NOT NULL"
            } else {
                " AND last_login IS NULL"
            });
        }
    }
}

#[async_trait]
impl UserRepository for PgUserRepository {
    #[instrument(skip(self))]
    async fn find_by_id(&self, id: UserId) -> RepoResult<Option<User>> {
        let result = sqlx::query_as::<_, UserModel>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE id = $1"
        ))
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(User::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_utorid(&self, utorid: &Utorid) -> RepoResult<Option<User>> {
        let result = sqlx::query_as::<_, UserModel>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE utorid = $1"
        ))
        .bind(utorid.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(User::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn find_by_email(&self, email: &str) -> RepoResult<Option<User>> {
        let result = sqlx::query_as::<_, UserModel>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE LOWER(email) = LOWER($1)"
        ))
        .bind(email)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(User::try_from).transpose()
    }

    #[instrument(skip(self))]
    async fn search_utorids(&self, needle: &str) -> RepoResult<Vec<Utorid>> {
        let pattern = format!("%{needle}%");
        let utorids = sqlx::query_scalar::<_, String>(
            r#"
            SELECT utorid FROM users
            WHERE utorid ILIKE $1 OR name ILIKE $1
            ORDER BY utorid
            "#,
        )
        .bind(pattern)
        .fetch_all(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(utorids.into_iter().map(Utorid::new_unchecked).collect())
    }

    #[instrument(skip(self))]
    async fn list(&self, query: &UserQuery) -> RepoResult<Vec<User>> {
        let mut builder =
            QueryBuilder::<Postgres>::new(format!("SELECT {USER_COLUMNS} FROM users"));
        Self::push_filters(&mut builder, query);
        builder
            .push(" ORDER BY id LIMIT ")
            .push_bind(query.limit)
            .push(" OFFSET ")
            .push_bind(query.offset);

        let models = builder
            .build_query_as::<UserModel>()
            .fetch_all(&self.pool)
            .await
            .map_err(map_db_error)?;

        models.into_iter().map(User::try_from).collect()
    }

    #[instrument(skip(self))]
    async fn count(&self, query: &UserQuery) -> RepoResult<i64> {
        let mut builder = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM users");
        Self::push_filters(&mut builder, query);

        builder
            .build_query_scalar::<i64>()
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    #[instrument(skip(self, token))]
    async fn find_by_reset_token(&self, token: &str) -> RepoResult<Option<User>> {
        let result = sqlx::query_as::<_, UserModel>(&format!(
            "SELECT {USER_COLUMNS} FROM users WHERE reset_token = $1"
        ))
        .bind(token)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        result.map(User::try_from).transpose()
    }

    #[instrument(skip(self, user), fields(utorid = %user.utorid))]
    async fn create(&self, user: &NewUser) -> RepoResult<User> {
        let model = sqlx::query_as::<_, UserModel>(&format!(
            r#"
            INSERT INTO users (utorid, name, email, reset_token, reset_expires_at)
            VALUES ($1, $2, $3, $4, $5)
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(user.utorid.as_str())
        .bind(&user.name)
        .bind(&user.email)
        .bind(&user.reset_token)
        .bind(user.reset_expires_at)
        .fetch_one(&self.pool)
        .await
        .map_err(map_user_unique)?;

        User::try_from(model)
    }

    #[instrument(skip(self))]
    async fn update(&self, id: UserId, update: &UserUpdate) -> RepoResult<User> {
        let model = sqlx::query_as::<_, UserModel>(&format!(
            r#"
            UPDATE users
            SET email = COALESCE($2, email),
                verified = COALESCE($3, verified),
                suspicious = COALESCE($4, suspicious),
                role = COALESCE($5, role),
                name = COALESCE($6, name),
                birthday = COALESCE($7, birthday)
            WHERE id = $1
            RETURNING {USER_COLUMNS}
            "#
        ))
        .bind(id.into_inner())
        .bind(update.email.as_deref())
        .bind(update.verified)
        .bind(update.suspicious)
        .bind(update.role.map(|r| r.as_str()))
        .bind(update.name.as_deref())
        .bind(update.birthday)
        .fetch_optional(&self.pool)
        .await
        .map_err(map_user_unique)?
        .ok_or_else(|| DomainError::UserNotFound(id.to_string()))?;

        User::try_from(model)
    }

    #[instrument(skip(self, token))]
    async fn set_reset_token(
        &self,
        id: UserId,
        token: &str,
        expires_at: DateTime<Utc>,
    ) -> RepoResult<()> {
        let result = sqlx::query(
            r#"
            UPDATE users SET reset_token = $2, reset_expires_at = $3 WHERE id = $1
            "#,
        )
        .bind(id.into_inner())
        .bind(token)
        .bind(expires_at)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::UserNotFound(id.to_string()));
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn get_password_hash(&self, id: UserId) -> RepoResult<Option<String>> {
        let result = sqlx::query_scalar::<_, Option<String>>(
            "SELECT password_hash FROM users WHERE id = $1",
        )
        .bind(id.into_inner())
        .fetch_optional(&self.pool)
        .await
        .map_err(map_db_error)?;

        Ok(result.flatten())
    }

    #[instrument(skip(self, password_hash))]
    async fn update_password(&self, id: UserId, password_hash: &str) -> RepoResult<()> {
        let result = sqlx::query("UPDATE users SET password_hash = $2 WHERE id = $1")
            .bind(id.into_inner())
            .bind(password_hash)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::UserNotFound(id.to_string()));
        }

        Ok(())
    }

    #[instrument(skip(self, token, password_hash))]
    async fn consume_reset_token(
        &self,
        id: UserId,
        token: &str,
        password_hash: &str,
        now: DateTime<Utc>,
    ) -> RepoResult<()> {
        // Expiry is rechecked here; a token is consumed at most once.
        let result = sqlx::query(
            r#"
            UPDATE users SET password_hash = $3, reset_expires_at = $4
            WHERE id = $1 AND reset_token = $2 AND reset_expires_at > $4
            "#,
        )
        .bind(id.into_inner())
        .bind(token)
        .bind(password_hash)
        .bind(now)
        .execute(&self.pool)
        .await
        .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::ResetTokenExpired);
        }

        Ok(())
    }

    #[instrument(skip(self))]
    async fn record_login(&self, id: UserId, at: DateTime<Utc>) -> RepoResult<()> {
        let result = sqlx::query("UPDATE users SET last_login = $2 WHERE id = $1")
            .bind(id.into_inner())
            .bind(at)
            .execute(&self.pool)
            .await
            .map_err(map_db_error)?;

        if result.rows_affected() == 0 {
            return Err(DomainError::UserNotFound(id.to_string()));
        }

        Ok(())
    }
}
