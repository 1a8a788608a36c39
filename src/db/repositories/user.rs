use anyhow::{Context, Result};
use argon2::{
    Algorithm, Argon2, Params, Version,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString, rand_core::OsRng},
};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set,
    sea_query::Expr,
};
use tokio::task;
use uuid::Uuid;

use crate::config::SecurityConfig;
use crate::entities::users;

/// Fields for a new account row.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub username: String,
    pub email: String,
    pub password_hash: Option<String>,
    pub email_verified: bool,
    pub verification_code: Option<String>,
    pub code_expires_at: Option<DateTime<Utc>>,
    pub last_verification_sent: Option<DateTime<Utc>>,
}

pub struct UserRepository {
    conn: DatabaseConnection,
}

impl UserRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_id(&self, id: Uuid) -> Result<Option<users::Model>> {
        users::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to query user by ID")
    }

    pub async fn get_by_username(&self, username: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Username.eq(username))
            .one(&self.conn)
            .await
            .context("Failed to query user by username")
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<users::Model>> {
        users::Entity::find()
            .filter(users::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query user by email")
    }

    pub async fn username_taken(&self, username: &str) -> Result<bool> {
        Ok(self.get_by_username(username).await?.is_some())
    }

    pub async fn create(&self, user: NewUser) -> Result<users::Model> {
        let active = users::ActiveModel {
            id: Set(Uuid::new_v4()),
            username: Set(user.username),
            email: Set(user.email),
            password_hash: Set(user.password_hash),
            email_verified: Set(user.email_verified),
            verification_code: Set(user.verification_code),
            avatar_id: Set(None),
            created_at: Set(Utc::now()),
            last_verification_sent: Set(user.last_verification_sent),
            code_expires_at: Set(user.code_expires_at),
        };

        // Not wrapped in context: callers inspect the DbErr for unique violations.
        Ok(active.insert(&self.conn).await?)
    }

    /// Marks the email verified if `code` is still the pending code for `user_id`.
    ///
    /// Returns false when another request consumed or replaced the code first.
    pub async fn consume_verification_code(&self, user_id: Uuid, code: &str) -> Result<bool> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::EmailVerified, Expr::value(true))
            .col_expr(
                users::Column::VerificationCode,
                Expr::value(Option::<String>::None),
            )
            .col_expr(
                users::Column::CodeExpiresAt,
                Expr::value(Option::<DateTime<Utc>>::None),
            )
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::EmailVerified.eq(false))
            .filter(users::Column::VerificationCode.eq(code))
            .exec(&self.conn)
            .await
            .context("Failed to mark email as verified")?;

        Ok(result.rows_affected == 1)
    }

    /// Stores a fresh verification code unless one was sent after `cooldown_cutoff`.
    ///
    /// Returns false when the cooldown condition did not hold at write time.
    pub async fn replace_verification_code(
        &self,
        user_id: Uuid,
        code: &str,
        sent_at: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        cooldown_cutoff: DateTime<Utc>,
    ) -> Result<bool> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::VerificationCode, Expr::value(code))
            .col_expr(users::Column::LastVerificationSent, Expr::value(sent_at))
            .col_expr(users::Column::CodeExpiresAt, Expr::value(expires_at))
            .filter(users::Column::Id.eq(user_id))
            .filter(users::Column::EmailVerified.eq(false))
            .filter(
                sea_orm::Condition::any()
                    .add(users::Column::LastVerificationSent.is_null())
                    .add(users::Column::LastVerificationSent.lte(cooldown_cutoff)),
            )
            .exec(&self.conn)
            .await
            .context("Failed to store verification code")?;

        Ok(result.rows_affected == 1)
    }

    pub async fn update_username(&self, user_id: Uuid, username: &str) -> Result<users::Model> {
        let user = self
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| anyhow::anyhow!("User not found: {user_id}"))?;

        let mut active: users::ActiveModel = user.into();
        active.username = Set(username.to_string());
        Ok(active.update(&self.conn).await?)
    }

    pub async fn set_avatar(&self, user_id: Uuid, avatar_id: Uuid) -> Result<bool> {
        let result = users::Entity::update_many()
            .col_expr(users::Column::AvatarId, Expr::value(Some(avatar_id)))
            .filter(users::Column::Id.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to link avatar")?;

        Ok(result.rows_affected == 1)
    }

    /// Verifies a password against the stored hash.
    /// Note: This uses `spawn_blocking` because Argon2 hashing is CPU-intensive
    /// and would block the async runtime if run directly.
    pub async fn verify_password(&self, user: &users::Model, password: &str) -> Result<bool> {
        let Some(password_hash) = user.password_hash.clone() else {
            return Ok(false);
        };
        let password = password.to_string();

        let is_valid = task::spawn_blocking(move || {
            let parsed_hash = PasswordHash::new(&password_hash)
                .map_err(|e| anyhow::anyhow!("Invalid password hash format: {e}"))?;

            let argon2 = Argon2::default();
            Ok::<bool, anyhow::Error>(
                argon2
                    .verify_password(password.as_bytes(), &parsed_hash)
                    .is_ok(),
            )
        })
        .await
        .context("Password verification task panicked")??;

        Ok(is_valid)
    }

    /// Deletes accounts that never verified their email before the code expired.
    pub async fn delete_expired_unverified(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = users::Entity::delete_many()
            .filter(users::Column::EmailVerified.eq(false))
            .filter(users::Column::CodeExpiresAt.lt(now))
            .exec(&self.conn)
            .await
            .context("Failed to delete expired unverified users")?;

        Ok(result.rows_affected)
    }
}

/// Hash a password using Argon2id with the configured cost parameters.
pub fn hash_password(password: &str, config: &SecurityConfig) -> Result<String> {
    let salt = SaltString::generate(&mut OsRng);

    let params = Params::new(
        config.argon2_memory_cost_kib,
        config.argon2_time_cost,
        config.argon2_parallelism,
        None, // output length (use default)
    )
    .map_err(|e| anyhow::anyhow!("Invalid Argon2 params: {e}"))?;
    let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

    let hash = argon2
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("Failed to hash password: {e}"))?;

    Ok(hash.to_string())
}

/// Runs [`hash_password`] on the blocking pool.
pub async fn hash_password_blocking(password: &str, config: &SecurityConfig) -> Result<String> {
    let password = password.to_string();
    let config = config.clone();
    task::spawn_blocking(move || hash_password(&password, &config))
        .await
        .context("Password hashing task panicked")?
}
