use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, Set, TransactionTrait,
    sea_query::{Expr, OnConflict},
};
use uuid::Uuid;

use crate::entities::{password_resets, users};

pub struct PasswordResetRepository {
    conn: DatabaseConnection,
}

impl PasswordResetRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn get_by_email(&self, email: &str) -> Result<Option<password_resets::Model>> {
        password_resets::Entity::find()
            .filter(password_resets::Column::Email.eq(email))
            .one(&self.conn)
            .await
            .context("Failed to query password reset entry")
    }

    /// Writes the reset code for `email` in a single statement.
    ///
    /// An existing row is replaced only when it was created at or before
    /// `cooldown_cutoff`; otherwise nothing changes and `false` is returned.
    pub async fn issue(
        &self,
        email: &str,
        code: &str,
        now: DateTime<Utc>,
        expires_at: DateTime<Utc>,
        cooldown_cutoff: DateTime<Utc>,
    ) -> Result<bool> {
        let entry = password_resets::ActiveModel {
            email: Set(email.to_string()),
            verification_code: Set(code.to_string()),
            expires_at: Set(expires_at),
            used: Set(false),
            created_at: Set(now),
            ..Default::default()
        };

        let written = password_resets::Entity::insert(entry)
            .on_conflict(
                OnConflict::column(password_resets::Column::Email)
                    .update_columns([
                        password_resets::Column::VerificationCode,
                        password_resets::Column::ExpiresAt,
                        password_resets::Column::Used,
                        password_resets::Column::CreatedAt,
                    ])
                    .action_and_where(password_resets::Column::CreatedAt.lte(cooldown_cutoff))
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to store password reset code")?;

        Ok(written == 1)
    }

    /// Flips `used` from false to true for the given entry.
    ///
    /// Returns false when a concurrent request already consumed it.
    pub async fn mark_used(&self, id: i32) -> Result<bool> {
        let result = password_resets::Entity::update_many()
            .col_expr(password_resets::Column::Used, Expr::value(true))
            .filter(password_resets::Column::Id.eq(id))
            .filter(password_resets::Column::Used.eq(false))
            .exec(&self.conn)
            .await
            .context("Failed to mark reset code as used")?;

        Ok(result.rows_affected == 1)
    }

    pub async fn has_used_entry(&self, email: &str) -> Result<bool> {
        let entry = password_resets::Entity::find()
            .filter(password_resets::Column::Email.eq(email))
            .filter(password_resets::Column::Used.eq(true))
            .one(&self.conn)
            .await
            .context("Failed to query verified reset entry")?;

        Ok(entry.is_some())
    }

    /// Sets the new password hash and removes the consumed reset entry atomically.
    ///
    /// Returns false if no `used` entry existed when the transaction ran.
    pub async fn complete_reset(
        &self,
        email: &str,
        user_id: Uuid,
        password_hash: String,
    ) -> Result<bool> {
        let txn = self.conn.begin().await?;

        let deleted = password_resets::Entity::delete_many()
            .filter(password_resets::Column::Email.eq(email))
            .filter(password_resets::Column::Used.eq(true))
            .exec(&txn)
            .await
            .context("Failed to delete used reset entries")?;

        if deleted.rows_affected == 0 {
            txn.rollback().await?;
            return Ok(false);
        }

        users::Entity::update_many()
            .col_expr(users::Column::PasswordHash, Expr::value(Some(password_hash)))
            .filter(users::Column::Id.eq(user_id))
            .exec(&txn)
            .await
            .context("Failed to update password")?;

        txn.commit().await?;
        Ok(true)
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = password_resets::Entity::delete_many()
            .filter(password_resets::Column::ExpiresAt.lt(now))
            .exec(&self.conn)
            .await
            .context("Failed to delete expired reset entries")?;

        Ok(result.rows_affected)
    }
}
