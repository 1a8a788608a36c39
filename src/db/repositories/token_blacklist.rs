use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ColumnTrait, DatabaseConnection, EntityTrait, PaginatorTrait, QueryFilter, Set,
    sea_query::OnConflict,
};

use crate::entities::blacklisted_tokens;

pub struct TokenBlacklistRepository {
    conn: DatabaseConnection,
}

impl TokenBlacklistRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Adds the token; revoking an already revoked token is a no-op.
    pub async fn add(&self, token: &str, expires_at: DateTime<Utc>) -> Result<()> {
        let entry = blacklisted_tokens::ActiveModel {
            token: Set(token.to_string()),
            expires_at: Set(expires_at),
            ..Default::default()
        };

        blacklisted_tokens::Entity::insert(entry)
            .on_conflict(
                OnConflict::column(blacklisted_tokens::Column::Token)
                    .do_nothing()
                    .to_owned(),
            )
            .exec_without_returning(&self.conn)
            .await
            .context("Failed to blacklist token")?;

        Ok(())
    }

    pub async fn contains(&self, token: &str) -> Result<bool> {
        let count = blacklisted_tokens::Entity::find()
            .filter(blacklisted_tokens::Column::Token.eq(token))
            .count(&self.conn)
            .await
            .context("Failed to query token blacklist")?;

        Ok(count > 0)
    }

    pub async fn delete_expired(&self, now: DateTime<Utc>) -> Result<u64> {
        let result = blacklisted_tokens::Entity::delete_many()
            .filter(blacklisted_tokens::Column::ExpiresAt.lt(now))
            .exec(&self.conn)
            .await
            .context("Failed to prune token blacklist")?;

        Ok(result.rows_affected)
    }
}
