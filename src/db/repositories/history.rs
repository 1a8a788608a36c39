use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use sea_orm::{
    ActiveModelTrait, ColumnTrait, DatabaseConnection, EntityTrait, QueryFilter, QueryOrder, Set,
};
use uuid::Uuid;

use crate::entities::prediction_history;

#[derive(Debug, Clone)]
pub struct NewHistoryEntry {
    pub user_id: Uuid,
    pub file_name: String,
    pub percentage_weight_lose: f64,
    pub image_id: Uuid,
    pub image_url: String,
    pub features: serde_json::Value,
    pub created_at: DateTime<Utc>,
}

pub struct HistoryRepository {
    conn: DatabaseConnection,
}

impl HistoryRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    pub async fn insert(&self, entry: NewHistoryEntry) -> Result<prediction_history::Model> {
        let active = prediction_history::ActiveModel {
            id: Set(Uuid::new_v4()),
            user_id: Set(entry.user_id),
            file_name: Set(entry.file_name),
            percentage_weight_lose: Set(entry.percentage_weight_lose),
            image_id: Set(entry.image_id),
            image_url: Set(entry.image_url),
            features: Set(entry.features),
            created_at: Set(entry.created_at),
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to insert prediction history")
    }

    /// All records of one user, newest first.
    pub async fn list_for_user(&self, user_id: Uuid) -> Result<Vec<prediction_history::Model>> {
        prediction_history::Entity::find()
            .filter(prediction_history::Column::UserId.eq(user_id))
            .order_by_desc(prediction_history::Column::CreatedAt)
            .all(&self.conn)
            .await
            .context("Failed to list prediction history")
    }

    pub async fn get_for_user(
        &self,
        id: Uuid,
        user_id: Uuid,
    ) -> Result<Option<prediction_history::Model>> {
        prediction_history::Entity::find_by_id(id)
            .filter(prediction_history::Column::UserId.eq(user_id))
            .one(&self.conn)
            .await
            .context("Failed to load prediction history entry")
    }

    pub async fn delete_for_user(&self, id: Uuid, user_id: Uuid) -> Result<bool> {
        let result = prediction_history::Entity::delete_many()
            .filter(prediction_history::Column::Id.eq(id))
            .filter(prediction_history::Column::UserId.eq(user_id))
            .exec(&self.conn)
            .await
            .context("Failed to delete prediction history entry")?;

        Ok(result.rows_affected > 0)
    }
}
