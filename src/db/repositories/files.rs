use anyhow::{Context, Result};
use chrono::Utc;
use sea_orm::{ActiveModelTrait, DatabaseConnection, EntityTrait, ModelTrait, Set};
use uuid::Uuid;

use crate::entities::stored_files;

/// What a stored blob is used for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FileKind {
    Avatar,
    PredictionImage,
}

impl FileKind {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Avatar => "avatar",
            Self::PredictionImage => "prediction_image",
        }
    }
}

#[derive(Debug, Clone)]
pub struct NewFile {
    pub original_name: String,
    pub extension: String,
    pub content_type: String,
    pub kind: FileKind,
    pub owner_id: Option<Uuid>,
    pub data: Vec<u8>,
}

pub struct FileRepository {
    conn: DatabaseConnection,
}

impl FileRepository {
    #[must_use]
    pub const fn new(conn: DatabaseConnection) -> Self {
        Self { conn }
    }

    /// Stores the blob under a generated `<uuid>.<ext>` name.
    pub async fn store(&self, file: NewFile) -> Result<stored_files::Model> {
        let id = Uuid::new_v4();
        let size = i64::try_from(file.data.len()).context("File too large to store")?;

        let active = stored_files::ActiveModel {
            id: Set(id),
            filename: Set(format!("{id}.{}", file.extension)),
            original_name: Set(file.original_name),
            content_type: Set(file.content_type),
            kind: Set(file.kind.as_str().to_string()),
            owner_id: Set(file.owner_id),
            size: Set(size),
            data: Set(file.data),
            created_at: Set(Utc::now()),
        };

        active
            .insert(&self.conn)
            .await
            .context("Failed to store file")
    }

    pub async fn get(&self, id: Uuid) -> Result<Option<stored_files::Model>> {
        stored_files::Entity::find_by_id(id)
            .one(&self.conn)
            .await
            .context("Failed to load stored file")
    }

    pub async fn delete(&self, id: Uuid) -> Result<bool> {
        let Some(file) = self.get(id).await? else {
            return Ok(false);
        };

        file.delete(&self.conn)
            .await
            .context("Failed to delete stored file")?;
        Ok(true)
    }
}
