//! Profile reads and edits, avatar storage and stored-file lookup.

use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::UploadConfig;
use crate::db::{FileKind, NewFile, Store, is_unique_violation};
use crate::entities::stored_files;
use crate::services::auth_service::UserInfo;
use crate::services::uploads::{UploadError, validate_image};

#[derive(Debug, Error)]
pub enum ProfileError {
    #[error("You can only access your own profile")]
    Forbidden,

    #[error("User not found")]
    UserNotFound,

    #[error("Username already taken")]
    UsernameTaken,

    #[error("File not found")]
    FileNotFound,

    #[error(transparent)]
    Upload(#[from] UploadError),

    #[error("Database error: {0}")]
    Database(String),
}

impl From<anyhow::Error> for ProfileError {
    fn from(err: anyhow::Error) -> Self {
        Self::Database(err.to_string())
    }
}

pub struct ProfileService {
    store: Store,
    uploads: UploadConfig,
    public_url: String,
}

impl ProfileService {
    #[must_use]
    pub const fn new(store: Store, uploads: UploadConfig, public_url: String) -> Self {
        Self {
            store,
            uploads,
            public_url,
        }
    }

    pub async fn get_profile(&self, caller: Uuid, id: Uuid) -> Result<UserInfo, ProfileError> {
        if caller != id {
            return Err(ProfileError::Forbidden);
        }

        let user = self
            .store
            .user_repo()
            .get_by_id(id)
            .await?
            .ok_or(ProfileError::UserNotFound)?;

        Ok(UserInfo::from_model(user, &self.public_url))
    }

    pub async fn update_username(
        &self,
        caller: Uuid,
        id: Uuid,
        username: &str,
    ) -> Result<UserInfo, ProfileError> {
        if caller != id {
            return Err(ProfileError::Forbidden);
        }

        let repo = self.store.user_repo();
        if let Some(owner) = repo.get_by_username(username).await?
            && owner.id != id
        {
            return Err(ProfileError::UsernameTaken);
        }

        let user = match repo.update_username(id, username).await {
            Ok(user) => user,
            Err(e) if is_unique_violation(&e) => return Err(ProfileError::UsernameTaken),
            Err(e) => {
                if repo.get_by_id(id).await?.is_none() {
                    return Err(ProfileError::UserNotFound);
                }
                return Err(e.into());
            }
        };

        info!(event = "username_changed", user_id = %id, "Username updated");
        Ok(UserInfo::from_model(user, &self.public_url))
    }

    /// Stores a new avatar and links it; the previous one is removed best-effort.
    pub async fn upload_avatar(
        &self,
        user_id: Uuid,
        file_name: &str,
        data: Vec<u8>,
    ) -> Result<UserInfo, ProfileError> {
        let image = validate_image(file_name, data, &self.uploads)?;

        let user = self
            .store
            .user_repo()
            .get_by_id(user_id)
            .await?
            .ok_or(ProfileError::UserNotFound)?;

        let stored = self
            .store
            .file_repo()
            .store(NewFile {
                original_name: image.original_name,
                extension: image.extension,
                content_type: image.content_type,
                kind: FileKind::Avatar,
                owner_id: Some(user_id),
                data: image.data,
            })
            .await?;

        let linked = self.store.user_repo().set_avatar(user_id, stored.id).await;
        if !matches!(linked, Ok(true)) {
            if let Err(e) = self.store.file_repo().delete(stored.id).await {
                warn!(file_id = %stored.id, error = %e, "Failed to remove orphaned avatar");
            }
            return match linked {
                Err(e) => Err(e.into()),
                _ => Err(ProfileError::UserNotFound),
            };
        }

        if let Some(old) = user.avatar_id
            && let Err(e) = self.store.file_repo().delete(old).await
        {
            warn!(file_id = %old, error = %e, "Failed to delete previous avatar");
        }

        info!(event = "avatar_updated", user_id = %user_id, file_id = %stored.id, "Avatar updated");

        let user = self
            .store
            .user_repo()
            .get_by_id(user_id)
            .await?
            .ok_or(ProfileError::UserNotFound)?;
        Ok(UserInfo::from_model(user, &self.public_url))
    }

    /// Loads a stored blob of the given kind.
    pub async fn get_file(
        &self,
        id: Uuid,
        kind: FileKind,
    ) -> Result<stored_files::Model, ProfileError> {
        self.store
            .file_repo()
            .get(id)
            .await?
            .filter(|file| file.kind == kind.as_str())
            .ok_or(ProfileError::FileNotFound)
    }
}
