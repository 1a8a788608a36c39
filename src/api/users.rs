use axum::{
    Extension, Json,
    body::Body,
    extract::{Multipart, Path, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
};
use serde::Deserialize;
use std::sync::Arc;

use super::auth::CurrentUser;
use super::upload::read_file_field;
use super::validation::{parse_id, validate_username};
use super::{ApiError, ApiResponse, AppState};
use crate::db::FileKind;
use crate::entities::stored_files;
use crate::services::UserInfo;

#[derive(Deserialize)]
pub struct UpdateUserRequest {
    pub username: String,
}

/// GET /user/{id}
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let id = parse_id(&id, "user")?;
    let user = state.profile_service().get_profile(caller.id, id).await?;
    Ok(Json(ApiResponse::success("User found", user)))
}

/// PATCH /user/{id}
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Path(id): Path<String>,
    Json(payload): Json<UpdateUserRequest>,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let id = parse_id(&id, "user")?;
    let username = validate_username(&payload.username)?;

    let user = state
        .profile_service()
        .update_username(caller.id, id, &username)
        .await?;
    Ok(Json(ApiResponse::success("Username updated", user)))
}

/// POST /user/avatar
/// Multipart body with an `avatar` file part
pub async fn upload_avatar(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<UserInfo>>, ApiError> {
    let file = read_file_field(&mut multipart, "avatar").await?;

    let user = state
        .profile_service()
        .upload_avatar(caller.id, &file.file_name, file.data)
        .await?;
    Ok(Json(ApiResponse::success("Avatar uploaded successfully", user)))
}

/// GET /user/avatar/{fileId}
pub async fn get_avatar(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&file_id, "file")?;
    let file = state
        .profile_service()
        .get_file(id, FileKind::Avatar)
        .await?;
    Ok(file_response(file))
}

/// Raw bytes with the stored content type.
pub fn file_response(file: stored_files::Model) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, file.content_type),
            (header::CACHE_CONTROL, "private, max-age=86400".to_string()),
        ],
        Body::from(file.data),
    )
        .into_response()
}
