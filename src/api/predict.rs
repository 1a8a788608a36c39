use axum::{
    Extension, Json,
    extract::{Multipart, Path, State},
    response::Response,
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::upload::read_file_field;
use super::users::file_response;
use super::validation::parse_id;
use super::{ApiError, ApiResponse, AppState};
use crate::db::FileKind;
use crate::services::PredictionOutcome;

/// POST /predict
/// Multipart body with a `file` part; history is recorded for signed-in callers
pub async fn predict(
    State(state): State<Arc<AppState>>,
    caller: Option<Extension<CurrentUser>>,
    mut multipart: Multipart,
) -> Result<Json<ApiResponse<PredictionOutcome>>, ApiError> {
    let file = read_file_field(&mut multipart, "file").await?;
    let user_id = caller.map(|Extension(user)| user.id);

    let outcome = state
        .prediction_service()
        .predict(user_id, &file.file_name, file.data)
        .await?;

    Ok(Json(ApiResponse::success("Prediction successful", outcome)))
}

/// GET /image/{fileId}
pub async fn get_image(
    State(state): State<Arc<AppState>>,
    Path(file_id): Path<String>,
) -> Result<Response, ApiError> {
    let id = parse_id(&file_id, "file")?;
    let file = state
        .profile_service()
        .get_file(id, FileKind::PredictionImage)
        .await?;
    Ok(file_response(file))
}
