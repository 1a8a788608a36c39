use axum::{
    Extension, Json,
    extract::{Path, State},
};
use std::sync::Arc;

use super::auth::CurrentUser;
use super::validation::parse_id;
use super::{ApiError, ApiResponse, AppState, HistoryDto};

/// GET /history
/// Newest first; an empty history is an empty list
pub async fn list_history(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
) -> Result<Json<ApiResponse<Vec<HistoryDto>>>, ApiError> {
    let entries = state
        .store()
        .history_repo()
        .list_for_user(caller.id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    let entries = entries.into_iter().map(HistoryDto::from).collect();
    Ok(Json(ApiResponse::success(
        "Prediction history retrieved successfully",
        entries,
    )))
}

/// GET /history/{id}
pub async fn get_history(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<HistoryDto>>, ApiError> {
    let id = parse_id(&id, "history")?;

    let entry = state
        .store()
        .history_repo()
        .get_for_user(id, caller.id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?
        .ok_or_else(|| ApiError::NotFound("History not found or not owned by user".to_string()))?;

    Ok(Json(ApiResponse::success(
        "Prediction history retrieved successfully",
        entry.into(),
    )))
}

/// DELETE /history/{id}
pub async fn delete_history(
    State(state): State<Arc<AppState>>,
    Extension(caller): Extension<CurrentUser>,
    Path(id): Path<String>,
) -> Result<Json<ApiResponse<()>>, ApiError> {
    let id = parse_id(&id, "history")?;

    let deleted = state
        .store()
        .history_repo()
        .delete_for_user(id, caller.id)
        .await
        .map_err(|e| ApiError::DatabaseError(e.to_string()))?;

    if !deleted {
        return Err(ApiError::NotFound(
            "History item not found or not owned by user".to_string(),
        ));
    }

    tracing::info!(event = "history_deleted", user_id = %caller.id, history_id = %id, "History item deleted");
    Ok(Json(ApiResponse::message("History item deleted successfully")))
}
