//! Catalog maintenance endpoints.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;
use vodingest_core::{CatalogError, VideoCatalogEntry};

use super::handlers::{api_error, ApiError, SuccessResponse};
use crate::state::AppState;

fn catalog_error(id: i64, error: CatalogError) -> ApiError {
    match error {
        CatalogError::NotFound(_) => {
            api_error(StatusCode::NOT_FOUND, format!("Video not found: {}", id))
        }
        other => api_error(StatusCode::INTERNAL_SERVER_ERROR, other.to_string()),
    }
}

/// DELETE /api/v1/vod/videos/{id}
pub async fn delete_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<SuccessResponse>, ApiError> {
    state
        .catalog()
        .delete(id)
        .map_err(|e| catalog_error(id, e))?;

    info!("Deleted video {}", id);
    Ok(Json(SuccessResponse {
        message: format!("Video {} deleted", id),
    }))
}

/// PUT /api/v1/vod/videos/{id}/toggle
///
/// Flips `isActive` and returns the updated entry.
pub async fn toggle_video(
    State(state): State<Arc<AppState>>,
    Path(id): Path<i64>,
) -> Result<Json<VideoCatalogEntry>, ApiError> {
    let entry = state
        .catalog()
        .toggle_active(id)
        .map_err(|e| catalog_error(id, e))?;

    info!("Video {} is now {}", id, if entry.is_active { "active" } else { "inactive" });
    Ok(Json(entry))
}
