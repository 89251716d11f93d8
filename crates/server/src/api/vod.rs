//! Read-only archive and catalog endpoints for the admin UI.

use std::collections::HashSet;
use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};
use vodingest_core::{CatalogStats, CollectionDescriptor, ItemDescriptor, SourceError};

use super::handlers::{api_error, ApiError};
use crate::state::AppState;

pub const DEFAULT_PAGE_LIMIT: u32 = 24;
pub const MAX_PAGE_LIMIT: u32 = 100;

// ============================================================================
// Request/Response types
// ============================================================================

#[derive(Debug, Deserialize)]
pub struct BrowseParams {
    #[serde(default = "default_page")]
    pub page: u32,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub q: String,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_page() -> u32 {
    1
}

fn default_limit() -> u32 {
    DEFAULT_PAGE_LIMIT
}

fn clamp_limit(limit: u32) -> u32 {
    limit.clamp(1, MAX_PAGE_LIMIT)
}

/// An archive item annotated with whether the catalog already has it.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ArchiveItem {
    #[serde(flatten)]
    pub item: ItemDescriptor,
    pub already_imported: bool,
}

#[derive(Debug, Serialize)]
pub struct BrowseResponse {
    pub items: Vec<ArchiveItem>,
    pub page: u32,
    pub pages: u32,
    pub total: u64,
}

#[derive(Debug, Serialize)]
pub struct SearchResponse {
    pub items: Vec<ArchiveItem>,
}

#[derive(Debug, Serialize)]
pub struct CollectionsResponse {
    pub collections: Vec<CollectionDescriptor>,
}

#[derive(Debug, Serialize)]
pub struct CollectionStatsResponse {
    pub stats: Vec<CollectionDescriptor>,
}

// ============================================================================
// Helpers
// ============================================================================

pub(crate) fn source_error(error: SourceError) -> ApiError {
    let status = match error {
        SourceError::NotFound(_) | SourceError::CollectionNotFound(_) => StatusCode::NOT_FOUND,
        SourceError::Unavailable(_) | SourceError::Parse(_) => StatusCode::BAD_GATEWAY,
    };
    api_error(status, error.to_string())
}

/// Annotate `items` with catalog membership. A failed lookup marks nothing.
fn annotate(state: &AppState, items: Vec<ItemDescriptor>) -> Vec<ArchiveItem> {
    let ids: Vec<String> = items.iter().map(|i| i.source_id.clone()).collect();
    let existing = state.catalog().existing_source_ids(&ids).unwrap_or_else(|e| {
        warn!("Catalog lookup failed while annotating items: {}", e);
        HashSet::new()
    });

    items
        .into_iter()
        .map(|item| ArchiveItem {
            already_imported: existing.contains(&item.source_id),
            item,
        })
        .collect()
}

// ============================================================================
// Handlers
// ============================================================================

/// GET /api/v1/vod/stats
pub async fn get_stats(State(state): State<Arc<AppState>>) -> Result<Json<CatalogStats>, ApiError> {
    state
        .catalog()
        .stats()
        .map(Json)
        .map_err(|e| api_error(StatusCode::INTERNAL_SERVER_ERROR, e.to_string()))
}

/// GET /api/v1/vod/collections
///
/// Known collections with the last cached counts. Never calls the archive.
pub async fn list_collections(State(state): State<Arc<AppState>>) -> Json<CollectionsResponse> {
    Json(CollectionsResponse {
        collections: state.aggregator().cached().await,
    })
}

/// GET /api/v1/vod/collections/stats
pub async fn collection_stats(State(state): State<Arc<AppState>>) -> Json<CollectionStatsResponse> {
    Json(CollectionStatsResponse {
        stats: state.aggregator().get_collection_stats().await,
    })
}

/// GET /api/v1/vod/collections/{id}/browse
pub async fn browse_collection(
    State(state): State<Arc<AppState>>,
    Path(key): Path<String>,
    Query(params): Query<BrowseParams>,
) -> Result<Json<BrowseResponse>, ApiError> {
    let page = params.page.max(1);
    let limit = clamp_limit(params.limit);
    debug!("Browsing {} page {} ({} per page)", key, page, limit);

    let listing = state
        .source()
        .list_collection(&key, page, limit)
        .await
        .map_err(source_error)?;

    Ok(Json(BrowseResponse {
        items: annotate(&state, listing.items),
        page: listing.page,
        pages: listing.pages,
        total: listing.total,
    }))
}

/// GET /api/v1/vod/search
pub async fn search(
    State(state): State<Arc<AppState>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<SearchResponse>, ApiError> {
    let query = params.q.trim();
    if query.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "Query parameter 'q' is required",
        ));
    }

    let items = state
        .source()
        .search(query, clamp_limit(params.limit))
        .await
        .map_err(source_error)?;

    Ok(Json(SearchResponse {
        items: annotate(&state, items),
    }))
}

/// GET /api/v1/vod/preview/{identifier}
pub async fn preview(
    State(state): State<Arc<AppState>>,
    Path(identifier): Path<String>,
) -> Result<Json<ArchiveItem>, ApiError> {
    let item = state
        .source()
        .fetch_item(&identifier)
        .await
        .map_err(source_error)?;

    let mut annotated = annotate(&state, vec![item]);
    annotated
        .pop()
        .map(Json)
        .ok_or_else(|| api_error(StatusCode::INTERNAL_SERVER_ERROR, "Preview lost its item"))
}
