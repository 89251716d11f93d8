use axum::{
    middleware::{from_fn, from_fn_with_state},
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower_http::{cors::CorsLayer, trace::TraceLayer};

use super::middleware::{auth_middleware, metrics_middleware};
use super::{handlers, imports, videos, vod};
use crate::state::AppState;

pub fn create_router(state: Arc<AppState>) -> Router {
    // Admin API routes, all behind auth
    let api_routes = Router::new()
        .route("/config", get(handlers::get_config))
        // Catalog and archive browsing
        .route("/vod/stats", get(vod::get_stats))
        .route("/vod/collections", get(vod::list_collections))
        .route("/vod/collections/stats", get(vod::collection_stats))
        .route("/vod/collections/{id}/browse", get(vod::browse_collection))
        .route("/vod/search", get(vod::search))
        .route("/vod/preview/{identifier}", get(vod::preview))
        // Imports
        .route("/vod/import/single", post(imports::import_single))
        .route("/vod/import/batch", post(imports::import_batch))
        .route("/vod/import/collection", post(imports::import_collection))
        .route("/vod/import/jobs", get(imports::list_jobs))
        .route("/vod/import/jobs/{id}", get(imports::get_job))
        // Catalog maintenance
        .route("/vod/videos/{id}", delete(videos::delete_video))
        .route("/vod/videos/{id}/toggle", put(videos::toggle_video))
        .layer(from_fn_with_state(Arc::clone(&state), auth_middleware))
        .with_state(Arc::clone(&state));

    Router::new()
        .route("/health", get(handlers::health))
        .route("/metrics", get(handlers::metrics))
        .with_state(state)
        .nest("/api/v1", api_routes)
        .layer(from_fn(metrics_middleware))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
}
