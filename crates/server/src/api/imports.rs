//! Import endpoints: single item, explicit batch, and collection jobs.

use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use serde::{Deserialize, Serialize};
use tracing::info;
use vodingest_core::{
    ImportError, ImportJob, ImportOptions, ImportOutcome, Identity, JobError, VideoCatalogEntry,
};

use super::handlers::{api_error, api_error_with_reason, ApiError};
use crate::state::AppState;

// ============================================================================
// Request/Response types
// ============================================================================

fn default_true() -> bool {
    true
}

fn default_job_limit() -> u32 {
    100
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SingleImportRequest {
    pub identifier: String,
    #[serde(default = "default_true")]
    pub skip_existing: bool,
    #[serde(default)]
    pub sync_subtitles: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BatchImportRequest {
    pub identifiers: Vec<String>,
    #[serde(default = "default_true")]
    pub skip_existing: bool,
    #[serde(default)]
    pub sync_subtitles: bool,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CollectionImportRequest {
    pub collection: String,
    #[serde(default = "default_job_limit")]
    pub limit: u32,
    #[serde(default = "default_true")]
    pub skip_existing: bool,
    #[serde(default)]
    pub sync_subtitles: bool,
}

#[derive(Debug, Serialize)]
pub struct SingleImportResponse {
    pub video: VideoCatalogEntry,
}

#[derive(Debug, Serialize)]
pub struct BatchFailure {
    pub identifier: String,
    pub error: String,
}

#[derive(Debug, Serialize)]
pub struct BatchSkip {
    pub identifier: String,
    pub reason: String,
}

#[derive(Debug, Serialize)]
pub struct BatchImportResponse {
    pub success: Vec<VideoCatalogEntry>,
    pub failed: Vec<BatchFailure>,
    pub skipped: Vec<BatchSkip>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobCreatedResponse {
    pub job_id: String,
}

#[derive(Debug, Serialize)]
pub struct JobListResponse {
    pub jobs: Vec<ImportJob>,
}

// ============================================================================
// Helpers
// ============================================================================

fn options(skip_existing: bool, sync_subtitles: bool) -> ImportOptions {
    ImportOptions {
        skip_existing,
        sync_subtitles,
        category: None,
    }
}

fn import_error(source_id: &str, error: &ImportError) -> ApiError {
    let status = match error {
        ImportError::ItemNotFound(_) => StatusCode::NOT_FOUND,
        ImportError::InvalidMetadata(_) => StatusCode::UNPROCESSABLE_ENTITY,
        ImportError::DuplicateKey(_) => StatusCode::CONFLICT,
        ImportError::SourceUnavailable(_) => StatusCode::BAD_GATEWAY,
        ImportError::PersistenceError(_) | ImportError::Internal(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    };
    api_error_with_reason(
        status,
        format!("Failed to import {}: {}", source_id, error),
        error.code(),
    )
}

fn job_error(error: JobError) -> ApiError {
    let status = match error {
        JobError::NotFound(_) => StatusCode::NOT_FOUND,
        JobError::InvalidLimit { .. } | JobError::InvalidCollection => StatusCode::BAD_REQUEST,
        JobError::Terminal(_) => StatusCode::CONFLICT,
        JobError::History(_) => StatusCode::INTERNAL_SERVER_ERROR,
    };
    api_error(status, error.to_string())
}

// ============================================================================
// Handlers
// ============================================================================

/// POST /api/v1/vod/import/single
pub async fn import_single(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<SingleImportRequest>,
) -> Result<Json<SingleImportResponse>, ApiError> {
    let identifier = request.identifier.trim();
    if identifier.is_empty() {
        return Err(api_error(StatusCode::BAD_REQUEST, "identifier is required"));
    }

    info!("{} requested import of {}", identity.principal, identifier);

    let options = options(request.skip_existing, request.sync_subtitles);
    match state.coordinator().import_single(identifier, &options).await {
        ImportOutcome::Imported { entry } => Ok(Json(SingleImportResponse { video: entry })),
        ImportOutcome::Skipped { source_id, reason } => Err(api_error_with_reason(
            StatusCode::CONFLICT,
            format!("Skipped {}", source_id),
            reason,
        )),
        ImportOutcome::Failed { source_id, error } => Err(import_error(&source_id, &error)),
    }
}

/// POST /api/v1/vod/import/batch
pub async fn import_batch(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<BatchImportRequest>,
) -> Result<Json<BatchImportResponse>, ApiError> {
    let max = state.config().import.max_batch_size;
    if request.identifiers.is_empty() {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "identifiers must not be empty",
        ));
    }
    if request.identifiers.len() > max {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            format!(
                "Batch of {} exceeds the maximum of {} identifiers",
                request.identifiers.len(),
                max
            ),
        ));
    }

    let identifiers: Vec<String> = request
        .identifiers
        .iter()
        .map(|id| id.trim().to_string())
        .collect();
    if identifiers.iter().any(|id| id.is_empty()) {
        return Err(api_error(
            StatusCode::BAD_REQUEST,
            "identifiers must not contain blank entries",
        ));
    }

    info!(
        "{} requested batch import of {} item(s)",
        identity.principal,
        identifiers.len()
    );

    let options = options(request.skip_existing, request.sync_subtitles);
    let report = state.coordinator().import_batch(&identifiers, &options).await;

    Ok(Json(BatchImportResponse {
        success: report.imported,
        failed: report
            .failed
            .into_iter()
            .map(|f| BatchFailure {
                identifier: f.source_id,
                error: f.error.to_string(),
            })
            .collect(),
        skipped: report
            .skipped
            .into_iter()
            .map(|s| BatchSkip {
                identifier: s.source_id,
                reason: s.reason,
            })
            .collect(),
    }))
}

/// POST /api/v1/vod/import/collection
///
/// Starts a background job and answers 202 with its id.
pub async fn import_collection(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Json(request): Json<CollectionImportRequest>,
) -> Result<(StatusCode, Json<JobCreatedResponse>), ApiError> {
    info!(
        "{} requested import of collection {} (limit {})",
        identity.principal, request.collection, request.limit
    );

    let options = options(request.skip_existing, request.sync_subtitles);
    let job_id = state
        .tracker()
        .import_from_collection(&request.collection, request.limit, options)
        .await
        .map_err(job_error)?;

    Ok((StatusCode::ACCEPTED, Json(JobCreatedResponse { job_id })))
}

/// GET /api/v1/vod/import/jobs
pub async fn list_jobs(State(state): State<Arc<AppState>>) -> Json<JobListResponse> {
    Json(JobListResponse {
        jobs: state.tracker().list_jobs().await,
    })
}

/// GET /api/v1/vod/import/jobs/{id}
pub async fn get_job(
    State(state): State<Arc<AppState>>,
    Path(id): Path<String>,
) -> Result<Json<ImportJob>, ApiError> {
    state.tracker().get_job(&id).await.map(Json).map_err(job_error)
}
