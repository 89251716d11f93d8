//! Prometheus metrics for core components.
//!
//! This module provides metrics for:
//! - Import pipeline (per-item outcomes, batch durations)
//! - Collection jobs (state transitions)
//! - External archive (requests, retries, latency)

use once_cell::sync::Lazy;
use prometheus::{HistogramOpts, HistogramVec, IntCounterVec, Opts};

// =============================================================================
// Import Pipeline Metrics
// =============================================================================

/// Item import outcomes by result and reason.
pub static IMPORT_OUTCOMES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vodingest_import_outcomes_total",
            "Total item import outcomes",
        ),
        &["result", "reason"], // result: "imported", "skipped", "failed"
    )
    .unwrap()
});

/// Batch duration in seconds.
pub static BATCH_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vodingest_batch_duration_seconds",
            "Duration of a batch import",
        )
        .buckets(vec![0.1, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0, 300.0]),
        &["kind"], // "batch", "page"
    )
    .unwrap()
});

// =============================================================================
// Job Metrics
// =============================================================================

/// Collection job state transitions.
pub static JOB_TRANSITIONS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vodingest_job_transitions_total",
            "Collection import job state transitions",
        ),
        &["to_state"],
    )
    .unwrap()
});

// =============================================================================
// External Archive Metrics
// =============================================================================

/// Archive requests by operation and status.
pub static SOURCE_REQUESTS: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vodingest_source_requests_total",
            "Total requests to the external archive",
        ),
        &["operation", "status"], // status: "success", "not_found", "unavailable", "parse_error"
    )
    .unwrap()
});

/// Archive request duration in seconds.
pub static SOURCE_REQUEST_DURATION: Lazy<HistogramVec> = Lazy::new(|| {
    HistogramVec::new(
        HistogramOpts::new(
            "vodingest_source_request_duration_seconds",
            "Duration of requests to the external archive",
        )
        .buckets(vec![0.05, 0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0]),
        &["operation"],
    )
    .unwrap()
});

/// Retries of transient archive failures.
pub static SOURCE_RETRIES: Lazy<IntCounterVec> = Lazy::new(|| {
    IntCounterVec::new(
        Opts::new(
            "vodingest_source_retries_total",
            "Retries of transient archive failures",
        ),
        &["operation"],
    )
    .unwrap()
});

/// Get all core metrics for registration.
pub fn all_metrics() -> Vec<Box<dyn prometheus::core::Collector>> {
    vec![
        // Import
        Box::new(IMPORT_OUTCOMES.clone()),
        Box::new(BATCH_DURATION.clone()),
        // Jobs
        Box::new(JOB_TRANSITIONS.clone()),
        // Archive
        Box::new(SOURCE_REQUESTS.clone()),
        Box::new(SOURCE_REQUEST_DURATION.clone()),
        Box::new(SOURCE_RETRIES.clone()),
    ]
}
