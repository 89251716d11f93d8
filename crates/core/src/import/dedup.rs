use std::sync::Arc;

use tracing::warn;

use crate::catalog::VideoCatalog;

pub const ALREADY_IMPORTED: &str = "already imported";

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DedupDecision {
    Import,
    Skip { reason: String },
}

/// Pre-insert duplicate check.
///
/// Only an optimization: the catalog's unique constraint on `source_id` is
/// authoritative, so a lookup error falls through to `Import`.
#[derive(Clone)]
pub struct Deduplicator {
    catalog: Arc<dyn VideoCatalog>,
}

impl Deduplicator {
    pub fn new(catalog: Arc<dyn VideoCatalog>) -> Self {
        Self { catalog }
    }

    pub fn decide(&self, source_id: &str, skip_existing: bool) -> DedupDecision {
        match self.catalog.exists(source_id) {
            Ok(true) if skip_existing => DedupDecision::Skip {
                reason: ALREADY_IMPORTED.to_string(),
            },
            Ok(_) => DedupDecision::Import,
            Err(e) => {
                warn!("Duplicate check failed for {}: {}", source_id, e);
                DedupDecision::Import
            }
        }
    }
}
