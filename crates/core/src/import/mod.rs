//! Import pipeline: dedup check, archive fetch, mapping and insert.
//!
//! [`ImportExecutor`] handles one item. [`BatchCoordinator`] fans a list out
//! over the shared [`WorkerPool`] and partitions the outcomes into a
//! [`BatchReport`].

mod batch;
mod dedup;
mod executor;
mod types;

pub use batch::{BatchCoordinator, PoolStatus, WorkerPool};
pub use dedup::{DedupDecision, Deduplicator, ALREADY_IMPORTED};
pub use executor::{build_entry, ImportExecutor, UNCATEGORIZED};
pub use types::*;
