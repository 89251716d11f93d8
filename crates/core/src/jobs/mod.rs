//! Background collection imports.
//!
//! [`JobTracker`] validates a request, records a queued [`ImportJob`] in the
//! [`JobStore`] and spawns one task per job. The task pages through the
//! collection, hands each page to the batch coordinator and folds the
//! resulting report back into the job.

mod history;
mod store;
mod tracker;
mod types;

pub use history::{JobHistory, SqliteJobHistory};
pub use store::{JobStore, INTERRUPTED_BY_RESTART};
pub use tracker::JobTracker;
pub use types::*;
