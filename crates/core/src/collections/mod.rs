//! Curated archive collections and their cached sizes.

mod aggregator;
mod registry;

pub use aggregator::CollectionStatsAggregator;
pub use registry::{CollectionDescriptor, CollectionRegistry};
