pub mod auth;
pub mod catalog;
pub mod collections;
pub mod config;
pub mod import;
pub mod jobs;
pub mod metrics;
pub mod source;
pub mod testing;

pub use auth::{
    create_authenticator, ApiKeyAuthenticator, AuthError, AuthRequest, Authenticator, Identity,
    NoneAuthenticator,
};
pub use catalog::{
    CatalogError, CatalogStats, CategoryCount, NewCatalogEntry, SqliteCatalog, VideoCatalog,
    VideoCatalogEntry,
};
pub use collections::{CollectionDescriptor, CollectionRegistry, CollectionStatsAggregator};
pub use config::{
    load_config, load_config_from_str, validate_config, AuthConfig, AuthMethod, Config,
    ConfigError, SanitizedConfig,
};
pub use import::{
    BatchCoordinator, BatchReport, ImportError, ImportExecutor, ImportOptions, ImportOutcome,
    PoolStatus, WorkerPool,
};
pub use jobs::{ImportJob, JobError, JobHistory, JobStatus, JobStore, JobTracker, SqliteJobHistory};
pub use source::{ArchiveClient, ItemDescriptor, SourceClient, SourceError};
