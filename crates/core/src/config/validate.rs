use super::{types::Config, AuthMethod, ConfigError};

/// Largest worker pool we allow against the shared archive.
const MAX_WORKERS: usize = 16;

/// Largest page the archive's search API serves comfortably.
const MAX_PAGE_SIZE: u32 = 500;

/// Validate configuration beyond what serde enforces.
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.server.port == 0 {
        return Err(ConfigError::ValidationError(
            "server.port cannot be 0".to_string(),
        ));
    }

    if config.auth.method == AuthMethod::ApiKey
        && config.auth.api_key.as_ref().is_none_or(|k| k.is_empty())
    {
        return Err(ConfigError::ValidationError(
            "auth.api_key must be set when auth.method = \"api_key\"".to_string(),
        ));
    }

    let base_url = &config.source.base_url;
    if !(base_url.starts_with("http://") || base_url.starts_with("https://")) {
        return Err(ConfigError::ValidationError(format!(
            "source.base_url must be an http(s) URL, got {:?}",
            base_url
        )));
    }

    if config.source.requests_per_minute == 0 {
        return Err(ConfigError::ValidationError(
            "source.requests_per_minute cannot be 0".to_string(),
        ));
    }

    if config.source.retry.max_attempts == 0 {
        return Err(ConfigError::ValidationError(
            "source.retry.max_attempts must be at least 1".to_string(),
        ));
    }

    if config.import.workers == 0 || config.import.workers > MAX_WORKERS {
        return Err(ConfigError::ValidationError(format!(
            "import.workers must be between 1 and {}",
            MAX_WORKERS
        )));
    }

    if config.import.page_size == 0 || config.import.page_size > MAX_PAGE_SIZE {
        return Err(ConfigError::ValidationError(format!(
            "import.page_size must be between 1 and {}",
            MAX_PAGE_SIZE
        )));
    }

    if config.import.max_batch_size == 0 || config.import.max_collection_limit == 0 {
        return Err(ConfigError::ValidationError(
            "import.max_batch_size and import.max_collection_limit must be positive".to_string(),
        ));
    }

    for collection in &config.collections {
        if collection.key.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "collections[].key cannot be empty".to_string(),
            ));
        }
    }

    Ok(())
}
