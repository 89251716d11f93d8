use std::future::Future;

use tracing::warn;

use super::SourceError;
use crate::config::RetryConfig;
use crate::metrics;

/// Run `op` until it succeeds, fails permanently, or the attempt budget is spent.
///
/// Only [`SourceError::Unavailable`] is retried; the last error is returned
/// once `max_attempts` is reached.
pub async fn with_retry<T, F, Fut>(
    config: &RetryConfig,
    operation: &str,
    mut op: F,
) -> Result<T, SourceError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, SourceError>>,
{
    let max_attempts = config.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        match op().await {
            Ok(value) => return Ok(value),
            Err(e) if e.is_transient() && attempt < max_attempts => {
                let delay = config.delay_for_attempt(attempt);
                warn!(
                    "Archive {} failed (attempt {}/{}): {}; retrying in {}ms",
                    operation,
                    attempt,
                    max_attempts,
                    e,
                    delay.as_millis()
                );
                metrics::SOURCE_RETRIES
                    .with_label_values(&[operation])
                    .inc();
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => return Err(e),
        }
    }
}
