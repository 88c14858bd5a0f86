use std::future::Future;
use std::time::Duration;

use bias_core::BiasError;

use crate::{RETRY_ATTEMPTS, RETRY_BACKOFF_SECS};

/// Run `op` up to [`RETRY_ATTEMPTS`] times with linear-growing backoff.
/// The closure receives the attempt number (1-based) for logging.
pub async fn with_retries<T, F, Fut>(label: &str, op: F) -> Result<T, BiasError>
where
    F: Fn(u32) -> Fut,
    Fut: Future<Output = Result<T, BiasError>>,
{
    let mut last_error = None;
    for attempt in 1..=RETRY_ATTEMPTS {
        match op(attempt).await {
            Ok(value) => return Ok(value),
            Err(err) => {
                tracing::warn!(
                    "{} failed (attempt {}/{}): {}",
                    label,
                    attempt,
                    RETRY_ATTEMPTS,
                    err
                );
                last_error = Some(err);
                if attempt < RETRY_ATTEMPTS {
                    tokio::time::sleep(Duration::from_secs(
                        RETRY_BACKOFF_SECS * attempt as u64,
                    ))
                    .await;
                }
            }
        }
    }
    Err(last_error
        .unwrap_or_else(|| BiasError::SourceError(format!("{label} failed with no attempts"))))
}
