use crate::config::RetryConfig;
use crate::error::AgentError;
use std::future::Future;

/// Result of a retry operation with context
#[derive(Debug)]
pub struct RetryResult<T> {
    /// The successful result
    pub result: T,
    /// Number of retry attempts made
    pub attempts_made: u32,
    /// Total time spent waiting between attempts (in seconds)
    pub total_retry_time: u64,
}

/// Run an agent operation, retrying while it reports [`AgentError::RateLimited`].
///
/// The delay before retry `n` (0-based) is
/// `min(retry_after + base_delay * 2^n, max_delay)` seconds. Any other error is
/// returned immediately, as is the rate-limit error once retries are exhausted.
///
/// # Arguments
/// * `config` - Retry configuration
/// * `operation_name` - Name of the operation for logging
/// * `operation` - Async function that returns a Result
/// * `on_rate_limit` - Called with (delay in seconds, 1-based attempt) before each wait
pub async fn retry_with_backoff<T, F, Fut, OnRateLimit>(
    config: &RetryConfig,
    operation_name: &str,
    mut operation: F,
    mut on_rate_limit: OnRateLimit,
) -> Result<RetryResult<T>, AgentError>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, AgentError>>,
    OnRateLimit: FnMut(u64, u32),
{
    let mut retries = 0;
    let mut total_retry_time = 0;

    loop {
        match operation().await {
            Ok(result) => {
                return Ok(RetryResult {
                    result,
                    attempts_made: retries,
                    total_retry_time,
                });
            }
            Err(AgentError::RateLimited { retry_after }) => {
                if !config.enabled || retries >= config.max_retries {
                    log::warn!(
                        "Max retries ({}) exceeded for {}",
                        config.max_retries,
                        operation_name
                    );
                    return Err(AgentError::RateLimited { retry_after });
                }

                let backoff = config
                    .base_delay
                    .saturating_mul(2_u64.saturating_pow(retries));
                let delay = std::cmp::min(retry_after.saturating_add(backoff), config.max_delay);

                log::info!(
                    "{} rate limited. Waiting {} seconds before retry {} of {}",
                    operation_name,
                    delay,
                    retries + 1,
                    config.max_retries
                );

                on_rate_limit(delay, retries + 1);

                tokio::time::sleep(std::time::Duration::from_secs(delay)).await;
                retries += 1;
                total_retry_time += delay;
            }
            Err(other_error) => {
                return Err(other_error);
            }
        }
    }
}
