//! Exponential backoff with jitter for transient KV/remote-store failures.

use crate::error::{MemoryError, MemoryResult};
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

#[derive(Debug, Clone)]
pub struct RetryConfig {
    pub max_retries: u32,
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub jitter_factor: f64,
    /// Growth factor applied to `base_delay` per attempt (`base * multiplier^attempt`).
    pub multiplier: f64,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            base_delay: Duration::from_millis(100),
            max_delay: Duration::from_millis(1000),
            jitter_factor: 0.1,
            multiplier: 2.0,
        }
    }
}

/// The enrichment pipeline's remote-store fetch uses exactly 50ms/200ms/800ms/3.2s
/// (×4 per step, §4.9 step 1), dropping the memory silently after 4 tries.
pub fn enrichment_fetch_config() -> RetryConfig {
    RetryConfig {
        max_retries: 4,
        base_delay: Duration::from_millis(50),
        max_delay: Duration::from_millis(3200),
        jitter_factor: 0.0,
        multiplier: 4.0,
    }
}

pub struct RetryExecutor {
    config: RetryConfig,
}

impl RetryExecutor {
    pub fn new(config: RetryConfig) -> Self {
        Self { config }
    }

    pub fn with_default() -> Self {
        Self::new(RetryConfig::default())
    }

    pub async fn execute<F, Fut, T>(&self, operation: F) -> MemoryResult<T>
    where
        F: Fn() -> Fut,
        Fut: Future<Output = MemoryResult<T>>,
    {
        let mut last_error = None;

        for attempt in 0..=self.config.max_retries {
            match operation().await {
                Ok(result) => {
                    if attempt > 0 {
                        debug!("operation succeeded after {attempt} retries");
                    }
                    return Ok(result);
                }
                Err(error) => {
                    let retryable = Self::should_retry(&error);
                    last_error = Some(error.clone());

                    if !retryable {
                        debug!("not retrying error: {error}");
                        return Err(error);
                    }

                    if attempt < self.config.max_retries {
                        let delay = self.calculate_delay(attempt);
                        warn!(
                            "operation failed (attempt {}/{}), retrying in {delay:?}: {error}",
                            attempt + 1,
                            self.config.max_retries + 1,
                        );
                        sleep(delay).await;
                    } else {
                        warn!("operation failed after {} attempts: {error}", self.config.max_retries + 1);
                    }
                }
            }
        }

        Err(last_error.unwrap_or_else(|| MemoryError::Internal("retry logic error: no attempts made".to_string())))
    }

    fn calculate_delay(&self, attempt: u32) -> Duration {
        let exponential = self.config.base_delay.as_millis() as f64 * self.config.multiplier.powi(attempt as i32);
        let capped = std::cmp::min(Duration::from_millis(exponential as u64), self.config.max_delay);

        if self.config.jitter_factor > 0.0 {
            let jitter_range = (capped.as_millis() as f64 * self.config.jitter_factor) as u64;
            let jitter = rand::thread_rng().gen_range(0..=jitter_range);
            Duration::from_millis(capped.as_millis() as u64 + jitter)
        } else {
            capped
        }
    }

    fn should_retry(error: &MemoryError) -> bool {
        match error {
            MemoryError::BackendUnavailable(_) => true,
            MemoryError::CacheUnavailable(_) => true,
            MemoryError::Timeout(_) => true,
            MemoryError::Internal(_) => true,
            MemoryError::NotFound(_) => false,
            MemoryError::Invalid(_) => false,
        }
    }
}

pub async fn retry_with_config<F, Fut, T>(operation: F, config: RetryConfig) -> MemoryResult<T>
where
    F: Fn() -> Fut,
    Fut: Future<Output = MemoryResult<T>>,
{
    RetryExecutor::new(config).execute(operation).await
}
