//! Retry logic with exponential backoff

use std::time::Duration;
use tokio::time::sleep;
use tracing::{debug, warn};

/// Configuration for retry behavior
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first)
    pub max_attempts: u32,

    /// Initial delay between attempts (milliseconds)
    pub initial_delay_ms: u64,

    /// Multiplier for exponential backoff
    pub backoff_multiplier: f64,

    /// Maximum delay between attempts (milliseconds)
    pub max_delay_ms: u64,

    /// Whether to add jitter to prevent thundering herd
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            initial_delay_ms: 1000,
            backoff_multiplier: 2.0,
            max_delay_ms: 30000,
            jitter: true,
        }
    }
}

impl RetryConfig {
    /// Create a config that never retries
    pub fn no_retry() -> Self {
        Self {
            max_attempts: 1,
            ..Default::default()
        }
    }
}

/// Calculate the backoff delay for a given attempt (1-indexed).
///
/// `min(initial × multiplier^(n−1), max)`, jittered by ±10% of the capped
/// value when enabled.
pub fn calculate_delay(attempt: u32, config: &RetryConfig) -> Duration {
    let exponential = config.initial_delay_ms as f64
        * config
            .backoff_multiplier
            .powi(attempt.saturating_sub(1) as i32);

    let capped = exponential.min(config.max_delay_ms as f64);

    let final_delay = if config.jitter {
        // ±10% jitter (0.9 to 1.1)
        let jitter_factor = 0.9 + rand_jitter() * 0.2;
        capped * jitter_factor
    } else {
        capped
    };

    Duration::from_millis(final_delay.round() as u64)
}

/// Simple pseudo-random jitter (0.0 to 1.0)
fn rand_jitter() -> f64 {
    use std::time::SystemTime;
    let nanos = SystemTime::now()
        .duration_since(SystemTime::UNIX_EPOCH)
        .unwrap_or_default()
        .subsec_nanos();
    (nanos % 1000) as f64 / 1000.0
}

/// Error classification for retry decisions
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClassification {
    /// Should retry (transient error)
    Retry,

    /// Should not retry (permanent error)
    NoRetry,

    /// Rate limited - never wait shorter than the vendor hint
    RateLimited { retry_after_ms: Option<u64> },
}

/// Trait for errors that can be classified for retry
pub trait RetryableError {
    fn classify(&self) -> RetryClassification;
}

/// Execute an async operation with retry logic.
///
/// Fatal errors are returned immediately. After `max_attempts` the last
/// error is returned unchanged so callers can still match on its kind.
pub async fn retry_with_backoff<T, E, F, Fut>(
    config: &RetryConfig,
    operation_name: &str,
    operation: F,
) -> Result<T, E>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
{
    retry_with_backoff_observed(config, operation_name, |_, _, _| {}, operation).await
}

/// [`retry_with_backoff`] with an observer hook.
///
/// `on_retry(error, attempt, delay)` fires before each wait, for logging
/// and telemetry only; it cannot affect control flow.
pub async fn retry_with_backoff_observed<T, E, F, Fut, O>(
    config: &RetryConfig,
    operation_name: &str,
    on_retry: O,
    mut operation: F,
) -> Result<T, E>
where
    E: RetryableError + std::fmt::Display,
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T, E>>,
    O: Fn(&E, u32, Duration),
{
    let max_attempts = config.max_attempts.max(1);

    for attempt in 1..=max_attempts {
        match operation().await {
            Ok(result) => return Ok(result),
            Err(e) => {
                let classification = e.classify();

                if classification == RetryClassification::NoRetry {
                    debug!(
                        "{}: non-retryable error on attempt {}: {}",
                        operation_name, attempt, e
                    );
                    return Err(e);
                }

                if attempt >= max_attempts {
                    warn!(
                        "{}: max attempts ({}) exhausted: {}",
                        operation_name, max_attempts, e
                    );
                    return Err(e);
                }

                let mut delay = calculate_delay(attempt, config);

                // A vendor retry hint is a floor, never a shortcut
                if let RetryClassification::RateLimited {
                    retry_after_ms: Some(ms),
                } = classification
                {
                    delay = delay.max(Duration::from_millis(ms));
                }

                warn!(
                    "{}: attempt {} failed, retrying in {:?}: {}",
                    operation_name, attempt, delay, e
                );

                on_retry(&e, attempt, delay);
                sleep(delay).await;
            }
        }
    }

    unreachable!("retry loop always returns from within");
}
