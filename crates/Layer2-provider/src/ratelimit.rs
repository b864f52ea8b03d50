//! Sliding-window rate limiter for LLM API calls
//!
//! Tracks requests-per-minute and tokens-per-minute over a trailing 60s
//! window. Admission uses an estimated token cost; once the real usage is
//! known it overwrites the estimate so the window stays accurate without
//! re-running admission control.

use std::collections::{HashMap, VecDeque};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::debug;

/// Length of the sliding window
const WINDOW: Duration = Duration::from_secs(60);

/// Configuration for the rate limiter
#[derive(Debug, Clone, Copy)]
pub struct RateLimiterConfig {
    /// Maximum requests per minute
    pub max_requests_per_minute: usize,

    /// Maximum tokens per minute
    pub max_tokens_per_minute: u64,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        // Conservative defaults for free-tier quotas
        Self {
            max_requests_per_minute: 60,
            max_tokens_per_minute: 100_000,
        }
    }
}

/// Point-in-time usage or remaining-capacity snapshot
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterUsage {
    pub requests: usize,
    pub tokens: u64,
}

#[derive(Debug)]
struct TokenEntry {
    at: Instant,
    tokens: u64,
}

#[derive(Debug, Default)]
struct Ledgers {
    requests: VecDeque<Instant>,
    tokens: VecDeque<TokenEntry>,
}

impl Ledgers {
    fn prune(&mut self, now: Instant) {
        let cutoff = now.checked_sub(WINDOW);
        let Some(cutoff) = cutoff else {
            return;
        };
        while self.requests.front().is_some_and(|t| *t <= cutoff) {
            self.requests.pop_front();
        }
        while self.tokens.front().is_some_and(|e| e.at <= cutoff) {
            self.tokens.pop_front();
        }
    }

    fn token_sum(&self) -> u64 {
        self.tokens.iter().map(|e| e.tokens).sum()
    }
}

/// Sliding-window limiter over requests/minute and tokens/minute.
///
/// Safe for concurrent use from many conversations hitting the same
/// provider; the ledgers sit behind one async mutex that is never held
/// across a sleep.
#[derive(Debug)]
pub struct RateLimiter {
    config: RateLimiterConfig,
    ledgers: Mutex<Ledgers>,
}

impl RateLimiter {
    /// Create a limiter with the given config
    pub fn new(config: RateLimiterConfig) -> Self {
        Self {
            config,
            ledgers: Mutex::new(Ledgers::default()),
        }
    }

    /// Check rate limits and wait until the request may proceed.
    ///
    /// Both the request-count and token-budget constraints must clear
    /// independently; after any wait the whole check re-runs, because
    /// capacity freed on one axis may still be constrained on the other.
    /// The request and its estimated tokens are recorded only once both
    /// checks pass.
    pub async fn check_and_wait(&self, estimated_tokens: u64) {
        loop {
            let wait = {
                let mut ledgers = self.ledgers.lock().await;
                let now = Instant::now();
                ledgers.prune(now);

                if ledgers.requests.len() >= self.config.max_requests_per_minute {
                    ledgers
                        .requests
                        .front()
                        .map(|oldest| (*oldest + WINDOW).saturating_duration_since(now))
                } else if ledgers.token_sum() + estimated_tokens > self.config.max_tokens_per_minute
                {
                    ledgers
                        .tokens
                        .front()
                        .map(|oldest| (oldest.at + WINDOW).saturating_duration_since(now))
                } else {
                    ledgers.requests.push_back(now);
                    ledgers.tokens.push_back(TokenEntry {
                        at: now,
                        tokens: estimated_tokens,
                    });
                    None
                }
            };

            match wait {
                // Lock released before sleeping so other callers can check
                Some(delay) => {
                    debug!("rate limit reached, waiting {:?}", delay);
                    tokio::time::sleep(delay).await;
                }
                None => return,
            }
        }
    }

    /// Record actual token usage after a request completes.
    ///
    /// Overwrites the most recently recorded estimate with the real count.
    pub async fn record_actual_usage(&self, tokens: u64) {
        let mut ledgers = self.ledgers.lock().await;
        if let Some(last) = ledgers.tokens.back_mut() {
            last.tokens = tokens;
        }
    }

    /// Current usage within the window (read-only, prunes first)
    pub async fn usage(&self) -> RateLimiterUsage {
        let mut ledgers = self.ledgers.lock().await;
        ledgers.prune(Instant::now());
        RateLimiterUsage {
            requests: ledgers.requests.len(),
            tokens: ledgers.token_sum(),
        }
    }

    /// Remaining capacity within the window
    pub async fn remaining(&self) -> RateLimiterUsage {
        let usage = self.usage().await;
        RateLimiterUsage {
            requests: self
                .config
                .max_requests_per_minute
                .saturating_sub(usage.requests),
            tokens: self
                .config
                .max_tokens_per_minute
                .saturating_sub(usage.tokens),
        }
    }

    /// Clear all ledgers (test isolation and forced recovery)
    pub async fn reset(&self) {
        let mut ledgers = self.ledgers.lock().await;
        ledgers.requests.clear();
        ledgers.tokens.clear();
    }
}

/// One limiter per provider identity, created on first use.
///
/// Owned by the composition root and injected into adapters; there is no
/// ambient global map.
#[derive(Debug, Default)]
pub struct RateLimiterRegistry {
    limiters: std::sync::Mutex<HashMap<String, Arc<RateLimiter>>>,
}

impl RateLimiterRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Get or create the limiter for a provider identity
    pub fn get_or_create(
        &self,
        provider: &str,
        config: Option<RateLimiterConfig>,
    ) -> Arc<RateLimiter> {
        let mut limiters = self.limiters.lock().expect("rate limiter registry poisoned");
        limiters
            .entry(provider.to_string())
            .or_insert_with(|| Arc::new(RateLimiter::new(config.unwrap_or_default())))
            .clone()
    }

    /// Reset every registered limiter and forget them
    pub async fn reset_all(&self) {
        let limiters: Vec<Arc<RateLimiter>> = {
            let mut map = self.limiters.lock().expect("rate limiter registry poisoned");
            map.drain().map(|(_, limiter)| limiter).collect()
        };
        for limiter in limiters {
            limiter.reset().await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_config() -> RateLimiterConfig {
        RateLimiterConfig {
            max_requests_per_minute: 2,
            max_tokens_per_minute: 1000,
        }
    }

    #[tokio::test]
    async fn test_allows_requests_within_limits() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        limiter.check_and_wait(100).await;
        limiter.check_and_wait(100).await;

        let usage = limiter.usage().await;
        assert_eq!(usage.requests, 2);
        assert_eq!(usage.tokens, 200);
    }

    #[tokio::test]
    async fn test_record_actual_overwrites_estimate() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        limiter.check_and_wait(1000).await;
        limiter.record_actual_usage(850).await;

        let usage = limiter.usage().await;
        assert_eq!(usage.tokens, 850);
    }

    #[tokio::test]
    async fn test_record_actual_without_entries_is_noop() {
        let limiter = RateLimiter::new(RateLimiterConfig::default());
        limiter.record_actual_usage(500).await;
        assert_eq!(limiter.usage().await.tokens, 0);
    }

    #[tokio::test]
    async fn test_remaining_never_negative() {
        let limiter = RateLimiter::new(small_config());
        limiter.check_and_wait(900).await;
        limiter.record_actual_usage(1500).await;

        let remaining = limiter.remaining().await;
        assert_eq!(remaining.tokens, 0);
        assert_eq!(remaining.requests, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_request_limit_blocks_until_window_frees() {
        let limiter = Arc::new(RateLimiter::new(small_config()));
        limiter.check_and_wait(10).await;
        limiter.check_and_wait(10).await;

        // The third call must not return before the oldest request exits
        // the 60s window.
        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check_and_wait(10).await })
        };

        tokio::time::advance(Duration::from_secs(30)).await;
        assert!(!waiter.is_finished());

        tokio::time::advance(Duration::from_secs(31)).await;
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter should finish after the window elapses")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_token_budget_blocks_independently_of_requests() {
        let limiter = Arc::new(RateLimiter::new(RateLimiterConfig {
            max_requests_per_minute: 100,
            max_tokens_per_minute: 500,
        }));
        limiter.check_and_wait(400).await;

        let waiter = {
            let limiter = limiter.clone();
            tokio::spawn(async move { limiter.check_and_wait(200).await })
        };

        tokio::time::advance(Duration::from_secs(10)).await;
        assert!(!waiter.is_finished());

        tokio::time::advance(Duration::from_secs(51)).await;
        tokio::time::timeout(Duration::from_secs(5), waiter)
            .await
            .expect("waiter should finish after the token window frees")
            .unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn test_usage_zero_after_window_elapses() {
        let limiter = RateLimiter::new(small_config());
        limiter.check_and_wait(100).await;

        tokio::time::advance(Duration::from_secs(61)).await;
        let usage = limiter.usage().await;
        assert_eq!(usage.requests, 0);
        assert_eq!(usage.tokens, 0);
    }

    #[tokio::test]
    async fn test_reset_clears_ledgers() {
        let limiter = RateLimiter::new(small_config());
        limiter.check_and_wait(500).await;
        limiter.reset().await;

        let usage = limiter.usage().await;
        assert_eq!(usage.requests, 0);
        assert_eq!(usage.tokens, 0);
    }

    #[tokio::test]
    async fn test_registry_returns_same_instance_per_key() {
        let registry = RateLimiterRegistry::new();
        let a = registry.get_or_create("claude", None);
        let b = registry.get_or_create("claude", None);
        let c = registry.get_or_create("gemini", None);

        assert!(Arc::ptr_eq(&a, &b));
        assert!(!Arc::ptr_eq(&a, &c));
    }

    #[tokio::test]
    async fn test_registry_reset_all() {
        let registry = RateLimiterRegistry::new();
        let limiter = registry.get_or_create("claude", None);
        limiter.check_and_wait(100).await;

        registry.reset_all().await;
        assert_eq!(limiter.usage().await.requests, 0);

        // A fresh limiter is created after reset_all
        let again = registry.get_or_create("claude", None);
        assert!(!Arc::ptr_eq(&limiter, &again));
    }
}
