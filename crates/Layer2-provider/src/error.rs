//! Provider-specific error types
//!
//! ProviderError carries the vendor-facing failure detail; the retry layer
//! consumes its [`RetryableError`] classification, and callers above the
//! provider layer see it converted into `tether_foundation::Error`.

use crate::retry::{RetryClassification, RetryableError};
use tether_foundation::Error as FoundationError;
use thiserror::Error;

/// Errors that can occur during provider operations
#[derive(Error, Debug, Clone)]
pub enum ProviderError {
    /// API key is missing or invalid
    #[error("Authentication failed: {0}")]
    Authentication(String),

    /// Rate limit exceeded, optionally with a vendor retry hint
    #[error("Rate limit exceeded{}", .retry_after_ms.map(|ms| format!(", retry after {}ms", ms)).unwrap_or_default())]
    RateLimited { retry_after_ms: Option<u64> },

    /// Server error (5xx)
    #[error("Server error: {0}")]
    ServerError(String),

    /// Request failed before a response arrived (transport-level)
    #[error("Request failed: {0}")]
    RequestFailed(String),

    /// Network error (connection failed, DNS, etc.)
    #[error("Network error: {0}")]
    Network(String),

    /// Request exceeded its bounded timeout
    #[error("Timeout: {0}")]
    Timeout(String),

    /// Invalid request (bad parameters)
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    /// Invalid response from API
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// Model not found or not available
    #[error("Model not available: {0}")]
    ModelNotAvailable(String),

    /// Streaming error
    #[error("Stream error: {0}")]
    StreamError(String),

    /// JSON parsing error
    #[error("Parse error: {0}")]
    ParseError(String),

    /// Provider not configured
    #[error("Provider not configured: {0}")]
    NotConfigured(String),

    /// Unknown error
    #[error("Unknown error: {0}")]
    Unknown(String),
}

impl RetryableError for ProviderError {
    fn classify(&self) -> RetryClassification {
        match self {
            // Rate limited - definitely retry, honoring the vendor hint
            ProviderError::RateLimited { retry_after_ms } => RetryClassification::RateLimited {
                retry_after_ms: *retry_after_ms,
            },

            // Transient transport and server conditions - retry
            ProviderError::ServerError(_)
            | ProviderError::RequestFailed(_)
            | ProviderError::Network(_)
            | ProviderError::Timeout(_)
            | ProviderError::StreamError(_) => RetryClassification::Retry,

            // Unclassified errors fall back to message-pattern matching
            ProviderError::Unknown(msg) => {
                if is_retryable_message(msg) {
                    RetryClassification::Retry
                } else {
                    RetryClassification::NoRetry
                }
            }

            // Everything else - don't retry
            ProviderError::Authentication(_)
            | ProviderError::InvalidRequest(_)
            | ProviderError::InvalidResponse(_)
            | ProviderError::ModelNotAvailable(_)
            | ProviderError::ParseError(_)
            | ProviderError::NotConfigured(_) => RetryClassification::NoRetry,
        }
    }
}

impl ProviderError {
    /// Create from HTTP status code and body
    pub fn from_http_status(status: u16, body: &str) -> Self {
        match status {
            401 | 403 => ProviderError::Authentication(body.to_string()),
            429 => ProviderError::RateLimited {
                retry_after_ms: extract_retry_after(body),
            },
            400 => ProviderError::InvalidRequest(body.to_string()),
            404 => ProviderError::ModelNotAvailable(body.to_string()),
            500..=599 => ProviderError::ServerError(body.to_string()),
            _ => ProviderError::Unknown(format!("HTTP {}: {}", status, body)),
        }
    }

    /// Create from a reqwest transport error
    pub fn from_transport(err: &reqwest::Error) -> Self {
        if err.is_timeout() {
            ProviderError::Timeout(err.to_string())
        } else if err.is_connect() {
            ProviderError::Network(err.to_string())
        } else {
            ProviderError::RequestFailed(err.to_string())
        }
    }
}

/// Message-pattern fallback for errors without structured classification.
///
/// Pure predicate: timeout, connection-reset/refused, DNS-not-found,
/// "socket hang up", rate-limit phrases, 429/5xx status text, and generic
/// "network"/"temporarily unavailable" phrases count as retryable.
pub fn is_retryable_message(message: &str) -> bool {
    let message = message.to_lowercase();
    const PATTERNS: &[&str] = &[
        "rate limit",
        "429",
        "500",
        "502",
        "503",
        "504",
        "timeout",
        "timed out",
        "econnreset",
        "econnrefused",
        "enotfound",
        "socket hang up",
        "network",
        "temporarily unavailable",
    ];
    PATTERNS.iter().any(|p| message.contains(p))
}

/// Try to extract retry-after value from error body (in milliseconds)
fn extract_retry_after(body: &str) -> Option<u64> {
    // Try to find retry_after in JSON
    if let Ok(json) = serde_json::from_str::<serde_json::Value>(body) {
        if let Some(secs) = json
            .get("error")
            .and_then(|e| e.get("retry_after"))
            .and_then(|v| v.as_f64())
        {
            return Some((secs * 1000.0) as u64);
        }
    }

    // Try to find in plain text
    if let Some(idx) = body.find("retry") {
        let after = &body[idx..];
        let num_str: String = after
            .chars()
            .skip_while(|c| !c.is_ascii_digit())
            .take_while(|c| c.is_ascii_digit() || *c == '.')
            .collect();

        if let Ok(secs) = num_str.parse::<f64>() {
            return Some((secs * 1000.0) as u64);
        }
    }

    None
}

impl From<ProviderError> for FoundationError {
    fn from(err: ProviderError) -> Self {
        match err {
            ProviderError::Authentication(msg) => FoundationError::Config(msg),
            ProviderError::RateLimited { retry_after_ms } => FoundationError::RateLimited(
                retry_after_ms
                    .map(|ms| format!("Retry after {}ms", ms))
                    .unwrap_or_else(|| "Rate limited".to_string()),
            ),
            ProviderError::ServerError(msg) => FoundationError::Api {
                provider: "unknown".to_string(),
                message: format!("Server error: {}", msg),
            },
            ProviderError::RequestFailed(msg) => FoundationError::Http(msg),
            ProviderError::Network(msg) => FoundationError::Http(format!("Network: {}", msg)),
            ProviderError::Timeout(msg) => FoundationError::Timeout(msg),
            ProviderError::InvalidRequest(msg) => FoundationError::InvalidInput(msg),
            ProviderError::InvalidResponse(msg) => {
                FoundationError::Provider(format!("Invalid response: {}", msg))
            }
            ProviderError::ModelNotAvailable(msg) => FoundationError::ProviderNotFound(msg),
            ProviderError::StreamError(msg) => FoundationError::Stream(msg),
            ProviderError::ParseError(msg) => {
                FoundationError::Provider(format!("Parse error: {}", msg))
            }
            ProviderError::NotConfigured(msg) => FoundationError::Config(msg),
            ProviderError::Unknown(msg) => FoundationError::Provider(msg),
        }
    }
}
