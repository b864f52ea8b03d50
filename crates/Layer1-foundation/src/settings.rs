//! Environment-driven LLM settings
//!
//! Adapter construction is configured entirely from the environment: which
//! provider to use, its credential, and optional overrides. Validation of
//! the provider value itself happens in the provider layer's factory; this
//! module only resolves and checks presence of the credential.

use crate::error::{Error, Result};

/// Provider selection key (`claude` | `gemini`)
pub const ENV_LLM_PROVIDER: &str = "LLM_PROVIDER";

/// API key for the Claude provider
pub const ENV_ANTHROPIC_API_KEY: &str = "ANTHROPIC_API_KEY";

/// API key for the Gemini provider
pub const ENV_GEMINI_API_KEY: &str = "GEMINI_API_KEY";

/// Optional model override
pub const ENV_LLM_MODEL: &str = "LLM_MODEL";

/// Resolved LLM configuration
#[derive(Debug, Clone)]
pub struct LlmSettings {
    /// Provider selection key (e.g. "claude", "gemini")
    pub provider: String,

    /// API credential for the selected provider
    pub api_key: String,

    /// Model override; the factory falls back to a per-provider default
    pub model: Option<String>,

    /// Default max output tokens per response
    pub max_tokens: Option<u32>,

    /// Whether adapters gate calls through the rate limiter
    pub rate_limiting: bool,

    /// Whether adapters retry transient failures
    pub retries: bool,
}

impl LlmSettings {
    /// Create settings with an explicit provider and credential
    pub fn new(provider: impl Into<String>, api_key: impl Into<String>) -> Self {
        Self {
            provider: provider.into(),
            api_key: api_key.into(),
            model: None,
            max_tokens: None,
            rate_limiting: true,
            retries: true,
        }
    }

    /// Set a model override
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set default max output tokens
    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    /// Disable rate limiting for this adapter
    pub fn without_rate_limiting(mut self) -> Self {
        self.rate_limiting = false;
        self
    }

    /// Disable retries for this adapter
    pub fn without_retries(mut self) -> Self {
        self.retries = false;
        self
    }

    /// Load settings from the environment.
    ///
    /// Reads `LLM_PROVIDER` (default "gemini"), the matching API key
    /// variable, and `LLM_MODEL`. A missing credential is a fatal
    /// configuration error.
    pub fn from_env() -> Result<Self> {
        let provider = std::env::var(ENV_LLM_PROVIDER).unwrap_or_else(|_| "gemini".to_string());

        let key_var = match provider.as_str() {
            "claude" => ENV_ANTHROPIC_API_KEY,
            "gemini" => ENV_GEMINI_API_KEY,
            other => {
                return Err(Error::Config(format!(
                    "Invalid {} value: {}. Must be 'claude' or 'gemini'",
                    ENV_LLM_PROVIDER, other
                )))
            }
        };

        let api_key = std::env::var(key_var).ok().filter(|k| !k.is_empty());
        let api_key = api_key.ok_or_else(|| {
            Error::Config(format!(
                "Missing {} environment variable for {} provider",
                key_var, provider
            ))
        })?;

        let mut settings = Self::new(provider, api_key);
        if let Ok(model) = std::env::var(ENV_LLM_MODEL) {
            if !model.is_empty() {
                settings.model = Some(model);
            }
        }
        Ok(settings)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_builder_defaults() {
        let settings = LlmSettings::new("claude", "sk-test");
        assert_eq!(settings.provider, "claude");
        assert!(settings.rate_limiting);
        assert!(settings.retries);
        assert!(settings.model.is_none());
    }

    #[test]
    fn test_builder_overrides() {
        let settings = LlmSettings::new("gemini", "key")
            .with_model("gemini-2.5-flash")
            .with_max_tokens(2048)
            .without_retries();
        assert_eq!(settings.model.as_deref(), Some("gemini-2.5-flash"));
        assert_eq!(settings.max_tokens, Some(2048));
        assert!(!settings.retries);
        assert!(settings.rate_limiting);
    }
}
