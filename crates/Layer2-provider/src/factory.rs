//! Adapter factory - selects and constructs the configured provider
//!
//! The provider set is a closed enum resolved once at construction time;
//! everything above this point depends only on [`LlmPort`].

use crate::{
    providers::{ClaudeAdapter, ClaudeAdapterConfig, GeminiAdapter, GeminiAdapterConfig},
    ratelimit::RateLimiterRegistry,
    retry::RetryConfig,
    r#trait::LlmPort,
};
use std::sync::Arc;
use tether_foundation::{Error, LlmSettings, Result};

/// Default model per provider
pub const DEFAULT_CLAUDE_MODEL: &str = "claude-sonnet-4-5-20250929";
pub const DEFAULT_GEMINI_MODEL: &str = "gemini-2.5-flash";

/// Supported LLM providers
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LlmProvider {
    Claude,
    Gemini,
}

impl LlmProvider {
    /// Provider identity string, also the rate-limiter key
    pub fn id(&self) -> &'static str {
        match self {
            LlmProvider::Claude => "claude",
            LlmProvider::Gemini => "gemini",
        }
    }

    fn default_model(&self) -> &'static str {
        match self {
            LlmProvider::Claude => DEFAULT_CLAUDE_MODEL,
            LlmProvider::Gemini => DEFAULT_GEMINI_MODEL,
        }
    }
}

impl std::str::FromStr for LlmProvider {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "claude" => Ok(LlmProvider::Claude),
            "gemini" => Ok(LlmProvider::Gemini),
            other => Err(Error::Config(format!(
                "Unsupported LLM provider: {}",
                other
            ))),
        }
    }
}

/// Create an LLM adapter from settings, wiring the rate limiter for the
/// provider identity out of the given registry.
///
/// Fails fast with a configuration error on a missing credential or an
/// unsupported provider selection.
pub fn create_llm(
    settings: &LlmSettings,
    registry: &RateLimiterRegistry,
) -> Result<Arc<dyn LlmPort>> {
    let provider: LlmProvider = settings.provider.parse()?;

    if settings.api_key.is_empty() {
        return Err(Error::Config(format!(
            "API key is required for provider: {}",
            provider.id()
        )));
    }

    let model = settings
        .model
        .clone()
        .unwrap_or_else(|| provider.default_model().to_string());
    let rate_limiter = settings
        .rate_limiting
        .then(|| registry.get_or_create(provider.id(), None));
    let retry = settings.retries.then(RetryConfig::default);

    let adapter: Arc<dyn LlmPort> = match provider {
        LlmProvider::Claude => {
            let mut config = ClaudeAdapterConfig::new(settings.api_key.clone(), model);
            if let Some(max_tokens) = settings.max_tokens {
                config.default_max_tokens = max_tokens;
            }
            config.rate_limiter = rate_limiter;
            config.retry = retry;
            Arc::new(ClaudeAdapter::new(config)?)
        }
        LlmProvider::Gemini => {
            let mut config = GeminiAdapterConfig::new(settings.api_key.clone(), model);
            if let Some(max_tokens) = settings.max_tokens {
                config.default_max_tokens = max_tokens;
            }
            config.rate_limiter = rate_limiter;
            config.retry = retry;
            Arc::new(GeminiAdapter::new(config)?)
        }
    };

    Ok(adapter)
}

/// Create an LLM adapter from environment variables.
///
/// Reads `LLM_PROVIDER` (default "gemini"), the matching API key variable,
/// and `LLM_MODEL`. Uses a private rate-limiter registry; compose with
/// [`create_llm`] directly to share limiters across adapters.
pub fn create_llm_from_env() -> Result<Arc<dyn LlmPort>> {
    let settings = LlmSettings::from_env()?;
    create_llm(&settings, &RateLimiterRegistry::new())
}
