//! # tether-provider
//!
//! LLM provider abstraction layer for Tether.
//! Supports multiple providers with a unified interface.
//!
//! ## Features
//! - Streaming for real-time responses
//! - Automatic retry with exponential backoff
//! - Sliding-window rate limiting per provider identity
//! - Tool/function calling support with neutral schema translation

pub mod enrich;
pub mod error;
pub mod factory;
pub mod message;
pub mod providers;
pub mod ratelimit;
pub mod retry;
pub mod tool_def;
pub mod r#trait;
pub mod translate;

// Core traits and types
pub use message::{Message, MessageRole, ToolCall};
pub use r#trait::{
    ChatParams, ChatResponse, ChatWithToolsParams, ChatWithToolsResponse, ChunkStream,
    FinishReason, LlmPort, ProviderInfo, StreamChunk, TokenUsage, ToolChoice,
};
pub use tool_def::ToolDefinition;

// Error, retry and rate limiting
pub use error::ProviderError;
pub use ratelimit::{RateLimiter, RateLimiterConfig, RateLimiterRegistry, RateLimiterUsage};
pub use retry::{
    calculate_delay, retry_with_backoff, retry_with_backoff_observed, RetryClassification,
    RetryConfig, RetryableError,
};

// Schema translation and description enrichment
pub use enrich::{enrich_description_with_examples, format_examples_readable, validate_examples};
pub use translate::{to_gemini_schema, to_json_schema, GeminiSchema, GeminiType};

// Provider implementations and factory
pub use factory::{
    create_llm, create_llm_from_env, LlmProvider, DEFAULT_CLAUDE_MODEL, DEFAULT_GEMINI_MODEL,
};
pub use providers::claude::{ClaudeAdapter, ClaudeAdapterConfig};
pub use providers::gemini::{GeminiAdapter, GeminiAdapterConfig};
