//! LLM port trait and common types
//!
//! Every provider adapter implements [`LlmPort`]; the tool loop only ever
//! depends on this trait, never on a concrete adapter.

use crate::error::ProviderError;
use crate::{Message, ToolCall, ToolDefinition};
use async_trait::async_trait;
use futures::Stream;
use serde::{Deserialize, Serialize};
use std::pin::Pin;

/// Token usage statistics for one round-trip
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenUsage {
    /// Number of input tokens
    pub input_tokens: u32,

    /// Number of output tokens
    pub output_tokens: u32,
}

impl TokenUsage {
    pub fn new(input_tokens: u32, output_tokens: u32) -> Self {
        Self {
            input_tokens,
            output_tokens,
        }
    }

    /// Combined input + output tokens
    pub fn total(&self) -> u32 {
        self.input_tokens + self.output_tokens
    }
}

/// Reason why the model stopped generating
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FinishReason {
    /// Completed naturally
    Stop,

    /// Hit max tokens limit
    Length,

    /// Tool use requested
    ToolCalls,

    /// Generation failed
    Error,
}

impl Default for FinishReason {
    fn default() -> Self {
        Self::Stop
    }
}

/// Tool choice mode for a request
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ToolChoice {
    /// The model decides whether to call a tool
    Auto,

    /// The model must call some tool
    Required,

    /// The model must not call any tool
    None,

    /// The model must call this specific tool (forced tool-choice)
    Tool(String),
}

/// Parameters for a chat completion request
#[derive(Debug, Clone, Default)]
pub struct ChatParams {
    /// Conversation messages
    pub messages: Vec<Message>,

    /// System prompt/instruction
    pub system_prompt: Option<String>,

    /// Temperature for response randomness (0-1)
    pub temperature: Option<f32>,

    /// Maximum tokens to generate
    pub max_tokens: Option<u32>,
}

impl ChatParams {
    pub fn new(messages: Vec<Message>) -> Self {
        Self {
            messages,
            ..Default::default()
        }
    }
}

/// Parameters for a chat completion request with tool use
#[derive(Debug, Clone, Default)]
pub struct ChatWithToolsParams {
    /// Base chat parameters
    pub chat: ChatParams,

    /// Available tools for the LLM to use
    pub tools: Vec<ToolDefinition>,

    /// Tool choice mode (defaults to auto)
    pub tool_choice: Option<ToolChoice>,
}

/// Response from a chat completion request
#[derive(Debug, Clone)]
pub struct ChatResponse {
    /// Generated text content
    pub content: String,

    /// Token usage statistics
    pub usage: TokenUsage,

    /// Reason for stopping
    pub finish_reason: FinishReason,
}

/// Response from a chat completion request with tools
#[derive(Debug, Clone)]
pub struct ChatWithToolsResponse {
    /// Generated text content
    pub content: String,

    /// Token usage statistics
    pub usage: TokenUsage,

    /// Reason for stopping
    pub finish_reason: FinishReason,

    /// Tool calls requested by the LLM, normalized to the neutral shape
    pub tool_calls: Vec<ToolCall>,
}

/// A chunk of streamed content
#[derive(Debug, Clone, Default)]
pub struct StreamChunk {
    /// Text content in this chunk
    pub content: String,

    /// Whether this is the final chunk
    pub done: bool,

    /// Tool calls (delivered with the final chunk if present)
    pub tool_calls: Vec<ToolCall>,
}

/// Information about the LLM provider behind the port
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProviderInfo {
    /// Provider name (e.g. "claude")
    pub name: String,

    /// Model being used
    pub model: String,

    /// API version string
    pub version: String,

    /// Whether provider supports tool use
    pub supports_tool_use: bool,

    /// Whether provider supports streaming
    pub supports_streaming: bool,
}

/// Boxed stream of chunks returned by the streaming endpoints
pub type ChunkStream<'a> =
    Pin<Box<dyn Stream<Item = Result<StreamChunk, ProviderError>> + Send + 'a>>;

/// Port interface for LLM providers
///
/// Implement this trait to add support for a new LLM provider.
#[async_trait]
pub trait LlmPort: Send + Sync {
    /// Send a chat completion request
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError>;

    /// Send a chat completion request with tool use support
    async fn chat_with_tools(
        &self,
        params: ChatWithToolsParams,
    ) -> Result<ChatWithToolsResponse, ProviderError>;

    /// Send a streaming chat completion request
    fn stream(&self, params: ChatParams) -> ChunkStream<'_>;

    /// Send a streaming chat completion request with tool use support
    fn stream_with_tools(&self, params: ChatWithToolsParams) -> ChunkStream<'_>;

    /// Get information about the provider
    fn info(&self) -> ProviderInfo;
}
