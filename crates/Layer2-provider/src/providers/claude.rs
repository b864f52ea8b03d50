//! Claude provider adapter with SSE streaming
//!
//! Tool schemas are sent as JSON Schema; input examples use the native
//! `input_examples` field, so no description enrichment is needed here.

use crate::{
    error::ProviderError,
    ratelimit::RateLimiter,
    retry::{retry_with_backoff, RetryConfig},
    r#trait::{
        ChatParams, ChatResponse, ChatWithToolsParams, ChatWithToolsResponse, ChunkStream,
        FinishReason, LlmPort, ProviderInfo, StreamChunk, TokenUsage, ToolChoice,
    },
    translate::to_json_schema,
    Message, MessageRole, ToolCall, ToolDefinition,
};
use async_trait::async_trait;
use futures::StreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tether_foundation::Error as FoundationError;

const CLAUDE_API_URL: &str = "https://api.anthropic.com/v1/messages";
const ANTHROPIC_VERSION: &str = "2023-06-01";
// input_examples on tools is only accepted behind this beta flag
const TOOL_USE_BETA: &str = "advanced-tool-use-2025-11-20";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Configuration for the Claude adapter
pub struct ClaudeAdapterConfig {
    /// Anthropic API key
    pub api_key: String,

    /// Model to use (e.g. "claude-sonnet-4-5-20250929")
    pub model: String,

    /// Default max tokens for responses
    pub default_max_tokens: u32,

    /// Rate limiter for this provider identity, if limiting is enabled
    pub rate_limiter: Option<Arc<RateLimiter>>,

    /// Retry policy; `None` disables retries
    pub retry: Option<RetryConfig>,

    /// Bounded timeout per HTTP request, independent of retry backoff
    pub timeout: Duration,
}

impl ClaudeAdapterConfig {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            default_max_tokens: DEFAULT_MAX_TOKENS,
            rate_limiter: None,
            retry: Some(RetryConfig::default()),
            timeout: Duration::from_secs(DEFAULT_TIMEOUT_SECS),
        }
    }
}

/// Claude adapter implementing [`LlmPort`]
pub struct ClaudeAdapter {
    client: Client,
    api_key: String,
    model: String,
    default_max_tokens: u32,
    rate_limiter: Option<Arc<RateLimiter>>,
    retry: Option<RetryConfig>,
}

impl ClaudeAdapter {
    /// Create a new Claude adapter.
    ///
    /// Fails fast with a configuration error when the credential is absent.
    pub fn new(config: ClaudeAdapterConfig) -> Result<Self, FoundationError> {
        if config.api_key.is_empty() {
            return Err(FoundationError::Config(
                "Anthropic API key is required".to_string(),
            ));
        }

        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| FoundationError::Http(e.to_string()))?;

        Ok(Self {
            client,
            api_key: config.api_key,
            model: config.model,
            default_max_tokens: config.default_max_tokens,
            rate_limiter: config.rate_limiter,
            retry: config.retry,
        })
    }

    fn max_tokens(&self, params: &ChatParams) -> u32 {
        params.max_tokens.unwrap_or(self.default_max_tokens)
    }

    /// Prompt-length heuristic: ~4 chars per token, plus the output budget
    fn estimate_tokens(&self, params: &ChatParams) -> u64 {
        let mut chars = params.system_prompt.as_ref().map_or(0, |s| s.len());
        for message in &params.messages {
            chars += message.content.len();
        }
        (chars as u64).div_ceil(4) + u64::from(self.max_tokens(params))
    }

    fn build_request(
        &self,
        params: &ChatParams,
        tools: &[ToolDefinition],
        tool_choice: Option<&ToolChoice>,
        stream: bool,
    ) -> ClaudeRequest {
        let messages: Vec<ClaudeMessage> = params
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(ClaudeMessage::from)
            .collect();

        let api_tools: Vec<ClaudeTool> = tools.iter().map(ClaudeTool::from).collect();
        let tool_choice = (!api_tools.is_empty()).then(|| map_tool_choice(tool_choice));

        ClaudeRequest {
            model: self.model.clone(),
            max_tokens: self.max_tokens(params),
            system: params.system_prompt.clone(),
            messages,
            temperature: params.temperature,
            tools: (!api_tools.is_empty()).then_some(api_tools),
            tool_choice,
            stream,
        }
    }

    async fn admit(&self, estimated_tokens: u64) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.check_and_wait(estimated_tokens).await;
        }
    }

    async fn record_usage(&self, usage: TokenUsage) {
        if let Some(limiter) = &self.rate_limiter {
            limiter.record_actual_usage(u64::from(usage.total())).await;
        }
    }

    async fn send(&self, request: &ClaudeRequest) -> Result<reqwest::Response, ProviderError> {
        let mut builder = self
            .client
            .post(CLAUDE_API_URL)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", ANTHROPIC_VERSION)
            .header("content-type", "application/json");

        let has_examples = request
            .tools
            .as_ref()
            .is_some_and(|tools| tools.iter().any(|t| t.input_examples.is_some()));
        if has_examples {
            builder = builder.header("anthropic-beta", TOOL_USE_BETA);
        }

        let response = builder
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        let status = response.status().as_u16();
        if status != 200 {
            let body = response.text().await.unwrap_or_default();
            return Err(ProviderError::from_http_status(status, &body));
        }

        Ok(response)
    }

    /// Rate-limit admission + request + parse, as one retryable unit
    async fn round_trip(
        &self,
        request: &ClaudeRequest,
        estimated_tokens: u64,
    ) -> Result<ClaudeApiResponse, ProviderError> {
        self.admit(estimated_tokens).await;
        let response = self.send(request).await?;
        response
            .json::<ClaudeApiResponse>()
            .await
            .map_err(|e| ProviderError::ParseError(e.to_string()))
    }

    async fn execute(
        &self,
        operation_name: &str,
        request: &ClaudeRequest,
        estimated_tokens: u64,
    ) -> Result<ClaudeApiResponse, ProviderError> {
        let api_response = match &self.retry {
            Some(config) => {
                retry_with_backoff(config, operation_name, || {
                    self.round_trip(request, estimated_tokens)
                })
                .await?
            }
            None => self.round_trip(request, estimated_tokens).await?,
        };

        self.record_usage(TokenUsage::new(
            api_response.usage.input_tokens,
            api_response.usage.output_tokens,
        ))
        .await;

        Ok(api_response)
    }

    fn extract(api_response: ClaudeApiResponse) -> (String, Vec<ToolCall>, TokenUsage, FinishReason) {
        let mut content = String::new();
        let mut tool_calls = Vec::new();

        for block in api_response.content {
            match block {
                ContentBlock::Text { text } => content.push_str(&text),
                ContentBlock::ToolUse { id, name, input } => {
                    tool_calls.push(ToolCall::new(id, name, input));
                }
                ContentBlock::ToolResult { .. } => {}
            }
        }

        let usage = TokenUsage::new(
            api_response.usage.input_tokens,
            api_response.usage.output_tokens,
        );
        let finish_reason = map_finish_reason(api_response.stop_reason.as_deref());

        (content, tool_calls, usage, finish_reason)
    }

    fn parse_sse_line(line: &str) -> Option<ClaudeStreamEvent> {
        let data = line.strip_prefix("data: ")?;
        if data == "[DONE]" {
            return None;
        }
        serde_json::from_str(data).ok()
    }

    fn stream_request(&self, request: ClaudeRequest, estimated_tokens: u64) -> ChunkStream<'_> {
        Box::pin(async_stream::stream! {
            self.admit(estimated_tokens).await;

            let response = match self.send(&request).await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut byte_stream = response.bytes_stream();
            let mut buffer = String::new();
            let mut partial_calls: Vec<PartialToolCall> = Vec::new();

            while let Some(chunk_result) = byte_stream.next().await {
                let chunk = match chunk_result {
                    Ok(c) => c,
                    Err(e) => {
                        yield Err(ProviderError::StreamError(e.to_string()));
                        return;
                    }
                };

                buffer.push_str(&String::from_utf8_lossy(&chunk));

                // Process complete lines
                while let Some(newline_pos) = buffer.find('\n') {
                    let line = buffer[..newline_pos].trim().to_string();
                    buffer = buffer[newline_pos + 1..].to_string();

                    if line.is_empty() {
                        continue;
                    }

                    let Some(event) = Self::parse_sse_line(&line) else {
                        continue;
                    };

                    match event {
                        ClaudeStreamEvent::ContentBlockStart { index, content_block } => {
                            if let ContentBlock::ToolUse { id, name, .. } = content_block {
                                while partial_calls.len() <= index {
                                    partial_calls.push(PartialToolCall::default());
                                }
                                partial_calls[index] = PartialToolCall {
                                    id,
                                    name,
                                    arguments: String::new(),
                                };
                            }
                        }
                        ClaudeStreamEvent::ContentBlockDelta { index, delta } => match delta {
                            ContentDelta::TextDelta { text } => {
                                yield Ok(StreamChunk {
                                    content: text,
                                    done: false,
                                    tool_calls: vec![],
                                });
                            }
                            ContentDelta::InputJsonDelta { partial_json } => {
                                if let Some(partial) = partial_calls.get_mut(index) {
                                    partial.arguments.push_str(&partial_json);
                                }
                            }
                        },
                        ClaudeStreamEvent::MessageStop => {
                            let tool_calls = partial_calls
                                .iter()
                                .filter(|p| !p.id.is_empty())
                                .map(PartialToolCall::finish)
                                .collect();
                            yield Ok(StreamChunk {
                                content: String::new(),
                                done: true,
                                tool_calls,
                            });
                            return;
                        }
                        ClaudeStreamEvent::Error { error } => {
                            yield Err(ProviderError::StreamError(error.message));
                            return;
                        }
                        _ => {}
                    }
                }
            }

            // Stream ended without message_stop
            let tool_calls = partial_calls
                .iter()
                .filter(|p| !p.id.is_empty())
                .map(PartialToolCall::finish)
                .collect();
            yield Ok(StreamChunk {
                content: String::new(),
                done: true,
                tool_calls,
            });
        })
    }
}

#[async_trait]
impl LlmPort for ClaudeAdapter {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError> {
        let request = self.build_request(&params, &[], None, false);
        let estimated = self.estimate_tokens(&params);

        let api_response = self.execute("claude_chat", &request, estimated).await?;
        let (content, _, usage, finish_reason) = Self::extract(api_response);

        Ok(ChatResponse {
            content,
            usage,
            finish_reason,
        })
    }

    async fn chat_with_tools(
        &self,
        params: ChatWithToolsParams,
    ) -> Result<ChatWithToolsResponse, ProviderError> {
        let request = self.build_request(
            &params.chat,
            &params.tools,
            params.tool_choice.as_ref(),
            false,
        );
        let estimated = self.estimate_tokens(&params.chat);

        let api_response = self
            .execute("claude_chat_with_tools", &request, estimated)
            .await?;
        let (content, tool_calls, usage, finish_reason) = Self::extract(api_response);

        Ok(ChatWithToolsResponse {
            content,
            usage,
            finish_reason,
            tool_calls,
        })
    }

    fn stream(&self, params: ChatParams) -> ChunkStream<'_> {
        let request = self.build_request(&params, &[], None, true);
        let estimated = self.estimate_tokens(&params);
        self.stream_request(request, estimated)
    }

    fn stream_with_tools(&self, params: ChatWithToolsParams) -> ChunkStream<'_> {
        let request = self.build_request(
            &params.chat,
            &params.tools,
            params.tool_choice.as_ref(),
            true,
        );
        let estimated = self.estimate_tokens(&params.chat);
        self.stream_request(request, estimated)
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "claude".to_string(),
            model: self.model.clone(),
            version: ANTHROPIC_VERSION.to_string(),
            supports_tool_use: true,
            supports_streaming: true,
        }
    }
}

fn map_tool_choice(choice: Option<&ToolChoice>) -> ClaudeToolChoice {
    match choice {
        Some(ToolChoice::Tool(name)) => ClaudeToolChoice::Tool { name: name.clone() },
        Some(ToolChoice::Required) => ClaudeToolChoice::Any,
        // Claude has no "none" mode; auto is the closest
        Some(ToolChoice::None) | Some(ToolChoice::Auto) | None => ClaudeToolChoice::Auto,
    }
}

fn map_finish_reason(stop_reason: Option<&str>) -> FinishReason {
    match stop_reason {
        Some("end_turn") | Some("stop_sequence") => FinishReason::Stop,
        Some("max_tokens") => FinishReason::Length,
        Some("tool_use") => FinishReason::ToolCalls,
        _ => FinishReason::Stop,
    }
}

// Helper struct for assembling tool calls during streaming
#[derive(Default)]
struct PartialToolCall {
    id: String,
    name: String,
    arguments: String,
}

impl PartialToolCall {
    fn finish(&self) -> ToolCall {
        let arguments = serde_json::from_str(&self.arguments)
            .unwrap_or(serde_json::Value::Object(Default::default()));
        ToolCall::new(&self.id, &self.name, arguments)
    }
}

// ============================================================================
// Claude API Types
// ============================================================================

#[derive(Debug, Serialize)]
struct ClaudeRequest {
    model: String,
    max_tokens: u32,
    #[serde(skip_serializing_if = "Option::is_none")]
    system: Option<String>,
    messages: Vec<ClaudeMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<ClaudeTool>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_choice: Option<ClaudeToolChoice>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct ClaudeMessage {
    role: String,
    content: ClaudeContent,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum ClaudeContent {
    Text(String),
    Blocks(Vec<ContentBlock>),
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentBlock {
    #[serde(rename = "text")]
    Text { text: String },
    #[serde(rename = "tool_use")]
    ToolUse {
        id: String,
        name: String,
        input: serde_json::Value,
    },
    #[serde(rename = "tool_result")]
    ToolResult {
        tool_use_id: String,
        content: String,
    },
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(tag = "type")]
enum ContentDelta {
    #[serde(rename = "text_delta")]
    TextDelta { text: String },
    #[serde(rename = "input_json_delta")]
    InputJsonDelta { partial_json: String },
}

#[derive(Debug, Serialize)]
struct ClaudeTool {
    name: String,
    description: String,
    input_schema: serde_json::Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    input_examples: Option<Vec<serde_json::Value>>,
}

#[derive(Debug, Serialize)]
#[serde(tag = "type", rename_all = "lowercase")]
enum ClaudeToolChoice {
    Auto,
    Any,
    Tool { name: String },
}

#[derive(Debug, Deserialize)]
struct ClaudeApiResponse {
    content: Vec<ContentBlock>,
    stop_reason: Option<String>,
    usage: ClaudeUsage,
}

#[derive(Debug, Deserialize)]
struct ClaudeUsage {
    input_tokens: u32,
    output_tokens: u32,
}

// SSE event types
#[derive(Debug, Deserialize)]
#[serde(tag = "type")]
enum ClaudeStreamEvent {
    #[serde(rename = "message_start")]
    MessageStart,
    #[serde(rename = "content_block_start")]
    ContentBlockStart {
        index: usize,
        content_block: ContentBlock,
    },
    #[serde(rename = "content_block_delta")]
    ContentBlockDelta { index: usize, delta: ContentDelta },
    #[serde(rename = "content_block_stop")]
    ContentBlockStop { index: usize },
    #[serde(rename = "message_delta")]
    MessageDelta,
    #[serde(rename = "message_stop")]
    MessageStop,
    #[serde(rename = "ping")]
    Ping,
    #[serde(rename = "error")]
    Error { error: ErrorData },
}

#[derive(Debug, Deserialize)]
struct ErrorData {
    message: String,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&Message> for ClaudeMessage {
    fn from(msg: &Message) -> Self {
        // Tool results travel as user messages with a tool_result block
        if msg.role == MessageRole::Tool {
            return ClaudeMessage {
                role: "user".to_string(),
                content: ClaudeContent::Blocks(vec![ContentBlock::ToolResult {
                    tool_use_id: msg.tool_call_id.clone().unwrap_or_default(),
                    content: msg.content.clone(),
                }]),
            };
        }

        let role = match msg.role {
            MessageRole::Assistant => "assistant",
            _ => "user",
        };

        // Assistant messages with tool calls become content blocks
        if let Some(ref tool_calls) = msg.tool_calls {
            let mut blocks: Vec<ContentBlock> = vec![];

            if !msg.content.is_empty() {
                blocks.push(ContentBlock::Text {
                    text: msg.content.clone(),
                });
            }

            for tc in tool_calls {
                blocks.push(ContentBlock::ToolUse {
                    id: tc.id.clone(),
                    name: tc.name.clone(),
                    input: tc.arguments.clone(),
                });
            }

            return ClaudeMessage {
                role: role.to_string(),
                content: ClaudeContent::Blocks(blocks),
            };
        }

        ClaudeMessage {
            role: role.to_string(),
            content: ClaudeContent::Text(msg.content.clone()),
        }
    }
}

impl From<&ToolDefinition> for ClaudeTool {
    fn from(tool: &ToolDefinition) -> Self {
        ClaudeTool {
            name: tool.name.clone(),
            description: tool.description.clone(),
            input_schema: to_json_schema(&tool.parameters),
            input_examples: (!tool.examples.is_empty()).then(|| tool.examples.clone()),
        }
    }
}
