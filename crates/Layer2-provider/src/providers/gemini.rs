//! Google Gemini provider adapter with streaming support
//!
//! Gemini has no native input-examples field, so examples are folded into
//! tool descriptions before translation. Tool-call ids are synthesized
//! (`call_{n}`) because the API does not assign any.

use crate::{
    enrich::enrich_description_with_examples,
    error::ProviderError,
    ratelimit::RateLimiter,
    retry::{retry_with_backoff, RetryConfig},
    r#trait::{
        ChatParams, ChatResponse, ChatWithToolsParams, ChatWithToolsResponse, ChunkStream,
        FinishReason, LlmPort, ProviderInfo, StreamChunk, TokenUsage, ToolChoice,
    },
    translate::{to_gemini_schema, GeminiSchema},
    Message, MessageRole, ToolCall, ToolDefinition,
};
use async_trait::async_trait;
use futures::TryStreamExt;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;
use tether_foundation::Error as FoundationError;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::io::StreamReader;

const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com/v1beta";
const API_VERSION: &str = "v1beta";
const DEFAULT_TIMEOUT_SECS: u64 = 120;
const DEFAULT_MAX_TOKENS: u32 = 4096;

/// Configuration for the Gemini adapter
pub struct GeminiAdapterConfig {
    /// Google AI API key
    pub api_key: String,

    /// Model to use (e.g. "gemini-2.5-flash")
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

impl GeminiAdapterConfig {
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

/// Gemini adapter implementing [`LlmPort`]
pub struct GeminiAdapter {
    client: Client,
    api_key: String,
    model: String,
    default_max_tokens: u32,
    rate_limiter: Option<Arc<RateLimiter>>,
    retry: Option<RetryConfig>,
    base_url: String,
}

impl GeminiAdapter {
    /// Create a new Gemini adapter.
    ///
    /// Fails fast with a configuration error when the credential is absent.
    pub fn new(config: GeminiAdapterConfig) -> Result<Self, FoundationError> {
        if config.api_key.is_empty() {
            return Err(FoundationError::Config(
                "Gemini API key is required".to_string(),
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
            base_url: DEFAULT_BASE_URL.to_string(),
        })
    }

    fn generate_url(&self, stream: bool) -> String {
        let action = if stream {
            "streamGenerateContent"
        } else {
            "generateContent"
        };
        format!(
            "{}/models/{}:{}?key={}",
            self.base_url, self.model, action, self.api_key
        )
    }

    fn max_tokens(&self, params: &ChatParams) -> u32 {
        params.max_tokens.unwrap_or(self.default_max_tokens)
    }

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
    ) -> GeminiRequest {
        let contents: Vec<GeminiContent> = params
            .messages
            .iter()
            .filter(|m| m.role != MessageRole::System)
            .map(GeminiContent::from)
            .collect();

        let gemini_tools = (!tools.is_empty()).then(|| {
            vec![GeminiToolSet {
                function_declarations: tools.iter().map(convert_tool).collect(),
            }]
        });

        let tool_config = (!tools.is_empty()).then(|| GeminiToolConfig {
            function_calling_config: map_tool_choice(tool_choice),
        });

        let system_instruction = params.system_prompt.as_ref().map(|s| GeminiSystemInstruction {
            parts: vec![GeminiPart::Text { text: s.clone() }],
        });

        GeminiRequest {
            contents,
            tools: gemini_tools,
            tool_config,
            system_instruction,
            generation_config: Some(GeminiGenerationConfig {
                max_output_tokens: Some(self.max_tokens(params)),
                temperature: params.temperature,
            }),
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

    async fn send(
        &self,
        url: &str,
        request: &GeminiRequest,
    ) -> Result<reqwest::Response, ProviderError> {
        let response = self
            .client
            .post(url)
            .header("content-type", "application/json")
            .json(request)
            .send()
            .await
            .map_err(|e| ProviderError::from_transport(&e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let body = response.text().await.unwrap_or_default();
            return Err(parse_error_response(status, &body));
        }

        Ok(response)
    }

    async fn round_trip(
        &self,
        request: &GeminiRequest,
        estimated_tokens: u64,
    ) -> Result<GeminiResponse, ProviderError> {
        self.admit(estimated_tokens).await;
        let response = self.send(&self.generate_url(false), request).await?;
        response
            .json::<GeminiResponse>()
            .await
            .map_err(|e| ProviderError::InvalidResponse(e.to_string()))
    }

    async fn execute(
        &self,
        operation_name: &str,
        request: &GeminiRequest,
        estimated_tokens: u64,
    ) -> Result<GeminiResponse, ProviderError> {
        let api_response = match &self.retry {
            Some(config) => {
                retry_with_backoff(config, operation_name, || {
                    self.round_trip(request, estimated_tokens)
                })
                .await?
            }
            None => self.round_trip(request, estimated_tokens).await?,
        };

        let usage = extract_usage(api_response.usage_metadata.as_ref());
        self.record_usage(usage).await;

        Ok(api_response)
    }

    fn extract(
        api_response: GeminiResponse,
    ) -> Result<(String, Vec<ToolCall>, TokenUsage, FinishReason), ProviderError> {
        let usage = extract_usage(api_response.usage_metadata.as_ref());

        let candidate = api_response.candidates.into_iter().next().ok_or_else(|| {
            ProviderError::InvalidResponse("No candidates in response".to_string())
        })?;

        let mut content = String::new();
        let mut tool_calls = Vec::new();

        if let Some(content_block) = candidate.content {
            for part in content_block.parts {
                match part {
                    GeminiPart::Text { text } => content.push_str(&text),
                    GeminiPart::FunctionCall { function_call } => {
                        tool_calls.push(ToolCall::new(
                            format!("call_{}", tool_calls.len()),
                            function_call.name,
                            function_call.args,
                        ));
                    }
                    GeminiPart::FunctionResponse { .. } => {}
                }
            }
        }

        let finish_reason = match candidate.finish_reason.as_deref() {
            _ if !tool_calls.is_empty() => FinishReason::ToolCalls,
            Some("STOP") => FinishReason::Stop,
            Some("MAX_TOKENS") => FinishReason::Length,
            Some("SAFETY") | Some("RECITATION") => FinishReason::Error,
            _ => FinishReason::Stop,
        };

        Ok((content, tool_calls, usage, finish_reason))
    }

    fn stream_request(&self, request: GeminiRequest, estimated_tokens: u64) -> ChunkStream<'_> {
        Box::pin(async_stream::stream! {
            self.admit(estimated_tokens).await;

            let response = match self.send(&self.generate_url(true), &request).await {
                Ok(r) => r,
                Err(e) => {
                    yield Err(e);
                    return;
                }
            };

            let mut tool_calls: Vec<ToolCall> = vec![];

            // Gemini streams JSON array elements, one chunk per line
            let byte_stream = response.bytes_stream();
            let stream_reader = StreamReader::new(
                byte_stream.map_err(|e| std::io::Error::new(std::io::ErrorKind::Other, e)),
            );
            let mut reader = BufReader::new(stream_reader);
            let mut buffer = String::new();

            loop {
                buffer.clear();
                match reader.read_line(&mut buffer).await {
                    Ok(0) => break, // EOF
                    Ok(_) => {
                        let line = buffer.trim();
                        if line.is_empty() || line == "[" || line == "]" || line == "," {
                            continue;
                        }

                        let json_str = line.trim_end_matches(',');

                        match serde_json::from_str::<GeminiStreamChunk>(json_str) {
                            Ok(chunk) => {
                                for candidate in chunk.candidates.unwrap_or_default() {
                                    let Some(content) = candidate.content else {
                                        continue;
                                    };
                                    for part in content.parts {
                                        match part {
                                            GeminiPart::Text { text } => {
                                                if !text.is_empty() {
                                                    yield Ok(StreamChunk {
                                                        content: text,
                                                        done: false,
                                                        tool_calls: vec![],
                                                    });
                                                }
                                            }
                                            GeminiPart::FunctionCall { function_call } => {
                                                tool_calls.push(ToolCall::new(
                                                    format!("call_{}", tool_calls.len()),
                                                    function_call.name,
                                                    function_call.args,
                                                ));
                                            }
                                            GeminiPart::FunctionResponse { .. } => {}
                                        }
                                    }
                                }
                            }
                            Err(e) => {
                                tracing::warn!(
                                    "failed to parse Gemini chunk: {} - line: {}",
                                    e,
                                    json_str
                                );
                            }
                        }
                    }
                    Err(e) => {
                        yield Err(ProviderError::StreamError(format!(
                            "Stream read error: {}",
                            e
                        )));
                        return;
                    }
                }
            }

            yield Ok(StreamChunk {
                content: String::new(),
                done: true,
                tool_calls,
            });
        })
    }
}

#[async_trait]
impl LlmPort for GeminiAdapter {
    async fn chat(&self, params: ChatParams) -> Result<ChatResponse, ProviderError> {
        let request = self.build_request(&params, &[], None);
        let estimated = self.estimate_tokens(&params);

        let api_response = self.execute("gemini_chat", &request, estimated).await?;
        let (content, _, usage, finish_reason) = Self::extract(api_response)?;

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
        let request = self.build_request(&params.chat, &params.tools, params.tool_choice.as_ref());
        let estimated = self.estimate_tokens(&params.chat);

        let api_response = self
            .execute("gemini_chat_with_tools", &request, estimated)
            .await?;
        let (content, tool_calls, usage, finish_reason) = Self::extract(api_response)?;

        Ok(ChatWithToolsResponse {
            content,
            usage,
            finish_reason,
            tool_calls,
        })
    }

    fn stream(&self, params: ChatParams) -> ChunkStream<'_> {
        let request = self.build_request(&params, &[], None);
        let estimated = self.estimate_tokens(&params);
        self.stream_request(request, estimated)
    }

    fn stream_with_tools(&self, params: ChatWithToolsParams) -> ChunkStream<'_> {
        let request = self.build_request(&params.chat, &params.tools, params.tool_choice.as_ref());
        let estimated = self.estimate_tokens(&params.chat);
        self.stream_request(request, estimated)
    }

    fn info(&self) -> ProviderInfo {
        ProviderInfo {
            name: "gemini".to_string(),
            model: self.model.clone(),
            version: API_VERSION.to_string(),
            supports_tool_use: true,
            supports_streaming: true,
        }
    }
}

/// Fold examples into the description, then translate the schema.
///
/// Gemini has no native input-examples support.
fn convert_tool(tool: &ToolDefinition) -> GeminiFunctionDeclaration {
    GeminiFunctionDeclaration {
        name: tool.name.clone(),
        description: enrich_description_with_examples(&tool.description, &tool.examples),
        parameters: to_gemini_schema(&tool.parameters),
    }
}

fn map_tool_choice(choice: Option<&ToolChoice>) -> GeminiFunctionCallingConfig {
    match choice {
        Some(ToolChoice::Tool(name)) => GeminiFunctionCallingConfig {
            mode: "ANY".to_string(),
            allowed_function_names: Some(vec![name.clone()]),
        },
        Some(ToolChoice::Required) => GeminiFunctionCallingConfig {
            mode: "ANY".to_string(),
            allowed_function_names: None,
        },
        Some(ToolChoice::None) => GeminiFunctionCallingConfig {
            mode: "NONE".to_string(),
            allowed_function_names: None,
        },
        Some(ToolChoice::Auto) | None => GeminiFunctionCallingConfig {
            mode: "AUTO".to_string(),
            allowed_function_names: None,
        },
    }
}

fn extract_usage(metadata: Option<&GeminiUsageMetadata>) -> TokenUsage {
    metadata.map_or_else(TokenUsage::default, |m| {
        TokenUsage::new(
            m.prompt_token_count.unwrap_or(0),
            m.candidates_token_count.unwrap_or(0),
        )
    })
}

fn parse_error_response(status: u16, body: &str) -> ProviderError {
    if let Ok(error_response) = serde_json::from_str::<GeminiErrorResponse>(body) {
        let error = error_response.error;
        let message = error.message;

        return match error.status.as_deref() {
            Some("RESOURCE_EXHAUSTED") => ProviderError::RateLimited {
                retry_after_ms: None,
            },
            Some("INVALID_ARGUMENT") => ProviderError::InvalidRequest(message),
            Some("PERMISSION_DENIED") | Some("UNAUTHENTICATED") => {
                ProviderError::Authentication(message)
            }
            Some("NOT_FOUND") => ProviderError::ModelNotAvailable(message),
            _ => ProviderError::from_http_status(status, &message),
        };
    }

    ProviderError::from_http_status(status, body)
}

// ============================================================================
// Gemini API Types
// ============================================================================

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiRequest {
    contents: Vec<GeminiContent>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tools: Option<Vec<GeminiToolSet>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    tool_config: Option<GeminiToolConfig>,
    #[serde(skip_serializing_if = "Option::is_none")]
    system_instruction: Option<GeminiSystemInstruction>,
    #[serde(skip_serializing_if = "Option::is_none")]
    generation_config: Option<GeminiGenerationConfig>,
}

#[derive(Debug, Serialize)]
struct GeminiSystemInstruction {
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiGenerationConfig {
    #[serde(skip_serializing_if = "Option::is_none")]
    max_output_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolSet {
    function_declarations: Vec<GeminiFunctionDeclaration>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiToolConfig {
    function_calling_config: GeminiFunctionCallingConfig,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct GeminiFunctionCallingConfig {
    mode: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    allowed_function_names: Option<Vec<String>>,
}

#[derive(Debug, Serialize)]
struct GeminiFunctionDeclaration {
    name: String,
    description: String,
    parameters: GeminiSchema,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiContent {
    role: String,
    parts: Vec<GeminiPart>,
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(untagged)]
enum GeminiPart {
    Text {
        text: String,
    },
    FunctionCall {
        #[serde(rename = "functionCall")]
        function_call: GeminiFunctionCall,
    },
    FunctionResponse {
        #[serde(rename = "functionResponse")]
        function_response: GeminiFunctionResponse,
    },
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionCall {
    name: String,
    args: serde_json::Value,
}

#[derive(Debug, Serialize, Deserialize)]
struct GeminiFunctionResponse {
    name: String,
    response: serde_json::Value,
}

// Response types
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiResponse {
    candidates: Vec<GeminiCandidate>,
    #[serde(default)]
    usage_metadata: Option<GeminiUsageMetadata>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiStreamChunk {
    #[serde(default)]
    candidates: Option<Vec<GeminiCandidate>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiCandidate {
    content: Option<GeminiContent>,
    finish_reason: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GeminiUsageMetadata {
    prompt_token_count: Option<u32>,
    candidates_token_count: Option<u32>,
}

// Error types
#[derive(Debug, Deserialize)]
struct GeminiErrorResponse {
    error: GeminiError,
}

#[derive(Debug, Deserialize)]
struct GeminiError {
    message: String,
    status: Option<String>,
}

// ============================================================================
// Conversions
// ============================================================================

impl From<&Message> for GeminiContent {
    fn from(msg: &Message) -> Self {
        // Tool results travel as function responses
        if msg.role == MessageRole::Tool {
            return GeminiContent {
                role: "function".to_string(),
                parts: vec![GeminiPart::FunctionResponse {
                    function_response: GeminiFunctionResponse {
                        name: msg.tool_call_id.clone().unwrap_or_default(),
                        response: serde_json::json!({ "result": msg.content }),
                    },
                }],
            };
        }

        let role = match msg.role {
            MessageRole::Assistant => "model",
            _ => "user",
        };

        let mut parts: Vec<GeminiPart> = vec![];

        if !msg.content.is_empty() {
            parts.push(GeminiPart::Text {
                text: msg.content.clone(),
            });
        }

        if let Some(ref tool_calls) = msg.tool_calls {
            for tc in tool_calls {
                parts.push(GeminiPart::FunctionCall {
                    function_call: GeminiFunctionCall {
                        name: tc.name.clone(),
                        args: tc.arguments.clone(),
                    },
                });
            }
        }

        if parts.is_empty() {
            parts.push(GeminiPart::Text {
                text: String::new(),
            });
        }

        GeminiContent {
            role: role.to_string(),
            parts,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::translate::GeminiType;
    use serde_json::json;

    fn adapter() -> GeminiAdapter {
        GeminiAdapter::new(GeminiAdapterConfig::new("test-key", "gemini-2.5-flash")).unwrap()
    }

    #[test]
    fn test_missing_api_key_is_config_error() {
        let result = GeminiAdapter::new(GeminiAdapterConfig::new("", "gemini-2.5-flash"));
        assert!(matches!(result, Err(FoundationError::Config(_))));
    }

    #[test]
    fn test_generate_url() {
        let adapter = adapter();
        let url = adapter.generate_url(false);
        assert!(url.contains("generateContent"));
        assert!(url.contains("gemini-2.5-flash"));

        let stream_url = adapter.generate_url(true);
        assert!(stream_url.contains("streamGenerateContent"));
    }

    #[test]
    fn test_convert_tool_enriches_description() {
        let tool = ToolDefinition::new("record_metric", "Records a metric.")
            .with_number_param("value", "Value", true)
            .with_examples(vec![json!({"value": 82.5})]);

        let declaration = convert_tool(&tool);
        assert!(declaration.description.contains("Records a metric."));
        assert!(declaration.description.contains("Input examples:"));
        assert_eq!(declaration.parameters.schema_type, GeminiType::Object);
    }

    #[test]
    fn test_convert_tool_without_examples_keeps_description() {
        let tool = ToolDefinition::new("get_history", "Reads history.");
        let declaration = convert_tool(&tool);
        assert_eq!(declaration.description, "Reads history.");
    }

    #[test]
    fn test_forced_tool_choice_maps_to_any_with_allowlist() {
        let config = map_tool_choice(Some(&ToolChoice::Tool("classify".to_string())));
        assert_eq!(config.mode, "ANY");
        assert_eq!(config.allowed_function_names, Some(vec!["classify".to_string()]));

        let auto = map_tool_choice(None);
        assert_eq!(auto.mode, "AUTO");
        assert!(auto.allowed_function_names.is_none());

        let none = map_tool_choice(Some(&ToolChoice::None));
        assert_eq!(none.mode, "NONE");
    }

    #[test]
    fn test_tool_result_message_becomes_function_response() {
        let msg = Message::tool_result("call_0", "{\"count\": 3}");
        let content = GeminiContent::from(&msg);
        assert_eq!(content.role, "function");
        assert!(matches!(
            content.parts[0],
            GeminiPart::FunctionResponse { .. }
        ));
    }

    #[test]
    fn test_assistant_tool_calls_become_function_calls() {
        let msg = Message::assistant_with_tools(
            "",
            vec![ToolCall::new("call_0", "get_history", json!({"days": 7}))],
        );
        let content = GeminiContent::from(&msg);
        assert_eq!(content.role, "model");
        assert!(matches!(content.parts[0], GeminiPart::FunctionCall { .. }));
    }

    #[test]
    fn test_error_response_mapping() {
        let body = r#"{"error":{"message":"quota exceeded","status":"RESOURCE_EXHAUSTED"}}"#;
        assert!(matches!(
            parse_error_response(429, body),
            ProviderError::RateLimited { .. }
        ));

        let body = r#"{"error":{"message":"bad key","status":"UNAUTHENTICATED"}}"#;
        assert!(matches!(
            parse_error_response(401, body),
            ProviderError::Authentication(_)
        ));

        assert!(matches!(
            parse_error_response(503, "not json"),
            ProviderError::ServerError(_)
        ));
    }

    #[test]
    fn test_extract_normalizes_tool_calls_with_synthetic_ids() {
        let response = GeminiResponse {
            candidates: vec![GeminiCandidate {
                content: Some(GeminiContent {
                    role: "model".to_string(),
                    parts: vec![
                        GeminiPart::FunctionCall {
                            function_call: GeminiFunctionCall {
                                name: "record_metric".to_string(),
                                args: json!({"value": 82.5}),
                            },
                        },
                        GeminiPart::FunctionCall {
                            function_call: GeminiFunctionCall {
                                name: "get_history".to_string(),
                                args: json!({}),
                            },
                        },
                    ],
                }),
                finish_reason: Some("STOP".to_string()),
            }],
            usage_metadata: Some(GeminiUsageMetadata {
                prompt_token_count: Some(10),
                candidates_token_count: Some(20),
            }),
        };

        let (content, tool_calls, usage, finish_reason) =
            GeminiAdapter::extract(response).unwrap();
        assert!(content.is_empty());
        assert_eq!(tool_calls.len(), 2);
        assert_eq!(tool_calls[0].id, "call_0");
        assert_eq!(tool_calls[1].id, "call_1");
        assert_eq!(usage.total(), 30);
        assert_eq!(finish_reason, FinishReason::ToolCalls);
    }

    #[test]
    fn test_extract_empty_candidates_is_invalid_response() {
        let response = GeminiResponse {
            candidates: vec![],
            usage_metadata: None,
        };
        assert!(matches!(
            GeminiAdapter::extract(response),
            Err(ProviderError::InvalidResponse(_))
        ));
    }
}
