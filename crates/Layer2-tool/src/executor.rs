//! Tool executor boundary
//!
//! The engine never executes domain logic itself; it hands resolved tool
//! calls to a [`ToolExecutor`] implemented by the host application and gets
//! back one result per call.

use async_trait::async_trait;
use futures::future::BoxFuture;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use tether_foundation::{Error, Result};
use tether_provider::ToolCall;

/// Identifying data passed through to every execution, opaque to the engine
#[derive(Debug, Clone)]
pub struct ToolExecutionContext {
    /// User the conversation belongs to
    pub user_id: String,

    /// Conversation this turn is part of
    pub conversation_id: String,
}

impl ToolExecutionContext {
    pub fn new(user_id: impl Into<String>, conversation_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
            conversation_id: conversation_id.into(),
        }
    }
}

/// Result of one tool execution
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolExecutionResult {
    /// Tool call ID (same as input)
    pub tool_call_id: String,

    /// Tool name
    pub tool_name: String,

    /// Result content, serialized for LLM consumption
    pub content: String,

    /// Whether execution succeeded
    pub success: bool,

    /// Error message if execution failed
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ToolExecutionResult {
    /// Successful result with string content
    pub fn success(tool_call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call.id.clone(),
            tool_name: tool_call.name.clone(),
            content: content.into(),
            success: true,
            error: None,
        }
    }

    /// Successful result with JSON content, serialized compactly
    pub fn success_json(tool_call: &ToolCall, value: &Value) -> Self {
        let content = match value {
            Value::String(s) => s.clone(),
            other => serde_json::to_string(other).unwrap_or_default(),
        };
        Self::success(tool_call, content)
    }

    /// Failed result carrying the error message
    pub fn failure(tool_call: &ToolCall, error: impl Into<String>) -> Self {
        Self {
            tool_call_id: tool_call.id.clone(),
            tool_name: tool_call.name.clone(),
            content: String::new(),
            success: false,
            error: Some(error.into()),
        }
    }
}

/// Capability for executing tool calls against domain logic.
///
/// Implementations may return `Err` for infrastructure failures; the tool
/// loop converts those into failed results rather than crashing the turn.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Execute a tool call
    async fn execute(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
    ) -> Result<ToolExecutionResult>;

    /// Check if a tool requires user confirmation before execution
    fn requires_confirmation(&self, tool_name: &str) -> bool;
}

/// Async handler backing one tool in a [`HandlerExecutor`]
pub type ToolHandler =
    Arc<dyn Fn(Value, ToolExecutionContext) -> BoxFuture<'static, Result<Value>> + Send + Sync>;

/// Executor built from a map of per-tool handlers.
///
/// Handy for hosts with simple tools and for tests. Unknown tool names
/// surface as `Error::ToolNotFound`; handler failures become failed
/// results so the LLM can see them.
#[derive(Default)]
pub struct HandlerExecutor {
    handlers: HashMap<String, ToolHandler>,
    confirm_tools: HashSet<String>,
}

impl HandlerExecutor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a handler for a tool name
    pub fn register<F, Fut>(mut self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        self.handlers.insert(
            name.into(),
            Arc::new(move |args, ctx| Box::pin(handler(args, ctx))),
        );
        self
    }

    /// Register a handler for a tool that requires confirmation
    pub fn register_confirmed<F, Fut>(self, name: impl Into<String>, handler: F) -> Self
    where
        F: Fn(Value, ToolExecutionContext) -> Fut + Send + Sync + 'static,
        Fut: std::future::Future<Output = Result<Value>> + Send + 'static,
    {
        let name = name.into();
        let mut this = self.register(name.clone(), handler);
        this.confirm_tools.insert(name);
        this
    }
}

#[async_trait]
impl ToolExecutor for HandlerExecutor {
    async fn execute(
        &self,
        tool_call: &ToolCall,
        context: &ToolExecutionContext,
    ) -> Result<ToolExecutionResult> {
        let handler = self
            .handlers
            .get(&tool_call.name)
            .ok_or_else(|| Error::ToolNotFound(tool_call.name.clone()))?;

        match handler(tool_call.arguments.clone(), context.clone()).await {
            Ok(value) => Ok(ToolExecutionResult::success_json(tool_call, &value)),
            Err(e) => Ok(ToolExecutionResult::failure(tool_call, e.to_string())),
        }
    }

    fn requires_confirmation(&self, tool_name: &str) -> bool {
        self.confirm_tools.contains(tool_name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn context() -> ToolExecutionContext {
        ToolExecutionContext::new("user-1", "conv-1")
    }

    #[tokio::test]
    async fn test_handler_success_serializes_json() {
        let executor = HandlerExecutor::new().register("search_knowledge", |args, _ctx| async move {
            let query = args["query"].as_str().unwrap_or_default().to_string();
            Ok(json!({ "results": [], "query": query }))
        });

        let call = ToolCall::new("call_1", "search_knowledge", json!({"query": "diet"}));
        let result = executor.execute(&call, &context()).await.unwrap();

        assert!(result.success);
        assert_eq!(result.tool_call_id, "call_1");
        assert_eq!(result.tool_name, "search_knowledge");
        assert!(result.content.contains(r#""query":"diet""#));
    }

    #[tokio::test]
    async fn test_string_results_pass_through_unquoted() {
        let executor = HandlerExecutor::new()
            .register("echo", |_args, _ctx| async move { Ok(json!("plain text")) });

        let call = ToolCall::new("call_1", "echo", json!({}));
        let result = executor.execute(&call, &context()).await.unwrap();
        assert_eq!(result.content, "plain text");
    }

    #[tokio::test]
    async fn test_unknown_tool_is_not_found_error() {
        let executor = HandlerExecutor::new();
        let call = ToolCall::new("call_1", "missing_tool", json!({}));

        let err = executor.execute(&call, &context()).await.unwrap_err();
        assert!(matches!(err, Error::ToolNotFound(_)));
    }

    #[tokio::test]
    async fn test_handler_error_becomes_failed_result() {
        let executor = HandlerExecutor::new().register("record_metric", |_args, _ctx| async move {
            Err(Error::Tool("Database error".to_string()))
        });

        let call = ToolCall::new("call_1", "record_metric", json!({}));
        let result = executor.execute(&call, &context()).await.unwrap();

        assert!(!result.success);
        assert_eq!(result.error.as_deref(), Some("Tool error: Database error"));
    }

    #[tokio::test]
    async fn test_confirmation_registration() {
        let executor = HandlerExecutor::new()
            .register("get_history", |_args, _ctx| async move { Ok(json!([])) })
            .register_confirmed("record_metric", |_args, _ctx| async move {
                Ok(json!({"ok": true}))
            });

        assert!(executor.requires_confirmation("record_metric"));
        assert!(!executor.requires_confirmation("get_history"));
        assert!(!executor.requires_confirmation("unknown"));
    }
}
