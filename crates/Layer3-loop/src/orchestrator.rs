//! The tool loop - iterative request/execute/respond cycle
//!
//! One invocation drives a single conversation turn: send history + tool
//! catalog to the LLM, execute requested calls, feed results back, repeat
//! until the LLM answers without tools or the iteration ceiling trips.

use async_trait::async_trait;
use std::sync::Arc;
use tether_foundation::{Error, Result};
use tether_provider::{
    ChatParams, ChatWithToolsParams, ChatWithToolsResponse, LlmPort, Message, ToolCall,
    ToolDefinition,
};
use tether_tool::{
    ConfirmationMessages, PendingToolConfirmation, ToolExecutionContext, ToolExecutionResult,
    ToolExecutor,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// Default maximum iterations for the tool loop
pub const DEFAULT_MAX_ITERATIONS: usize = 5;

/// Message fed back to the LLM when the user rejects a mutating call
pub const REJECTION_MESSAGE: &str = "User rejected the tool call";

/// Inline approval hook for mutating tools.
///
/// When configured, the loop asks the gate instead of suspending; a denial
/// becomes a rejected tool result the LLM can react to within the turn.
#[async_trait]
pub trait ConfirmationGate: Send + Sync {
    async fn approve(&self, pending: &PendingToolConfirmation) -> bool;
}

/// Telemetry hook invoked once per iteration, after each LLM response
pub type IterationObserver = Arc<dyn Fn(usize, &ChatWithToolsResponse) + Send + Sync>;

/// Configuration for one tool loop invocation
pub struct ToolLoopConfig {
    /// Available tools
    pub tools: Vec<ToolDefinition>,

    /// Executor for resolved tool calls
    pub executor: Arc<dyn ToolExecutor>,

    /// Context passed through to every execution
    pub context: ToolExecutionContext,

    /// System prompt for the LLM
    pub system_prompt: Option<String>,

    /// Temperature for LLM responses
    pub temperature: Option<f32>,

    /// Max tokens for LLM responses
    pub max_tokens: Option<u32>,

    /// Hard ceiling on LLM round-trips per turn
    pub max_iterations: usize,

    /// Telemetry-only observer; cannot affect control flow
    pub on_iteration: Option<IterationObserver>,

    /// Inline confirmation hook; without one the loop suspends instead
    pub confirmation_gate: Option<Arc<dyn ConfirmationGate>>,

    /// Templates for human-readable confirmation descriptions
    pub confirmation_messages: ConfirmationMessages,

    /// Tool-call id that was already confirmed and may execute directly
    pub skip_confirmation_for: Option<String>,

    /// Cooperative cancellation for the whole invocation
    pub cancel: Option<CancellationToken>,
}

impl ToolLoopConfig {
    pub fn new(executor: Arc<dyn ToolExecutor>, context: ToolExecutionContext) -> Self {
        Self {
            tools: vec![],
            executor,
            context,
            system_prompt: None,
            temperature: None,
            max_tokens: None,
            max_iterations: DEFAULT_MAX_ITERATIONS,
            on_iteration: None,
            confirmation_gate: None,
            confirmation_messages: ConfirmationMessages::new(),
            skip_confirmation_for: None,
            cancel: None,
        }
    }

    pub fn with_tools(mut self, tools: Vec<ToolDefinition>) -> Self {
        self.tools = tools;
        self
    }

    pub fn with_system_prompt(mut self, prompt: impl Into<String>) -> Self {
        self.system_prompt = Some(prompt.into());
        self
    }

    pub fn with_temperature(mut self, temperature: f32) -> Self {
        self.temperature = Some(temperature);
        self
    }

    pub fn with_max_tokens(mut self, max_tokens: u32) -> Self {
        self.max_tokens = Some(max_tokens);
        self
    }

    pub fn with_max_iterations(mut self, max_iterations: usize) -> Self {
        self.max_iterations = max_iterations;
        self
    }

    pub fn with_on_iteration(mut self, observer: IterationObserver) -> Self {
        self.on_iteration = Some(observer);
        self
    }

    pub fn with_confirmation_gate(mut self, gate: Arc<dyn ConfirmationGate>) -> Self {
        self.confirmation_gate = Some(gate);
        self
    }

    pub fn with_confirmation_messages(mut self, messages: ConfirmationMessages) -> Self {
        self.confirmation_messages = messages;
        self
    }

    pub fn with_skip_confirmation_for(mut self, tool_call_id: impl Into<String>) -> Self {
        self.skip_confirmation_for = Some(tool_call_id.into());
        self
    }

    pub fn with_cancellation(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().is_some_and(|t| t.is_cancelled())
    }

    /// Confirmation applies when either the definition flags the tool or
    /// the executor says so, unless this exact call was already confirmed.
    fn needs_confirmation(&self, tool_call: &ToolCall) -> bool {
        if self.skip_confirmation_for.as_deref() == Some(tool_call.id.as_str()) {
            return false;
        }
        let flagged = self
            .tools
            .iter()
            .any(|t| t.name == tool_call.name && t.requires_confirmation);
        flagged || self.executor.requires_confirmation(&tool_call.name)
    }
}

/// Result of a tool loop invocation
#[derive(Debug, Clone)]
pub struct ToolLoopResult {
    /// Final response content from the LLM (empty when not completed)
    pub content: String,

    /// Number of LLM round-trips used
    pub iterations: usize,

    /// All tool calls processed during the loop
    pub tool_calls: Vec<ToolCall>,

    /// All tool results, one per processed call
    pub tool_results: Vec<ToolExecutionResult>,

    /// Final conversation messages (input + everything appended)
    pub messages: Vec<Message>,

    /// Whether the LLM produced a final answer
    pub completed: bool,

    /// Whether the invocation stopped on the cancellation signal
    pub cancelled: bool,

    /// Set when the loop suspended for user confirmation
    pub pending_confirmation: Option<PendingToolConfirmation>,
}

/// Runs a conversation loop with tool use.
///
/// The loop continues until:
/// 1. The LLM responds without tool calls (completed)
/// 2. A tool requires confirmation and no gate is configured (suspended)
/// 3. The cancellation token fires (partial progress preserved)
/// 4. Max iterations are exhausted (`Error::MaxIterations`)
pub async fn run_tool_loop(
    llm: &dyn LlmPort,
    initial_messages: Vec<Message>,
    config: &ToolLoopConfig,
) -> Result<ToolLoopResult> {
    run_loop(llm, initial_messages, config, 0, vec![], vec![]).await
}

/// Resume a loop that suspended on a pending confirmation.
///
/// Executes the pending call when `confirmed` (unless it expired), or
/// feeds a rejection back to the LLM, then continues the loop with the
/// iteration budget reduced by the iterations already spent.
pub async fn continue_tool_loop(
    llm: &dyn LlmPort,
    previous: ToolLoopResult,
    confirmed: bool,
    config: &ToolLoopConfig,
) -> Result<ToolLoopResult> {
    let pending = previous
        .pending_confirmation
        .ok_or(Error::NoPendingConfirmation)?;

    let mut messages = previous.messages;
    let mut all_tool_calls = previous.tool_calls;
    let mut all_tool_results = previous.tool_results;

    let result = if !confirmed {
        ToolExecutionResult::failure(&pending.tool_call, REJECTION_MESSAGE)
    } else if pending.is_expired() {
        // Stale confirmations are rejected, never executed
        warn!(
            tool = %pending.tool_call.name,
            "pending confirmation expired, rejecting"
        );
        ToolExecutionResult::failure(&pending.tool_call, "Confirmation expired")
    } else {
        execute_tool_call(config.executor.as_ref(), &pending.tool_call, &config.context).await
    };

    all_tool_calls.push(pending.tool_call.clone());
    messages.push(tool_message(&result));
    all_tool_results.push(result);

    run_loop(
        llm,
        messages,
        config,
        pending.iteration,
        all_tool_calls,
        all_tool_results,
    )
    .await
}

async fn run_loop(
    llm: &dyn LlmPort,
    mut messages: Vec<Message>,
    config: &ToolLoopConfig,
    start_iteration: usize,
    mut all_tool_calls: Vec<ToolCall>,
    mut all_tool_results: Vec<ToolExecutionResult>,
) -> Result<ToolLoopResult> {
    let partial = |messages: Vec<Message>,
                   iterations: usize,
                   tool_calls: Vec<ToolCall>,
                   tool_results: Vec<ToolExecutionResult>| {
        ToolLoopResult {
            content: String::new(),
            iterations,
            tool_calls,
            tool_results,
            messages,
            completed: false,
            cancelled: true,
            pending_confirmation: None,
        }
    };

    for iteration in (start_iteration + 1)..=config.max_iterations {
        if config.is_cancelled() {
            info!(iteration, "tool loop cancelled before LLM call");
            return Ok(partial(
                messages,
                iteration - 1,
                all_tool_calls,
                all_tool_results,
            ));
        }

        let response = llm
            .chat_with_tools(ChatWithToolsParams {
                chat: ChatParams {
                    messages: messages.clone(),
                    system_prompt: config.system_prompt.clone(),
                    temperature: config.temperature,
                    max_tokens: config.max_tokens,
                },
                tools: config.tools.clone(),
                tool_choice: None,
            })
            .await
            .map_err(Error::from)?;

        if let Some(observer) = &config.on_iteration {
            observer(iteration, &response);
        }

        // No tool calls means the turn is complete
        if response.tool_calls.is_empty() {
            debug!(iteration, "tool loop completed");
            return Ok(ToolLoopResult {
                content: response.content,
                iterations: iteration,
                tool_calls: all_tool_calls,
                tool_results: all_tool_results,
                messages,
                completed: true,
                cancelled: false,
                pending_confirmation: None,
            });
        }

        messages.push(Message::assistant_with_tools(
            response.content.clone(),
            response.tool_calls.clone(),
        ));

        // Process tool calls in the order the LLM issued them
        for tool_call in &response.tool_calls {
            if config.is_cancelled() {
                info!(iteration, tool = %tool_call.name, "tool loop cancelled mid-batch");
                return Ok(partial(messages, iteration, all_tool_calls, all_tool_results));
            }

            if config.needs_confirmation(tool_call) {
                let description = config.confirmation_messages.describe(tool_call);
                let pending =
                    PendingToolConfirmation::new(tool_call.clone(), description, iteration);

                match &config.confirmation_gate {
                    None => {
                        // Suspend the turn; the caller resumes via
                        // continue_tool_loop once the user has answered.
                        info!(tool = %tool_call.name, "awaiting user confirmation");
                        return Ok(ToolLoopResult {
                            content: response.content,
                            iterations: iteration,
                            tool_calls: all_tool_calls,
                            tool_results: all_tool_results,
                            messages,
                            completed: false,
                            cancelled: false,
                            pending_confirmation: Some(pending),
                        });
                    }
                    Some(gate) => {
                        if !gate.approve(&pending).await {
                            info!(tool = %tool_call.name, "confirmation denied");
                            let result =
                                ToolExecutionResult::failure(tool_call, REJECTION_MESSAGE);
                            all_tool_calls.push(tool_call.clone());
                            messages.push(tool_message(&result));
                            all_tool_results.push(result);
                            continue;
                        }
                    }
                }
            }

            all_tool_calls.push(tool_call.clone());
            let result =
                execute_tool_call(config.executor.as_ref(), tool_call, &config.context).await;
            messages.push(tool_message(&result));
            all_tool_results.push(result);
        }
    }

    // Safety valve against runaway tool-calling; fires before another LLM call
    warn!(max_iterations = config.max_iterations, "tool loop exceeded iteration ceiling");
    Err(Error::MaxIterations(config.max_iterations))
}

/// Execute one call; executor-level failures become failed results so a
/// single broken tool never aborts the whole turn.
async fn execute_tool_call(
    executor: &dyn ToolExecutor,
    tool_call: &ToolCall,
    context: &ToolExecutionContext,
) -> ToolExecutionResult {
    match executor.execute(tool_call, context).await {
        Ok(result) => result,
        Err(e) => ToolExecutionResult::failure(tool_call, e.to_string()),
    }
}

/// Tool message appended to the history; errors are spelled out so the LLM
/// can see the failure and adapt its next request.
fn tool_message(result: &ToolExecutionResult) -> Message {
    let content = if result.success {
        result.content.clone()
    } else {
        format!(
            "Error: {}",
            result.error.as_deref().unwrap_or("Unknown error")
        )
    };
    Message::tool_result(&result.tool_call_id, content)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_default_max_iterations() {
        assert_eq!(DEFAULT_MAX_ITERATIONS, 5);
    }

    #[test]
    fn test_tool_message_rendering() {
        let call = ToolCall::new("call_1", "record_metric", json!({}));

        let ok = ToolExecutionResult::success(&call, "{\"ok\":true}");
        let msg = tool_message(&ok);
        assert_eq!(msg.content, "{\"ok\":true}");
        assert_eq!(msg.tool_call_id.as_deref(), Some("call_1"));

        let failed = ToolExecutionResult::failure(&call, "Database error");
        assert_eq!(tool_message(&failed).content, "Error: Database error");
    }
}
