//! Confirmation model for mutating tools
//!
//! A mutating tool call is not executed directly: it becomes a
//! [`PendingToolConfirmation`] and the turn suspends until the user's next
//! message is classified as confirm/reject/correct through a forced
//! tool-choice call against [`intent_tool`].

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use tether_foundation::Schema;
use tether_provider::{ToolCall, ToolDefinition};
use uuid::Uuid;

/// Soft expiry for pending confirmations
pub const DEFAULT_CONFIRMATION_TTL_HOURS: i64 = 24;

/// Name of the fixed intent-classification tool
pub const INTENT_TOOL_NAME: &str = "classify_confirmation_intent";

/// A mutating tool call waiting for user approval.
///
/// Ephemeral, scoped to a single suspended turn; persistence of "what's
/// awaiting confirmation" is the caller's concern.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PendingToolConfirmation {
    /// Identifier for correlating the eventual user reply
    pub id: Uuid,

    /// The tool call that needs confirmation
    pub tool_call: ToolCall,

    /// Human-readable description of what the tool will do
    pub description: String,

    /// Loop iteration the confirmation was raised in
    pub iteration: usize,

    /// When the confirmation was raised
    pub created_at: DateTime<Utc>,

    /// After this instant the pending call must be rejected, not executed
    pub expires_at: DateTime<Utc>,
}

impl PendingToolConfirmation {
    pub fn new(tool_call: ToolCall, description: impl Into<String>, iteration: usize) -> Self {
        let created_at = Utc::now();
        Self {
            id: Uuid::new_v4(),
            tool_call,
            description: description.into(),
            iteration,
            created_at,
            expires_at: created_at + Duration::hours(DEFAULT_CONFIRMATION_TTL_HOURS),
        }
    }

    /// Override the expiry TTL
    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.expires_at = self.created_at + ttl;
        self
    }

    /// Whether the confirmation has gone stale.
    ///
    /// Stale confirmations are rejected by the caller without executing
    /// the tool and without asking the LLM to guess the original intent.
    pub fn is_expired(&self) -> bool {
        Utc::now() >= self.expires_at
    }
}

/// Per-tool confirmation message templates with `{field}` placeholders.
///
/// Placeholders resolve from the tool call's arguments; a template whose
/// placeholder is missing falls back to the generic message.
#[derive(Debug, Clone, Default)]
pub struct ConfirmationMessages {
    templates: HashMap<String, String>,
}

impl ConfirmationMessages {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a template for a tool name
    pub fn with_template(mut self, tool: impl Into<String>, template: impl Into<String>) -> Self {
        self.templates.insert(tool.into(), template.into());
        self
    }

    /// Render the confirmation message for one tool call
    pub fn describe(&self, tool_call: &ToolCall) -> String {
        self.templates
            .get(&tool_call.name)
            .and_then(|template| render_template(template, &tool_call.arguments))
            .unwrap_or_else(|| format!("Execute {}?", tool_call.name))
    }

    /// Render a batch message for several mutating calls
    pub fn describe_batch(&self, tool_calls: &[ToolCall]) -> String {
        match tool_calls {
            [] => String::new(),
            [single] => self.describe(single),
            many => {
                let bullets: Vec<String> =
                    many.iter().map(|tc| format!("- {}", self.describe(tc))).collect();
                format!("Execute {} operations?\n{}", many.len(), bullets.join("\n"))
            }
        }
    }
}

/// Substitute `{field}` placeholders from the arguments object.
///
/// Returns `None` when a placeholder has no matching argument.
fn render_template(template: &str, arguments: &Value) -> Option<String> {
    let mut result = String::with_capacity(template.len());
    let mut rest = template;

    while let Some(start) = rest.find('{') {
        result.push_str(&rest[..start]);
        let after = &rest[start + 1..];
        let end = after.find('}')?;
        let key = &after[..end];

        let value = arguments.get(key)?;
        match value {
            Value::String(s) => result.push_str(s),
            other => result.push_str(&other.to_string()),
        }

        rest = &after[end + 1..];
    }

    result.push_str(rest);
    Some(result)
}

/// Classified intent of a user's reply to a pending confirmation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IntentKind {
    /// Go ahead and execute the pending call
    Confirm,

    /// Do not execute the pending call
    Reject,

    /// Execute with a corrected value/unit
    Correct,
}

/// Structured result of the forced-choice intent classification.
///
/// Interpretation data only - never executed as a domain action.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ConfirmationIntent {
    /// The classified intent
    pub intent: IntentKind,

    /// Corrected value when intent is `correct`
    #[serde(default)]
    pub corrected_value: Option<f64>,

    /// Corrected unit when intent is `correct`
    #[serde(default)]
    pub corrected_unit: Option<String>,

    /// Classifier confidence, 0 to 1
    pub confidence: f64,

    /// Short explanation of the classification
    #[serde(default)]
    pub reasoning: Option<String>,
}

/// The fixed intent-classification tool definition.
///
/// Invoked with forced tool-choice so the model cannot answer with free
/// text; reusing the structured tool-calling channel sidesteps unreliable
/// natural-language parsing of "yes", "no, make it 83", etc.
pub fn intent_tool() -> ToolDefinition {
    ToolDefinition::new(
        INTENT_TOOL_NAME,
        "Classifies the user's reply to a pending action confirmation. \
         Use 'confirm' when the user agrees, 'reject' when they decline, \
         and 'correct' when they agree but adjust the value or unit.",
    )
    .with_param(
        "intent",
        Schema::enumeration(["confirm", "reject", "correct"])
            .describe("How the user responded to the pending action"),
    )
    .with_param(
        "corrected_value",
        Schema::number()
            .describe("Replacement value when the user corrected it")
            .optional(),
    )
    .with_param(
        "corrected_unit",
        Schema::string()
            .describe("Replacement unit when the user corrected it")
            .optional(),
    )
    .with_param(
        "confidence",
        Schema::number().describe("Classification confidence between 0 and 1"),
    )
    .with_param(
        "reasoning",
        Schema::string()
            .describe("Brief justification for the classification")
            .optional(),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_foundation::SchemaKind;

    fn call(name: &str, args: Value) -> ToolCall {
        ToolCall::new("call_1", name, args)
    }

    fn messages() -> ConfirmationMessages {
        ConfirmationMessages::new()
            .with_template("record_metric", "Record {type}: {value} {unit}?")
            .with_template("create_expense", "Register expense of ${value} in {category}?")
    }

    #[test]
    fn test_template_rendering() {
        let tc = call(
            "record_metric",
            json!({"type": "weight", "value": 82.5, "unit": "kg"}),
        );
        assert_eq!(messages().describe(&tc), "Record weight: 82.5 kg?");
    }

    #[test]
    fn test_missing_placeholder_falls_back() {
        let tc = call("record_metric", json!({"type": "weight"}));
        assert_eq!(messages().describe(&tc), "Execute record_metric?");
    }

    #[test]
    fn test_unknown_tool_falls_back() {
        let tc = call("delete_everything", json!({}));
        assert_eq!(messages().describe(&tc), "Execute delete_everything?");
    }

    #[test]
    fn test_batch_message() {
        let calls = vec![
            call("record_metric", json!({"type": "weight", "value": 82, "unit": "kg"})),
            call("create_expense", json!({"value": 150, "category": "food"})),
        ];
        let message = messages().describe_batch(&calls);
        assert!(message.starts_with("Execute 2 operations?"));
        assert!(message.contains("- Record weight: 82 kg?"));
        assert!(message.contains("- Register expense of $150 in food?"));
    }

    #[test]
    fn test_pending_expiry() {
        let pending = PendingToolConfirmation::new(
            call("record_metric", json!({})),
            "Record weight?",
            1,
        );
        assert!(!pending.is_expired());

        let expired = pending.with_ttl(Duration::hours(-1));
        assert!(expired.is_expired());
    }

    #[test]
    fn test_intent_parsing_from_arguments() {
        let intent: ConfirmationIntent = serde_json::from_value(json!({
            "intent": "correct",
            "corrected_value": 83.0,
            "corrected_unit": "kg",
            "confidence": 0.92
        }))
        .unwrap();

        assert_eq!(intent.intent, IntentKind::Correct);
        assert_eq!(intent.corrected_value, Some(83.0));
        assert_eq!(intent.corrected_unit.as_deref(), Some("kg"));
        assert!(intent.reasoning.is_none());
    }

    #[test]
    fn test_intent_tool_schema() {
        let tool = intent_tool();
        assert_eq!(tool.name, INTENT_TOOL_NAME);
        assert!(!tool.requires_confirmation);

        match &tool.parameters.kind {
            SchemaKind::Object(props) => {
                let names: Vec<&str> = props.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(
                    names,
                    vec![
                        "intent",
                        "corrected_value",
                        "corrected_unit",
                        "confidence",
                        "reasoning"
                    ]
                );
                // intent and confidence are required, the rest optional
                assert!(!props[0].1.is_optional_like());
                assert!(props[1].1.is_optional_like());
                assert!(props[2].1.is_optional_like());
                assert!(!props[3].1.is_optional_like());
                assert!(props[4].1.is_optional_like());
            }
            _ => panic!("expected object parameters"),
        }
    }
}
