//! Deterministic classification of confirmation replies
//!
//! Free-text replies to a pending confirmation ("yes", "no, make it 83kg",
//! "actually cancel") are classified through the same structured
//! tool-calling channel the loop already uses: one LLM call with a forced
//! tool-choice, so the model cannot answer with plain text.

use serde_json::Value;
use tether_foundation::{Error, Result};
use tether_provider::{
    ChatParams, ChatWithToolsParams, LlmPort, Message, ToolCall, ToolChoice,
};
use tether_tool::{intent_tool, ConfirmationIntent, PendingToolConfirmation, INTENT_TOOL_NAME};
use tracing::debug;

const CLASSIFIER_SYSTEM_PROMPT: &str = "You classify a user's reply to a pending \
action confirmation. Call the classification tool with your verdict. Treat \
agreement as confirm, refusal as reject, and agreement with an adjusted value \
or unit as correct.";

/// Classify the user's reply to a pending confirmation.
///
/// Issues exactly one `chat_with_tools` call with the classifier tool
/// forced; the result is interpretation data for the caller, never executed
/// as a domain action. A response without a well-formed classifier call is
/// a validation error.
pub async fn classify_confirmation_intent(
    llm: &dyn LlmPort,
    pending: &PendingToolConfirmation,
    user_reply: &str,
) -> Result<ConfirmationIntent> {
    let prompt = format!(
        "Pending action: {}\nUser reply: {}",
        pending.description, user_reply
    );

    let response = llm
        .chat_with_tools(ChatWithToolsParams {
            chat: ChatParams {
                messages: vec![Message::user(prompt)],
                system_prompt: Some(CLASSIFIER_SYSTEM_PROMPT.to_string()),
                temperature: Some(0.0),
                max_tokens: None,
            },
            tools: vec![intent_tool()],
            tool_choice: Some(ToolChoice::Tool(INTENT_TOOL_NAME.to_string())),
        })
        .await
        .map_err(Error::from)?;

    let call = response
        .tool_calls
        .iter()
        .find(|tc| tc.name == INTENT_TOOL_NAME)
        .ok_or_else(|| {
            Error::Validation("intent classifier returned no classification call".to_string())
        })?;

    let intent: ConfirmationIntent =
        serde_json::from_value(call.arguments.clone()).map_err(|e| {
            Error::Validation(format!("malformed intent classification: {}", e))
        })?;

    debug!(
        intent = ?intent.intent,
        confidence = intent.confidence,
        "confirmation reply classified"
    );

    Ok(intent)
}

/// Build the corrected tool call for a `correct` intent.
///
/// Merges `corrected_value`/`corrected_unit` over the pending call's
/// `value`/`unit` arguments. The caller re-runs the loop with the returned
/// call marked as already confirmed.
pub fn apply_correction(pending: &PendingToolConfirmation, intent: &ConfirmationIntent) -> ToolCall {
    let mut tool_call = pending.tool_call.clone();

    if let Value::Object(ref mut args) = tool_call.arguments {
        if let Some(value) = intent.corrected_value {
            args.insert("value".to_string(), serde_json::json!(value));
        }
        if let Some(ref unit) = intent.corrected_unit {
            args.insert("unit".to_string(), serde_json::json!(unit));
        }
    }

    tool_call
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tether_tool::IntentKind;

    fn pending(args: Value) -> PendingToolConfirmation {
        PendingToolConfirmation::new(
            ToolCall::new("call_1", "record_metric", args),
            "Record weight: 82.5 kg?",
            1,
        )
    }

    #[test]
    fn test_apply_correction_overrides_value_and_unit() {
        let pending = pending(json!({"type": "weight", "value": 82.5, "unit": "kg"}));
        let intent = ConfirmationIntent {
            intent: IntentKind::Correct,
            corrected_value: Some(83.0),
            corrected_unit: None,
            confidence: 0.9,
            reasoning: None,
        };

        let corrected = apply_correction(&pending, &intent);
        assert_eq!(corrected.arguments["value"], json!(83.0));
        assert_eq!(corrected.arguments["unit"], json!("kg"));
        assert_eq!(corrected.arguments["type"], json!("weight"));
        assert_eq!(corrected.id, "call_1");
    }

    #[test]
    fn test_apply_correction_without_corrections_is_identity() {
        let pending = pending(json!({"type": "weight", "value": 82.5}));
        let intent = ConfirmationIntent {
            intent: IntentKind::Confirm,
            corrected_value: None,
            corrected_unit: None,
            confidence: 1.0,
            reasoning: None,
        };

        let corrected = apply_correction(&pending, &intent);
        assert_eq!(corrected.arguments, pending.tool_call.arguments);
    }
}
