//! Tool definitions for LLM function calling

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tether_foundation::{Schema, SchemaKind};

/// Definition of a tool that can be called by the LLM
///
/// Parameters are described with the neutral [`Schema`] tree and translated
/// into each provider's native format by the adapters.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name (unique, snake_case)
    pub name: String,

    /// Human-readable description
    pub description: String,

    /// Parameter schema (always an object at the top level)
    pub parameters: Schema,

    /// Whether user confirmation is required before execution
    #[serde(default)]
    pub requires_confirmation: bool,

    /// Input examples for improved call accuracy (2-4 recommended)
    #[serde(default)]
    pub examples: Vec<Value>,
}

impl ToolDefinition {
    /// Create a new tool definition with an empty parameter object
    pub fn new(name: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            parameters: Schema::object(std::iter::empty::<(String, Schema)>()),
            requires_confirmation: false,
            examples: vec![],
        }
    }

    /// Add a parameter with a full schema
    pub fn with_param(mut self, name: impl Into<String>, schema: Schema) -> Self {
        if let SchemaKind::Object(ref mut props) = self.parameters.kind {
            props.push((name.into(), schema));
        }
        self
    }

    /// Add a string parameter
    pub fn with_string_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let schema = Schema::string().describe(description);
        self.with_param(name, if required { schema } else { schema.optional() })
    }

    /// Add a number parameter
    pub fn with_number_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let schema = Schema::number().describe(description);
        self.with_param(name, if required { schema } else { schema.optional() })
    }

    /// Add a boolean parameter
    pub fn with_boolean_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        required: bool,
    ) -> Self {
        let schema = Schema::boolean().describe(description);
        self.with_param(name, if required { schema } else { schema.optional() })
    }

    /// Add an enum parameter
    pub fn with_enum_param(
        self,
        name: impl Into<String>,
        description: impl Into<String>,
        values: Vec<&str>,
        required: bool,
    ) -> Self {
        let schema = Schema::enumeration(values).describe(description);
        self.with_param(name, if required { schema } else { schema.optional() })
    }

    /// Mark this tool as requiring user confirmation before execution
    pub fn with_confirmation(mut self) -> Self {
        self.requires_confirmation = true;
        self
    }

    /// Attach input examples
    pub fn with_examples(mut self, examples: Vec<Value>) -> Self {
        self.examples = examples;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_builder_collects_params_in_order() {
        let tool = ToolDefinition::new("record_metric", "Records a metric for the user.")
            .with_enum_param("type", "Metric type", vec!["weight", "expense"], true)
            .with_number_param("value", "Metric value", true)
            .with_string_param("unit", "Unit of measure", false);

        match &tool.parameters.kind {
            SchemaKind::Object(props) => {
                let names: Vec<&str> = props.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["type", "value", "unit"]);
                assert!(!props[0].1.is_optional_like());
                assert!(props[2].1.is_optional_like());
            }
            _ => panic!("expected object parameters"),
        }
    }

    #[test]
    fn test_confirmation_flag_defaults_off() {
        let read = ToolDefinition::new("get_history", "Reads history.");
        let write = ToolDefinition::new("record_metric", "Records.").with_confirmation();
        assert!(!read.requires_confirmation);
        assert!(write.requires_confirmation);
    }

    #[test]
    fn test_examples_attach() {
        let tool = ToolDefinition::new("record_metric", "Records.")
            .with_examples(vec![json!({"type": "weight", "value": 82.5})]);
        assert_eq!(tool.examples.len(), 1);
    }
}
