//! Neutral schema → Gemini function-declaration schema
//!
//! Gemini uses its own type vocabulary instead of JSON Schema, so the
//! neutral tree is rewritten into [`GeminiSchema`] nodes.

use std::collections::BTreeMap;

use serde::Serialize;
use serde_json::Value;
use tether_foundation::{Schema, SchemaKind};
use tracing::warn;

/// Gemini type tags
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GeminiType {
    String,
    Number,
    Boolean,
    Array,
    Object,
}

/// Gemini-compatible schema node
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GeminiSchema {
    /// The type of the schema
    #[serde(rename = "type")]
    pub schema_type: GeminiType,

    /// Description of the field
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Properties for object types (sorted for stable serialization)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, GeminiSchema>>,

    /// Schema for array items
    #[serde(skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<GeminiSchema>>,

    /// Required field names for object types, in declaration order
    #[serde(skip_serializing_if = "Option::is_none")]
    pub required: Option<Vec<String>>,

    /// Allowed values for enum types
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub allowed_values: Option<Vec<String>>,
}

impl GeminiSchema {
    fn plain(schema_type: GeminiType, description: Option<String>) -> Self {
        Self {
            schema_type,
            description,
            properties: None,
            items: None,
            required: None,
            allowed_values: None,
        }
    }
}

/// Convert a neutral schema tree to a Gemini-compatible schema.
///
/// Recursive depth-first: wrappers are unwrapped first (they only affect
/// the parent object's required list), primitives map 1:1, enums become
/// STRING with an allowed-value list, literals take the type implied by
/// their value. Lossy kinds fall back to STRING with a warning.
pub fn to_gemini_schema(schema: &Schema) -> GeminiSchema {
    match &schema.kind {
        // Wrappers first - their presence changes required derivation only
        SchemaKind::Optional(inner)
        | SchemaKind::Default(inner, _)
        | SchemaKind::Nullable(inner) => to_gemini_schema(inner),

        SchemaKind::String => GeminiSchema::plain(GeminiType::String, schema.description.clone()),
        SchemaKind::Number => GeminiSchema::plain(GeminiType::Number, schema.description.clone()),
        SchemaKind::Boolean => GeminiSchema::plain(GeminiType::Boolean, schema.description.clone()),

        SchemaKind::Array(element) => GeminiSchema {
            items: Some(Box::new(to_gemini_schema(element))),
            ..GeminiSchema::plain(GeminiType::Array, schema.description.clone())
        },

        SchemaKind::Enum(values) => GeminiSchema {
            allowed_values: Some(values.clone()),
            ..GeminiSchema::plain(GeminiType::String, schema.description.clone())
        },

        SchemaKind::Object(props) => {
            let mut properties = BTreeMap::new();
            let mut required = Vec::new();

            for (name, prop) in props {
                properties.insert(name.clone(), to_gemini_schema(prop));
                // Required iff not wrapped in optional/default/nullable
                if !prop.is_optional_like() {
                    required.push(name.clone());
                }
            }

            GeminiSchema {
                properties: Some(properties),
                required: (!required.is_empty()).then_some(required),
                ..GeminiSchema::plain(GeminiType::Object, schema.description.clone())
            }
        }

        SchemaKind::Literal(value) => match value {
            Value::String(s) => GeminiSchema {
                allowed_values: Some(vec![s.clone()]),
                ..GeminiSchema::plain(GeminiType::String, schema.description.clone())
            },
            Value::Number(_) => GeminiSchema::plain(GeminiType::Number, schema.description.clone()),
            Value::Bool(_) => GeminiSchema::plain(GeminiType::Boolean, schema.description.clone()),
            other => {
                warn!("unsupported literal kind {:?}, falling back to STRING", other);
                GeminiSchema::plain(GeminiType::String, schema.description.clone())
            }
        },

        // Lossy: use the first option
        SchemaKind::Union(options) => match options.first() {
            Some(first) => to_gemini_schema(first),
            None => {
                warn!("empty union schema, falling back to STRING");
                GeminiSchema::plain(GeminiType::String, schema.description.clone())
            }
        },

        // Open object: no declared properties
        SchemaKind::Map => GeminiSchema::plain(GeminiType::Object, schema.description.clone()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_primitives_map_one_to_one() {
        assert_eq!(
            to_gemini_schema(&Schema::string()).schema_type,
            GeminiType::String
        );
        assert_eq!(
            to_gemini_schema(&Schema::number()).schema_type,
            GeminiType::Number
        );
        assert_eq!(
            to_gemini_schema(&Schema::boolean()).schema_type,
            GeminiType::Boolean
        );
    }

    #[test]
    fn test_description_carried() {
        let out = to_gemini_schema(&Schema::string().describe("User name"));
        assert_eq!(out.description.as_deref(), Some("User name"));
    }

    #[test]
    fn test_array_recurses_into_items() {
        let out = to_gemini_schema(&Schema::array(Schema::array(Schema::number())));
        assert_eq!(out.schema_type, GeminiType::Array);
        let inner = out.items.unwrap();
        assert_eq!(inner.schema_type, GeminiType::Array);
        assert_eq!(inner.items.unwrap().schema_type, GeminiType::Number);
    }

    #[test]
    fn test_enum_becomes_string_with_values() {
        let out = to_gemini_schema(&Schema::enumeration(["weight", "expense"]));
        assert_eq!(out.schema_type, GeminiType::String);
        assert_eq!(
            out.allowed_values,
            Some(vec!["weight".to_string(), "expense".to_string()])
        );
    }

    #[test]
    fn test_object_required_derivation() {
        let schema = Schema::object([
            ("name", Schema::string()),
            ("age", Schema::number().optional()),
            ("nickname", Schema::string().nullable()),
            ("unit", Schema::string().default_value(json!("kg"))),
        ]);
        let out = to_gemini_schema(&schema);

        assert_eq!(out.schema_type, GeminiType::Object);
        assert_eq!(out.required, Some(vec!["name".to_string()]));
        let props = out.properties.unwrap();
        // Wrappers affect required only, never the node's own type
        assert_eq!(props["age"].schema_type, GeminiType::Number);
        assert_eq!(props["nickname"].schema_type, GeminiType::String);
        assert_eq!(props["unit"].schema_type, GeminiType::String);
    }

    #[test]
    fn test_object_with_no_required_omits_list() {
        let out = to_gemini_schema(&Schema::object([("q", Schema::string().optional())]));
        assert_eq!(out.required, None);
    }

    #[test]
    fn test_required_derivation_across_wrapper_combinations() {
        // Property-based over all wrapper combinations: required iff bare
        let wrappers: Vec<(&str, fn(Schema) -> Schema)> = vec![
            ("bare", |s| s),
            ("optional", |s| s.optional()),
            ("default", |s| s.default_value(json!("x"))),
            ("nullable", |s| s.nullable()),
        ];

        for (name, wrap) in wrappers {
            let schema = Schema::object([("field", wrap(Schema::string()))]);
            let out = to_gemini_schema(&schema);
            let is_required = out
                .required
                .as_ref()
                .is_some_and(|r| r.contains(&"field".to_string()));
            assert_eq!(is_required, name == "bare", "wrapper {}", name);
        }
    }

    #[test]
    fn test_string_literal_single_value_enum() {
        let out = to_gemini_schema(&Schema::literal(json!("confirm")));
        assert_eq!(out.schema_type, GeminiType::String);
        assert_eq!(out.allowed_values, Some(vec!["confirm".to_string()]));
    }

    #[test]
    fn test_number_and_bool_literals() {
        assert_eq!(
            to_gemini_schema(&Schema::literal(json!(5))).schema_type,
            GeminiType::Number
        );
        assert_eq!(
            to_gemini_schema(&Schema::literal(json!(true))).schema_type,
            GeminiType::Boolean
        );
    }

    #[test]
    fn test_union_uses_first_option() {
        let out = to_gemini_schema(&Schema::union([Schema::number(), Schema::string()]));
        assert_eq!(out.schema_type, GeminiType::Number);
    }

    #[test]
    fn test_lossy_kinds_fall_back_to_string() {
        assert_eq!(
            to_gemini_schema(&Schema::union([])).schema_type,
            GeminiType::String
        );
        assert_eq!(
            to_gemini_schema(&Schema::literal(json!(null))).schema_type,
            GeminiType::String
        );
    }

    #[test]
    fn test_map_is_open_object() {
        let out = to_gemini_schema(&Schema::map());
        assert_eq!(out.schema_type, GeminiType::Object);
        assert!(out.properties.is_none());
    }

    #[test]
    fn test_translation_is_idempotent() {
        let schema = Schema::object([
            ("type", Schema::enumeration(["weight", "expense"]).describe("Metric type")),
            ("value", Schema::number().describe("Metric value")),
            ("tags", Schema::array(Schema::string()).optional()),
            (
                "meta",
                Schema::object([("source", Schema::string().optional())]).optional(),
            ),
        ]);

        let first = to_gemini_schema(&schema);
        let second = to_gemini_schema(&schema);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }

    #[test]
    fn test_serialization_shape() {
        let out = to_gemini_schema(&Schema::object([(
            "query",
            Schema::string().describe("Search query"),
        )]));
        let json = serde_json::to_value(&out).unwrap();
        assert_eq!(json["type"], "OBJECT");
        assert_eq!(json["properties"]["query"]["type"], "STRING");
        assert_eq!(json["required"], json!(["query"]));
    }
}
