//! Neutral schema → JSON Schema (Claude tool input_schema)

use serde_json::{json, Map, Value};
use tether_foundation::{Schema, SchemaKind};
use tracing::warn;

/// Convert a neutral schema tree to a JSON Schema value.
///
/// Same recursion rules as the Gemini translator: wrappers unwrap first,
/// required-iff-unwrapped, lossy kinds degrade to `{"type": "string"}`.
pub fn to_json_schema(schema: &Schema) -> Value {
    match &schema.kind {
        SchemaKind::Optional(inner)
        | SchemaKind::Default(inner, _)
        | SchemaKind::Nullable(inner) => to_json_schema(inner),

        SchemaKind::String => primitive("string", schema),
        SchemaKind::Number => primitive("number", schema),
        SchemaKind::Boolean => primitive("boolean", schema),

        SchemaKind::Array(element) => {
            let mut out = primitive_map("array", schema);
            out.insert("items".to_string(), to_json_schema(element));
            Value::Object(out)
        }

        SchemaKind::Enum(values) => {
            let mut out = primitive_map("string", schema);
            out.insert("enum".to_string(), json!(values));
            Value::Object(out)
        }

        SchemaKind::Object(props) => {
            let mut properties = Map::new();
            let mut required = Vec::new();

            for (name, prop) in props {
                properties.insert(name.clone(), to_json_schema(prop));
                if !prop.is_optional_like() {
                    required.push(name.clone());
                }
            }

            let mut out = primitive_map("object", schema);
            out.insert("properties".to_string(), Value::Object(properties));
            if !required.is_empty() {
                out.insert("required".to_string(), json!(required));
            }
            Value::Object(out)
        }

        SchemaKind::Literal(value) => match value {
            Value::String(s) => {
                let mut out = primitive_map("string", schema);
                out.insert("enum".to_string(), json!([s]));
                Value::Object(out)
            }
            Value::Number(_) => primitive("number", schema),
            Value::Bool(_) => primitive("boolean", schema),
            other => {
                warn!("unsupported literal kind {:?}, falling back to string", other);
                primitive("string", schema)
            }
        },

        SchemaKind::Union(options) => match options.first() {
            Some(first) => to_json_schema(first),
            None => {
                warn!("empty union schema, falling back to string");
                primitive("string", schema)
            }
        },

        SchemaKind::Map => primitive("object", schema),
    }
}

fn primitive_map(type_tag: &str, schema: &Schema) -> Map<String, Value> {
    let mut out = Map::new();
    out.insert("type".to_string(), json!(type_tag));
    if let Some(description) = &schema.description {
        out.insert("description".to_string(), json!(description));
    }
    out
}

fn primitive(type_tag: &str, schema: &Schema) -> Value {
    Value::Object(primitive_map(type_tag, schema))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_object_shape() {
        let schema = Schema::object([
            ("name", Schema::string().describe("User name")),
            ("age", Schema::number().optional()),
        ]);
        let out = to_json_schema(&schema);

        assert_eq!(out["type"], "object");
        assert_eq!(out["properties"]["name"]["type"], "string");
        assert_eq!(out["properties"]["name"]["description"], "User name");
        assert_eq!(out["properties"]["age"]["type"], "number");
        assert_eq!(out["required"], json!(["name"]));
    }

    #[test]
    fn test_array_and_enum() {
        let out = to_json_schema(&Schema::array(Schema::enumeration(["a", "b"])));
        assert_eq!(out["type"], "array");
        assert_eq!(out["items"]["type"], "string");
        assert_eq!(out["items"]["enum"], json!(["a", "b"]));
    }

    #[test]
    fn test_wrappers_unwrap_to_inner_type() {
        let out = to_json_schema(&Schema::boolean().nullable());
        assert_eq!(out["type"], "boolean");
    }

    #[test]
    fn test_string_literal() {
        let out = to_json_schema(&Schema::literal(json!("confirm")));
        assert_eq!(out["type"], "string");
        assert_eq!(out["enum"], json!(["confirm"]));
    }

    #[test]
    fn test_idempotent_translation() {
        let schema = Schema::object([
            ("intent", Schema::enumeration(["confirm", "reject", "correct"])),
            ("confidence", Schema::number()),
            ("reasoning", Schema::string().optional()),
        ]);
        assert_eq!(to_json_schema(&schema), to_json_schema(&schema));
    }

    #[test]
    fn test_empty_object_has_no_required() {
        let out = to_json_schema(&Schema::object(std::iter::empty::<(String, Schema)>()));
        assert_eq!(out["type"], "object");
        assert!(out.get("required").is_none());
    }
}
