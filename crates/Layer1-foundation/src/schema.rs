//! Provider-neutral parameter schema tree
//!
//! Tool parameters are described once with this tree and translated into
//! each provider's native function-declaration vocabulary by the provider
//! layer. Object property order is preserved so a schema translates to
//! structurally identical output every time.

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A node in the parameter schema tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    /// What kind of value this node describes
    pub kind: SchemaKind,

    /// Human-readable description attached to the node
    pub description: Option<String>,
}

/// Supported schema node kinds
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum SchemaKind {
    /// UTF-8 string
    String,

    /// Number (integer or float)
    Number,

    /// Boolean
    Boolean,

    /// Homogeneous array with an element schema
    Array(Box<Schema>),

    /// Object with named properties, in declaration order
    Object(Vec<(String, Schema)>),

    /// String enumeration with an explicit allowed-value list
    Enum(Vec<String>),

    /// A literal value; the primitive type is implied by the value
    Literal(Value),

    /// The wrapped schema may be omitted entirely
    Optional(Box<Schema>),

    /// The wrapped schema has a default when omitted
    Default(Box<Schema>, Value),

    /// The wrapped schema also accepts null
    Nullable(Box<Schema>),

    /// One of several alternatives (translated lossily via the first)
    Union(Vec<Schema>),

    /// Open object with unknown properties
    Map,
}

impl Schema {
    fn new(kind: SchemaKind) -> Self {
        Self {
            kind,
            description: None,
        }
    }

    /// String schema
    pub fn string() -> Self {
        Self::new(SchemaKind::String)
    }

    /// Number schema
    pub fn number() -> Self {
        Self::new(SchemaKind::Number)
    }

    /// Boolean schema
    pub fn boolean() -> Self {
        Self::new(SchemaKind::Boolean)
    }

    /// Array schema with the given element schema
    pub fn array(element: Schema) -> Self {
        Self::new(SchemaKind::Array(Box::new(element)))
    }

    /// Object schema from (name, schema) pairs, order preserved
    pub fn object(properties: impl IntoIterator<Item = (impl Into<String>, Schema)>) -> Self {
        Self::new(SchemaKind::Object(
            properties
                .into_iter()
                .map(|(name, schema)| (name.into(), schema))
                .collect(),
        ))
    }

    /// String enumeration schema
    pub fn enumeration(values: impl IntoIterator<Item = impl Into<String>>) -> Self {
        Self::new(SchemaKind::Enum(
            values.into_iter().map(Into::into).collect(),
        ))
    }

    /// Literal value schema
    pub fn literal(value: Value) -> Self {
        Self::new(SchemaKind::Literal(value))
    }

    /// Union of alternative schemas
    pub fn union(options: impl IntoIterator<Item = Schema>) -> Self {
        Self::new(SchemaKind::Union(options.into_iter().collect()))
    }

    /// Open object schema without declared properties
    pub fn map() -> Self {
        Self::new(SchemaKind::Map)
    }

    /// Attach a description to this node
    pub fn describe(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    /// Mark this schema as optional
    pub fn optional(self) -> Self {
        Self::new(SchemaKind::Optional(Box::new(self)))
    }

    /// Mark this schema as having a default value
    pub fn default_value(self, value: Value) -> Self {
        Self::new(SchemaKind::Default(Box::new(self), value))
    }

    /// Mark this schema as nullable
    pub fn nullable(self) -> Self {
        Self::new(SchemaKind::Nullable(Box::new(self)))
    }

    /// True if this node is wrapped in optional/default/nullable.
    ///
    /// A property of an object is required iff this returns false; the
    /// wrappers never change the node's own translated type.
    pub fn is_optional_like(&self) -> bool {
        matches!(
            self.kind,
            SchemaKind::Optional(_) | SchemaKind::Default(_, _) | SchemaKind::Nullable(_)
        )
    }

    /// Strip optional/default/nullable wrappers down to the inner schema
    pub fn unwrap_modifiers(&self) -> &Schema {
        match &self.kind {
            SchemaKind::Optional(inner)
            | SchemaKind::Default(inner, _)
            | SchemaKind::Nullable(inner) => inner.unwrap_modifiers(),
            _ => self,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_object_preserves_property_order() {
        let schema = Schema::object([
            ("zulu", Schema::string()),
            ("alpha", Schema::number()),
            ("mike", Schema::boolean()),
        ]);

        match schema.kind {
            SchemaKind::Object(props) => {
                let names: Vec<&str> = props.iter().map(|(n, _)| n.as_str()).collect();
                assert_eq!(names, vec!["zulu", "alpha", "mike"]);
            }
            _ => panic!("expected object"),
        }
    }

    #[test]
    fn test_optional_like_detection() {
        assert!(Schema::string().optional().is_optional_like());
        assert!(Schema::number().default_value(json!(0)).is_optional_like());
        assert!(Schema::boolean().nullable().is_optional_like());
        assert!(!Schema::string().is_optional_like());
        // Wrapping changes the parent's required derivation, not the type
        assert!(!Schema::array(Schema::string().optional()).is_optional_like());
    }

    #[test]
    fn test_unwrap_modifiers_strips_nesting() {
        let schema = Schema::string()
            .describe("user name")
            .optional()
            .nullable();
        let inner = schema.unwrap_modifiers();
        assert_eq!(inner.kind, SchemaKind::String);
        assert_eq!(inner.description.as_deref(), Some("user name"));
    }

    #[test]
    fn test_description_attaches_to_node() {
        let schema = Schema::enumeration(["weight", "expense"]).describe("metric type");
        assert_eq!(schema.description.as_deref(), Some("metric type"));
    }
}
