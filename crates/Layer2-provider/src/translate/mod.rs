//! Neutral schema tree → provider-native schema formats
//!
//! Translation is deterministic: the same input tree always yields
//! structurally identical output. Unknown or lossy node kinds degrade to an
//! untyped string with a diagnostic warning - a slightly-wrong schema beats
//! refusing to register a tool.

pub mod gemini;
pub mod json_schema;

pub use gemini::{to_gemini_schema, GeminiSchema, GeminiType};
pub use json_schema::to_json_schema;
