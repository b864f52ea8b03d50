//! # tether-foundation
//!
//! Foundation layer for Tether:
//! - Error: 중앙 에러 타입 (central error taxonomy shared by every layer)
//! - Schema: provider-neutral parameter schema tree for tool definitions
//! - Settings: environment-driven LLM configuration

pub mod error;
pub mod schema;
pub mod settings;

// ============================================================================
// Error
// ============================================================================
pub use error::{Error, Result};

// ============================================================================
// Schema (provider-neutral parameter tree)
// ============================================================================
pub use schema::{Schema, SchemaKind};

// ============================================================================
// Settings (environment configuration)
// ============================================================================
pub use settings::{
    LlmSettings, ENV_ANTHROPIC_API_KEY, ENV_GEMINI_API_KEY, ENV_LLM_MODEL, ENV_LLM_PROVIDER,
};
