//! Provider adapter implementations

pub mod claude;
pub mod gemini;

pub use claude::{ClaudeAdapter, ClaudeAdapterConfig};
pub use gemini::{GeminiAdapter, GeminiAdapterConfig};
