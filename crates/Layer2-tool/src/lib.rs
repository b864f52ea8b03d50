//! # tether-tool
//!
//! Tool-side building blocks for Tether:
//! - Catalog: the static, partitioned set of tool definitions
//! - Executor: the boundary where domain logic runs tool calls
//! - Confirmation: pending-confirmation model and intent classification

pub mod catalog;
pub mod confirmation;
pub mod executor;

pub use catalog::ToolCatalog;
pub use confirmation::{
    intent_tool, ConfirmationIntent, ConfirmationMessages, IntentKind, PendingToolConfirmation,
    DEFAULT_CONFIRMATION_TTL_HOURS, INTENT_TOOL_NAME,
};
pub use executor::{
    HandlerExecutor, ToolExecutionContext, ToolExecutionResult, ToolExecutor, ToolHandler,
};
