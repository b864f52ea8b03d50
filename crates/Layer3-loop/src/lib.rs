//! # tether-loop
//!
//! Tool-use orchestration for Tether: the iterative loop that lets an LLM
//! call domain tools until it can answer, plus confirmation suspension and
//! deterministic intent classification for mutating actions.

pub mod intent;
pub mod orchestrator;

pub use intent::{apply_correction, classify_confirmation_intent};
pub use orchestrator::{
    continue_tool_loop, run_tool_loop, ConfirmationGate, IterationObserver, ToolLoopConfig,
    ToolLoopResult, DEFAULT_MAX_ITERATIONS, REJECTION_MESSAGE,
};
