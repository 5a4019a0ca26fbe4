//! Agent module - Core AI agent logic and conversation handling
//!
//! - [`ConversationRunner`] drives one run: model turn, tool calls, repeat
//! - [`ContextCompressor`] keeps the transcript under the token budget
//! - [`AgentSession`] owns a durable transcript and serves owner messages
//! - [`TokenEstimator`] is the shared size heuristic
//!
//! # Architecture
//!
//! ```text
//! ┌──────────────┐     ┌────────────────────┐     ┌─────────────┐
//! │ AgentSession │────>│ ConversationRunner │────>│ LLMProvider │
//! │ (transcript) │     │                    │     │             │
//! └──────────────┘     └────────────────────┘     └─────────────┘
//!        │                  │           │
//!        │                  ▼           ▼
//!        │        ┌───────────────┐  ┌──────────────┐
//!        │        │   Context     │  │ ToolExecutor │
//!        │        │  Compressor   │  │  (registry)  │
//!        │        └───────────────┘  └──────────────┘
//!        ▼
//! ┌──────────────┐
//! │ MemoryStore  │
//! └──────────────┘
//! ```

pub mod compaction;
pub mod runner;
mod session;
pub mod tokens;

pub use compaction::{CompactionMode, CompactionUnit, ContextCompressor, ContextUsage};
pub use runner::{
    ConversationRunner, RunOutcome, RunnerObserver, RunnerOptions, FAILURE_THRESHOLD,
    MAX_TURNS_SENTINEL,
};
pub use session::{
    AgentSession, CommandResult, DestroyOutcome, BUSY_MESSAGE, LONG_TERM_MEMORY_PREFIX,
    SESSION_CONTEXT_PREFIX, SUBAGENT_STATUS_PREFIX,
};
pub use tokens::TokenEstimator;
