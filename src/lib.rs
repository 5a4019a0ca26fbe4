//! SkillClaw - Skill-driven agent runtime
//!
//! A tool-using conversation loop that can narrow or widen its own tool
//! access through skills, keeps long transcripts under the context window
//! without model calls, and hands long tasks to background sub-agents.

pub mod agent;
pub mod channels;
pub mod config;
pub mod error;
pub mod memory;
pub mod providers;
pub mod session;
pub mod skills;
pub mod subagent;
pub mod tools;
pub mod utils;

pub use agent::{AgentSession, ContextCompressor, ConversationRunner, RunOutcome, RunnerOptions};
pub use config::Config;
pub use error::{ClawError, ProviderError, Result};
pub use providers::{ChatOptions, LLMProvider, LLMResponse, LLMToolCall, ToolDefinition, Usage};
pub use session::{Message, Role, ToolCall};
pub use subagent::{SubAgentManager, SubAgentStatus};
