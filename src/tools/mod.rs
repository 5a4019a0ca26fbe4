//! Tools module - Tool definitions and execution for LLM function calling
//!
//! Concrete file, shell and web tools live outside this crate; they plug in
//! through the [`Tool`] trait. The runner only talks to a [`ToolExecutor`],
//! of which [`ToolRegistry`] is the reference implementation.
//!
//! # Overview
//!
//! - `Tool` trait: The interface that all tools must implement
//! - `ToolContext`: Execution context (owning session, working dir, active skill)
//! - `ToolExecutor`: Catalog plus invocation, never failing for tool-level errors
//! - `ToolFilter`: The allow/deny view an active skill imposes on the catalog
//!
//! # Built-in Tools
//!
//! - `SkillTool`: Activates a skill mid-conversation
//! - `AskUserQuestionTool`: Pauses a sub-agent until the owner answers
//! - `SpawnSubAgentTool`, `CheckSubAgentTool`, `StopSubAgentTool`,
//!   `ResumeSubAgentTool`: Background task control
//! - `EchoTool`: Simple echo tool for testing
//!
//! # Example
//!
//! ```rust
//! use skillclaw::session::ToolCall;
//! use skillclaw::tools::{EchoTool, ToolContext, ToolErrorCode, ToolExecutor, ToolFilter, ToolRegistry};
//!
//! # tokio_test::block_on(async {
//! let mut registry = ToolRegistry::new();
//! registry.register(Box::new(EchoTool));
//!
//! // A filter that only allows `read_file` blocks everything else
//! let filter = ToolFilter {
//!     allow: Some(["read_file".to_string()].into_iter().collect()),
//!     ..ToolFilter::open()
//! };
//! let call = ToolCall::new("c1", "echo", r#"{"message": "hi"}"#);
//! let result = registry.invoke(&call, &[], &filter, &ToolContext::new()).await;
//! assert_eq!(result.error_code, Some(ToolErrorCode::Blocked));
//! # });
//! ```

pub mod ask;
mod registry;
pub mod skill;
pub mod subagent;
mod types;

pub use ask::{AskUserQuestionTool, ASK_TOOL_NAME};
pub use registry::ToolRegistry;
pub use skill::{SkillTool, SKILL_TOOL_NAME};
pub use subagent::{CheckSubAgentTool, ResumeSubAgentTool, SpawnSubAgentTool, StopSubAgentTool};
pub use types::{
    OwnerInquiry, Tool, ToolContext, ToolErrorCode, ToolExecutor, ToolFilter, ToolOutput,
    ToolResult, ESSENTIAL_TOOLS,
};

use async_trait::async_trait;
use serde_json::Value;

use crate::error::Result;

/// A simple echo tool for testing purposes.
///
/// # Example
///
/// ```rust
/// use skillclaw::tools::{Tool, ToolContext, EchoTool};
/// use serde_json::json;
///
/// # tokio_test::block_on(async {
/// let tool = EchoTool;
/// let ctx = ToolContext::new();
/// let result = tool.execute(json!({"message": "Hello"}), &ctx).await;
/// assert_eq!(result.unwrap().for_llm, "Hello");
/// # });
/// ```
pub struct EchoTool;

#[async_trait]
impl Tool for EchoTool {
    fn name(&self) -> &str {
        "echo"
    }

    fn description(&self) -> &str {
        "Echoes back the provided message"
    }

    fn parameters(&self) -> Value {
        serde_json::json!({
            "type": "object",
            "properties": {
                "message": {
                    "type": "string",
                    "description": "The message to echo"
                }
            },
            "required": ["message"]
        })
    }

    async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
        let message = args
            .get("message")
            .and_then(|v| v.as_str())
            .unwrap_or("(no message)");
        Ok(ToolOutput::llm_only(message))
    }
}
