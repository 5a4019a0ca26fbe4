//! Tool types for SkillClaw
//!
//! This module defines the core types for tool execution: the `Tool` trait
//! that concrete tools implement, the `ToolExecutor` seam the runner talks
//! to, the `ToolResult` every invocation produces, and the `ToolFilter`
//! that narrows the catalog while a skill is active.

use std::collections::HashSet;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::Result;
use crate::providers::ToolDefinition;
use crate::session::{Message, ToolCall, ToolOutcome};
use crate::skills::ToolPolicy;

/// Tools that a skill policy can never take away.
pub const ESSENTIAL_TOOLS: &[&str] = &[super::skill::SKILL_TOOL_NAME];

/// Tool output as produced by a concrete tool.
#[derive(Debug, Clone, PartialEq)]
pub struct ToolOutput {
    /// Content sent to the model as the tool result. Always required.
    pub for_llm: String,
    /// Whether this result represents an error condition.
    pub is_error: bool,
    /// Path of a file the tool wrote, if any.
    pub written_path: Option<String>,
}

impl ToolOutput {
    /// Successful result.
    pub fn llm_only(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            is_error: false,
            written_path: None,
        }
    }

    /// Error result. The model sees the error text.
    pub fn error(content: impl Into<String>) -> Self {
        Self {
            for_llm: content.into(),
            is_error: true,
            written_path: None,
        }
    }

    /// Mark this output as having written `path`.
    pub fn with_written_path(mut self, path: impl Into<String>) -> Self {
        self.written_path = Some(path.into());
        self
    }
}

/// Trait that all tools must implement.
///
/// # Example
///
/// ```rust
/// use async_trait::async_trait;
/// use serde_json::Value;
/// use skillclaw::tools::{Tool, ToolContext, ToolOutput};
/// use skillclaw::error::Result;
///
/// struct MyTool;
///
/// #[async_trait]
/// impl Tool for MyTool {
///     fn name(&self) -> &str { "my_tool" }
///     fn description(&self) -> &str { "Does something useful" }
///     fn parameters(&self) -> Value {
///         serde_json::json!({
///             "type": "object",
///             "properties": {},
///             "required": []
///         })
///     }
///     async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
///         Ok(ToolOutput::llm_only("Done!"))
///     }
/// }
/// ```
#[async_trait]
pub trait Tool: Send + Sync {
    /// Unique tool name the model uses to call it.
    fn name(&self) -> &str;

    /// Description sent to the model.
    fn description(&self) -> &str;

    /// JSON schema for the tool's parameters.
    fn parameters(&self) -> Value;

    /// Execute the tool with the given arguments.
    ///
    /// Returning `Err` is reported to the model as an execution failure;
    /// it never aborts the conversation.
    async fn execute(&self, args: Value, ctx: &ToolContext) -> Result<ToolOutput>;

    /// Tool definition for the model catalog.
    fn definition(&self) -> ToolDefinition {
        ToolDefinition::new(self.name(), self.description(), self.parameters())
    }
}

/// Lets a tool pause its conversation until the owner answers a question.
///
/// Implemented by background sub-agent sessions.
#[async_trait]
pub trait OwnerInquiry: Send + Sync {
    /// Ask the owner and wait for the answer.
    async fn ask(&self, question: &str) -> Result<String>;
}

/// Context provided to tools during execution.
#[derive(Clone, Default)]
pub struct ToolContext {
    /// Identifier of the owning session (also the owner of spawned sub-agents)
    pub session_id: Option<String>,
    /// The working directory for file operations
    pub working_dir: Option<String>,
    /// The skill currently active in the conversation
    pub active_skill: Option<String>,
    /// Back channel to the owner, present inside sub-agents
    pub inquiry: Option<Arc<dyn OwnerInquiry>>,
}

impl fmt::Debug for ToolContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ToolContext")
            .field("session_id", &self.session_id)
            .field("working_dir", &self.working_dir)
            .field("active_skill", &self.active_skill)
            .field("inquiry", &self.inquiry.is_some())
            .finish()
    }
}

impl ToolContext {
    /// Create a new empty tool context.
    ///
    /// # Example
    /// ```
    /// use skillclaw::tools::ToolContext;
    ///
    /// let ctx = ToolContext::new().with_session("cli:alice").with_working_dir("/tmp/ws");
    /// assert_eq!(ctx.session_id.as_deref(), Some("cli:alice"));
    /// assert_eq!(ctx.working_dir.as_deref(), Some("/tmp/ws"));
    /// ```
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the owning session id.
    pub fn with_session(mut self, session_id: &str) -> Self {
        self.session_id = Some(session_id.to_string());
        self
    }

    /// Set the working directory.
    pub fn with_working_dir(mut self, working_dir: &str) -> Self {
        self.working_dir = Some(working_dir.to_string());
        self
    }

    /// Attach an owner back channel.
    pub fn with_inquiry(mut self, inquiry: Arc<dyn OwnerInquiry>) -> Self {
        self.inquiry = Some(inquiry);
        self
    }
}

/// Machine-readable failure code of a tool invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorCode {
    /// The tool is outside the current allow/deny sets.
    Blocked,
    /// No tool with the requested name exists.
    NotFound,
    /// The arguments were not valid JSON.
    InvalidArguments,
    /// The tool ran and failed.
    ExecutionFailed,
}

impl ToolErrorCode {
    /// Wire name of the code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Blocked => "blocked",
            Self::NotFound => "not_found",
            Self::InvalidArguments => "invalid_arguments",
            Self::ExecutionFailed => "execution_failed",
        }
    }
}

impl fmt::Display for ToolErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of one tool invocation as seen by the runner.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolResult {
    /// ID of the call this result answers
    pub tool_call_id: String,
    /// Tool name
    pub name: String,
    /// Content shown to the model
    pub content: String,
    /// Whether the invocation succeeded
    pub ok: bool,
    /// Failure code, if any
    pub error_code: Option<ToolErrorCode>,
    /// Whether retrying the same call may succeed
    pub retryable: Option<bool>,
    /// Path of a file written successfully
    pub written_path: Option<String>,
}

impl ToolResult {
    /// Successful result.
    pub fn success(call: &ToolCall, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            ok: true,
            error_code: None,
            retryable: None,
            written_path: None,
        }
    }

    /// Failed result with a code.
    pub fn failure(call: &ToolCall, code: ToolErrorCode, content: impl Into<String>) -> Self {
        Self {
            tool_call_id: call.id.clone(),
            name: call.name.clone(),
            content: content.into(),
            ok: false,
            error_code: Some(code),
            retryable: None,
            written_path: None,
        }
    }

    /// Result for a call the current filter does not permit.
    pub fn blocked(call: &ToolCall) -> Self {
        Self::failure(
            call,
            ToolErrorCode::Blocked,
            format!(
                "Error: tool '{}' is not available in the current context",
                call.name
            ),
        )
    }

    /// Returns `true` if the call was rejected by policy.
    pub fn is_blocked(&self) -> bool {
        self.error_code == Some(ToolErrorCode::Blocked)
    }

    /// Structured outcome to attach to the transcript message.
    pub fn outcome(&self) -> ToolOutcome {
        ToolOutcome {
            ok: self.ok,
            error_code: self.error_code.map(|c| c.as_str().to_string()),
            written_path: self.written_path.clone(),
        }
    }

    /// Transcript message for this result.
    pub fn to_message(&self) -> Message {
        Message::tool_result(&self.tool_call_id, &self.content)
            .with_name(&self.name)
            .with_outcome(self.outcome())
    }
}

/// Runtime narrowing of the tool catalog.
///
/// `allow == None` means every tool is allowed. Essential tools survive
/// any policy.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ToolFilter {
    /// Names allowed, or `None` for all
    pub allow: Option<HashSet<String>>,
    /// Names refused
    pub deny: HashSet<String>,
}

impl ToolFilter {
    /// A filter permitting everything.
    pub fn open() -> Self {
        Self::default()
    }

    /// Filter derived from a skill tool policy.
    ///
    /// # Example
    /// ```
    /// use skillclaw::skills::ToolPolicy;
    /// use skillclaw::tools::ToolFilter;
    ///
    /// let policy = ToolPolicy::new(Some(vec!["read_file".into()]), Some(vec!["skill".into()]));
    /// let filter = ToolFilter::from_policy(policy.as_ref());
    /// assert!(filter.permits("read_file"));
    /// assert!(filter.permits("skill"));
    /// assert!(!filter.permits("shell"));
    /// ```
    pub fn from_policy(policy: Option<&ToolPolicy>) -> Self {
        let Some(policy) = policy else {
            return Self::open();
        };
        let allow = policy.allow.as_ref().map(|names| {
            names
                .iter()
                .cloned()
                .chain(ESSENTIAL_TOOLS.iter().map(|s| s.to_string()))
                .collect::<HashSet<_>>()
        });
        let deny = policy
            .deny
            .iter()
            .flatten()
            .filter(|name| !ESSENTIAL_TOOLS.contains(&name.as_str()))
            .cloned()
            .collect();
        Self { allow, deny }
    }

    /// Add more refused names (e.g. circuit-broken tools).
    pub fn deny_also<'a>(mut self, names: impl IntoIterator<Item = &'a String>) -> Self {
        self.deny.extend(names.into_iter().cloned());
        self
    }

    /// Returns `true` if `name` may be offered and invoked.
    pub fn permits(&self, name: &str) -> bool {
        if self.deny.contains(name) {
            return false;
        }
        self.allow.as_ref().map_or(true, |a| a.contains(name))
    }
}

/// The seam between the runner and concrete tools.
///
/// Tool-level failure is always reported inside the returned
/// [`ToolResult`]; implementations never fail the call itself.
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    /// Definitions of the tools permitted by `filter`.
    fn catalog(&self, filter: &ToolFilter) -> Vec<ToolDefinition>;

    /// Invoke one call against the running transcript.
    async fn invoke(
        &self,
        call: &ToolCall,
        transcript: &[Message],
        filter: &ToolFilter,
        ctx: &ToolContext,
    ) -> ToolResult;
}
