//! Tool registry for SkillClaw
//!
//! This module provides the `ToolRegistry` struct for managing and executing
//! tools. It is the reference [`ToolExecutor`]: every failure mode (policy
//! block, unknown name, malformed arguments, tool error) comes back as a
//! failed [`ToolResult`] instead of an `Err`.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Instant;

use async_trait::async_trait;
use serde_json::Value;
use tracing::{debug, error, info, warn};

use crate::providers::ToolDefinition;
use crate::session::{Message, ToolCall};

use super::types::{Tool, ToolContext, ToolErrorCode, ToolExecutor, ToolFilter, ToolResult};

/// A registry that holds and manages tools.
///
/// # Example
///
/// ```rust
/// use skillclaw::session::ToolCall;
/// use skillclaw::tools::{EchoTool, ToolContext, ToolExecutor, ToolFilter, ToolRegistry};
///
/// # tokio_test::block_on(async {
/// let mut registry = ToolRegistry::new();
/// registry.register(Box::new(EchoTool));
/// assert!(registry.has("echo"));
///
/// let call = ToolCall::new("c1", "echo", r#"{"message": "hello"}"#);
/// let result = registry
///     .invoke(&call, &[], &ToolFilter::open(), &ToolContext::new())
///     .await;
/// assert!(result.ok);
/// assert_eq!(result.content, "hello");
/// # });
/// ```
#[derive(Default)]
pub struct ToolRegistry {
    tools: HashMap<String, Arc<dyn Tool>>,
}

impl ToolRegistry {
    /// Create a new empty tool registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new tool in the registry.
    ///
    /// If a tool with the same name already exists, it will be replaced.
    pub fn register(&mut self, tool: Box<dyn Tool>) {
        let name = tool.name().to_string();
        info!(tool = %name, "Registering tool");
        self.tools.insert(name, Arc::from(tool));
    }

    /// Get a tool by name.
    pub fn get(&self, name: &str) -> Option<&dyn Tool> {
        self.tools.get(name).map(|t| t.as_ref())
    }

    /// Check if a tool is registered.
    pub fn has(&self, name: &str) -> bool {
        self.tools.contains_key(name)
    }

    /// Sorted names of all registered tools.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.tools.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }

    /// Number of registered tools.
    pub fn len(&self) -> usize {
        self.tools.len()
    }

    /// Returns `true` if no tools are registered.
    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// All tool definitions, sorted by name.
    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.catalog(&ToolFilter::open())
    }
}

fn parse_arguments(raw: &str) -> std::result::Result<Value, serde_json::Error> {
    if raw.trim().is_empty() {
        return Ok(Value::Object(Default::default()));
    }
    serde_json::from_str(raw)
}

#[async_trait]
impl ToolExecutor for ToolRegistry {
    fn catalog(&self, filter: &ToolFilter) -> Vec<ToolDefinition> {
        let mut defs: Vec<ToolDefinition> = self
            .tools
            .values()
            .filter(|t| filter.permits(t.name()))
            .map(|t| t.definition())
            .collect();
        defs.sort_by(|a, b| a.name.cmp(&b.name));
        defs
    }

    async fn invoke(
        &self,
        call: &ToolCall,
        transcript: &[Message],
        filter: &ToolFilter,
        ctx: &ToolContext,
    ) -> ToolResult {
        if !filter.permits(&call.name) {
            warn!(tool = %call.name, "Tool call blocked by active policy");
            return ToolResult::blocked(call);
        }

        let Some(tool) = self.tools.get(&call.name) else {
            warn!(tool = %call.name, "Tool not found");
            return ToolResult::failure(
                call,
                ToolErrorCode::NotFound,
                format!("Error: tool '{}' not found", call.name),
            );
        };

        let args = match parse_arguments(&call.arguments) {
            Ok(v) => v,
            Err(e) => {
                warn!(tool = %call.name, error = %e, "Invalid JSON in tool arguments");
                return ToolResult::failure(
                    call,
                    ToolErrorCode::InvalidArguments,
                    format!("Error: invalid arguments for tool '{}': {}", call.name, e),
                );
            }
        };

        debug!(tool = %call.name, transcript_len = transcript.len(), "Executing tool");
        let start = Instant::now();

        match tool.execute(args, ctx).await {
            Ok(output) if output.is_error => {
                warn!(
                    tool = %call.name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool reported an error"
                );
                ToolResult::failure(call, ToolErrorCode::ExecutionFailed, output.for_llm)
            }
            Ok(output) => {
                info!(
                    tool = %call.name,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool executed successfully"
                );
                let mut result = ToolResult::success(call, output.for_llm);
                result.written_path = output.written_path;
                result
            }
            Err(e) => {
                error!(
                    tool = %call.name,
                    error = %e,
                    duration_ms = start.elapsed().as_millis() as u64,
                    "Tool execution failed"
                );
                let mut result =
                    ToolResult::failure(call, ToolErrorCode::ExecutionFailed, format!("Error: {}", e));
                result.retryable = Some(e.is_retryable());
                result
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{ClawError, Result};
    use crate::tools::{EchoTool, ToolOutput};
    use crate::skills::ToolPolicy;

    struct FailingTool;

    #[async_trait]
    impl Tool for FailingTool {
        fn name(&self) -> &str {
            "failing"
        }
        fn description(&self) -> &str {
            "Always fails"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, _args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
            Err(ClawError::Tool("disk on fire".into()))
        }
    }

    struct WriterTool;

    #[async_trait]
    impl Tool for WriterTool {
        fn name(&self) -> &str {
            "write_file"
        }
        fn description(&self) -> &str {
            "Pretends to write"
        }
        fn parameters(&self) -> Value {
            serde_json::json!({"type": "object"})
        }
        async fn execute(&self, args: Value, _ctx: &ToolContext) -> Result<ToolOutput> {
            let path = args["path"].as_str().unwrap_or("out.md").to_string();
            Ok(ToolOutput::llm_only(format!("Wrote {}", path)).with_written_path(path))
        }
    }

    fn registry() -> ToolRegistry {
        let mut r = ToolRegistry::new();
        r.register(Box::new(EchoTool));
        r.register(Box::new(FailingTool));
        r.register(Box::new(WriterTool));
        r
    }

    async fn run(r: &ToolRegistry, call: &ToolCall, filter: &ToolFilter) -> ToolResult {
        r.invoke(call, &[], filter, &ToolContext::new()).await
    }

    #[test]
    fn test_catalog_is_sorted_and_filtered() {
        let r = registry();
        let names: Vec<String> = r.definitions().into_iter().map(|d| d.name).collect();
        assert_eq!(names, vec!["echo", "failing", "write_file"]);

        let policy = ToolPolicy::new(Some(vec!["echo".into()]), None);
        let filtered = r.catalog(&ToolFilter::from_policy(policy.as_ref()));
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].name, "echo");
    }

    #[tokio::test]
    async fn test_blocked_call_never_executes() {
        let r = registry();
        let filter = ToolFilter::open().deny_also([&"echo".to_string()]);
        let result = run(&r, &ToolCall::new("c1", "echo", "{}"), &filter).await;
        assert!(result.is_blocked());
        assert!(!result.ok);
        assert!(result.content.contains("not available"));
    }

    #[tokio::test]
    async fn test_unknown_tool() {
        let r = registry();
        let result = run(&r, &ToolCall::new("c1", "nope", "{}"), &ToolFilter::open()).await;
        assert_eq!(result.error_code, Some(ToolErrorCode::NotFound));
    }

    #[tokio::test]
    async fn test_invalid_arguments() {
        let r = registry();
        let result = run(&r, &ToolCall::new("c1", "echo", "{not json"), &ToolFilter::open()).await;
        assert_eq!(result.error_code, Some(ToolErrorCode::InvalidArguments));
        assert_eq!(result.tool_call_id, "c1");
    }

    #[tokio::test]
    async fn test_empty_arguments_are_an_empty_object() {
        let r = registry();
        let result = run(&r, &ToolCall::new("c1", "write_file", ""), &ToolFilter::open()).await;
        assert!(result.ok);
        assert_eq!(result.written_path.as_deref(), Some("out.md"));
    }

    #[tokio::test]
    async fn test_tool_error_becomes_failed_result() {
        let r = registry();
        let result = run(&r, &ToolCall::new("c1", "failing", "{}"), &ToolFilter::open()).await;
        assert!(!result.ok);
        assert_eq!(result.error_code, Some(ToolErrorCode::ExecutionFailed));
        assert_eq!(result.content, "Error: Tool error: disk on fire");
        assert_eq!(result.retryable, Some(false));
    }

    #[tokio::test]
    async fn test_written_path_is_carried_to_outcome() {
        let r = registry();
        let call = ToolCall::new("c1", "write_file", r#"{"path": "notes/summary.md"}"#);
        let msg = run(&r, &call, &ToolFilter::open()).await.to_message();
        let outcome = msg.outcome.unwrap();
        assert!(outcome.ok);
        assert_eq!(outcome.written_path.as_deref(), Some("notes/summary.md"));
    }
}
