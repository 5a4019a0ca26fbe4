//! Message types for SkillClaw
//!
//! This module defines the transcript vocabulary shared by the runner,
//! the compressor and the sessions: messages, roles, tool calls and the
//! structured outcome attached to tool results.

use serde::{Deserialize, Serialize};

/// A single message in a conversation.
///
/// Messages can be from users, assistants, system prompts, or tool results.
/// An assistant message that only issues tool calls carries no content.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The role of the message sender
    pub role: Role,
    /// The text content of the message
    pub content: Option<String>,
    /// Optional participant name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Tool calls made by the assistant (if any)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_calls: Option<Vec<ToolCall>>,
    /// ID of the tool call this message is responding to (for tool results)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
    /// Structured result metadata for tool messages
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<ToolOutcome>,
}

impl Message {
    fn with_role(role: Role, content: &str) -> Self {
        Self {
            role,
            content: Some(content.to_string()),
            name: None,
            tool_calls: None,
            tool_call_id: None,
            outcome: None,
        }
    }

    /// Create a new user message.
    ///
    /// # Example
    /// ```
    /// use skillclaw::session::{Message, Role};
    ///
    /// let msg = Message::user("Hello, assistant!");
    /// assert_eq!(msg.role, Role::User);
    /// assert_eq!(msg.text(), "Hello, assistant!");
    /// ```
    pub fn user(content: &str) -> Self {
        Self::with_role(Role::User, content)
    }

    /// Create a new assistant message.
    pub fn assistant(content: &str) -> Self {
        Self::with_role(Role::Assistant, content)
    }

    /// Create a new system message.
    ///
    /// System messages are used for prompts, skill instructions and
    /// transient context blocks.
    pub fn system(content: &str) -> Self {
        Self::with_role(Role::System, content)
    }

    /// Create a new tool result message.
    ///
    /// # Arguments
    /// * `tool_call_id` - The ID of the tool call this is responding to
    /// * `content` - The result content from the tool
    ///
    /// # Example
    /// ```
    /// use skillclaw::session::{Message, Role};
    ///
    /// let msg = Message::tool_result("call_123", "Tool executed successfully");
    /// assert_eq!(msg.role, Role::Tool);
    /// assert_eq!(msg.tool_call_id, Some("call_123".to_string()));
    /// ```
    pub fn tool_result(tool_call_id: &str, content: &str) -> Self {
        let mut msg = Self::with_role(Role::Tool, content);
        msg.tool_call_id = Some(tool_call_id.to_string());
        msg
    }

    /// Create an assistant message with tool calls.
    ///
    /// Empty `content` is stored as `None`.
    ///
    /// # Example
    /// ```
    /// use skillclaw::session::{Message, ToolCall};
    ///
    /// let call = ToolCall::new("call_1", "search", r#"{"query": "rust"}"#);
    /// let msg = Message::assistant_with_tools("", vec![call]);
    /// assert!(msg.has_tool_calls());
    /// assert!(msg.content.is_none());
    /// ```
    pub fn assistant_with_tools(content: &str, tool_calls: Vec<ToolCall>) -> Self {
        Self {
            role: Role::Assistant,
            content: if content.is_empty() {
                None
            } else {
                Some(content.to_string())
            },
            name: None,
            tool_calls: Some(tool_calls),
            tool_call_id: None,
            outcome: None,
        }
    }

    /// Attach a participant name.
    pub fn with_name(mut self, name: &str) -> Self {
        self.name = Some(name.to_string());
        self
    }

    /// Attach a structured tool outcome.
    pub fn with_outcome(mut self, outcome: ToolOutcome) -> Self {
        self.outcome = Some(outcome);
        self
    }

    /// The text content, or an empty string when there is none.
    pub fn text(&self) -> &str {
        self.content.as_deref().unwrap_or("")
    }

    /// Check if this message has tool calls.
    pub fn has_tool_calls(&self) -> bool {
        self.tool_calls
            .as_ref()
            .map(|tc| !tc.is_empty())
            .unwrap_or(false)
    }

    /// Check if this is a tool result message.
    pub fn is_tool_result(&self) -> bool {
        self.role == Role::Tool && self.tool_call_id.is_some()
    }

    /// Check if this is a system message whose text starts with `prefix`.
    pub fn is_system_with_prefix(&self, prefix: &str) -> bool {
        self.role == Role::System && self.text().starts_with(prefix)
    }
}

/// The role of a message sender in a conversation.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// System prompts and instructions
    System,
    /// Messages from the user
    User,
    /// Messages from the AI assistant
    Assistant,
    /// Results from tool executions
    Tool,
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Role::System => write!(f, "system"),
            Role::User => write!(f, "user"),
            Role::Assistant => write!(f, "assistant"),
            Role::Tool => write!(f, "tool"),
        }
    }
}

/// A tool call made by the assistant.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCall {
    /// Unique identifier for this tool call
    pub id: String,
    /// Name of the tool to call
    pub name: String,
    /// JSON-encoded arguments for the tool
    pub arguments: String,
}

impl ToolCall {
    /// Create a new tool call.
    ///
    /// # Example
    /// ```
    /// use skillclaw::session::ToolCall;
    ///
    /// let call = ToolCall::new("call_123", "web_search", r#"{"query": "rust programming"}"#);
    /// assert_eq!(call.name, "web_search");
    /// ```
    pub fn new(id: &str, name: &str, arguments: &str) -> Self {
        Self {
            id: id.to_string(),
            name: name.to_string(),
            arguments: arguments.to_string(),
        }
    }

    /// Parse the arguments as JSON, falling back to an empty object.
    pub fn arguments_value(&self) -> serde_json::Value {
        serde_json::from_str(&self.arguments)
            .unwrap_or_else(|_| serde_json::Value::Object(Default::default()))
    }
}

/// Structured outcome of a tool invocation, carried on the tool message.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ToolOutcome {
    /// Whether the tool reported success
    pub ok: bool,
    /// Machine-readable failure code, if any
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error_code: Option<String>,
    /// Path of a file the tool wrote successfully
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub written_path: Option<String>,
}
