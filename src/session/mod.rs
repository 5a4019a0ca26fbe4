//! Session module - transcript message types
//!
//! Every conversation in SkillClaw, whether owned by an [`AgentSession`]
//! or by a background sub-agent, is an ordered list of [`Message`]s.
//!
//! [`AgentSession`]: crate::agent::AgentSession
//!
//! # Example
//!
//! ```
//! use skillclaw::session::{Message, Role, ToolCall};
//!
//! let call = ToolCall::new("call_1", "read_file", r#"{"path": "notes.md"}"#);
//! let transcript = vec![
//!     Message::system("You are a helpful assistant."),
//!     Message::user("Summarize my notes"),
//!     Message::assistant_with_tools("", vec![call]),
//!     Message::tool_result("call_1", "- buy milk"),
//! ];
//! assert_eq!(transcript[3].role, Role::Tool);
//! ```

pub mod types;

pub use types::{Message, Role, ToolCall, ToolOutcome};
