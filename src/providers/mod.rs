//! Providers module - model client abstraction
//!
//! This module defines the `LLMProvider` trait that concrete model clients
//! implement, plus classification of the errors they return. The runtime
//! never talks to a network API itself.
//!
//! # Example
//!
//! ```rust
//! use async_trait::async_trait;
//! use skillclaw::error::Result;
//! use skillclaw::providers::{ChatOptions, LLMProvider, LLMResponse, ToolDefinition};
//! use skillclaw::session::Message;
//!
//! struct Parrot;
//!
//! #[async_trait]
//! impl LLMProvider for Parrot {
//!     async fn chat(
//!         &self,
//!         messages: Vec<Message>,
//!         _tools: Vec<ToolDefinition>,
//!         _model: Option<&str>,
//!         _options: ChatOptions,
//!     ) -> Result<LLMResponse> {
//!         let last = messages.last().map(|m| m.text().to_string()).unwrap_or_default();
//!         Ok(LLMResponse::text(&last))
//!     }
//!     fn default_model(&self) -> &str { "parrot-1" }
//!     fn name(&self) -> &str { "parrot" }
//! }
//! ```

mod error_classifier;
mod types;

pub use error_classifier::{
    classify_error_message, is_context_overflow_message, CONTEXT_OVERFLOW_PATTERNS,
};
pub use types::{
    ChatOptions, LLMProvider, LLMResponse, LLMToolCall, TextSink, ToolDefinition, Usage,
};
