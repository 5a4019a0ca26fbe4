//! Error types for SkillClaw
//!
//! This module defines all error types used throughout the SkillClaw runtime.
//! Uses `thiserror` for ergonomic error handling with automatic `Display` and
//! `Error` trait implementations.

use std::fmt;
use thiserror::Error;

// ============================================================================
// Provider Error Classification
// ============================================================================

/// Structured provider error classification.
///
/// Lets the runner and the sub-agent retry loop decide between retrying,
/// recovering through compaction, or giving up without string matching.
#[derive(Debug, Clone)]
pub enum ProviderError {
    /// 401: Invalid API key or authentication failure
    Auth(String),
    /// 429: Rate limit or quota exceeded
    RateLimit(String),
    /// 402: Payment required or billing issue
    Billing(String),
    /// 500/502/503/504: Server-side errors
    ServerError(String),
    /// 400: Bad request, invalid JSON, malformed parameters
    InvalidRequest(String),
    /// 404: Model not found or endpoint not available
    ModelNotFound(String),
    /// Connection or read timeout
    Timeout(String),
    /// Provider is overloaded (529 / `overloaded_error`)
    Overloaded(String),
    /// The prompt exceeds the model's context window
    ContextOverflow(String),
    /// Connection reset or aborted mid-request
    Transport(String),
    /// Catch-all for unrecognized errors
    Unknown(String),
}

impl fmt::Display for ProviderError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProviderError::Auth(msg) => write!(f, "Authentication error: {}", msg),
            ProviderError::RateLimit(msg) => write!(f, "Rate limit error: {}", msg),
            ProviderError::Billing(msg) => write!(f, "Billing error: {}", msg),
            ProviderError::ServerError(msg) => write!(f, "Server error: {}", msg),
            ProviderError::InvalidRequest(msg) => write!(f, "Invalid request: {}", msg),
            ProviderError::ModelNotFound(msg) => write!(f, "Model not found: {}", msg),
            ProviderError::Timeout(msg) => write!(f, "Timeout: {}", msg),
            ProviderError::Overloaded(msg) => write!(f, "Overloaded error: {}", msg),
            ProviderError::ContextOverflow(msg) => write!(f, "Context overflow: {}", msg),
            ProviderError::Transport(msg) => write!(f, "Transport error: {}", msg),
            ProviderError::Unknown(msg) => write!(f, "Unknown provider error: {}", msg),
        }
    }
}

impl ProviderError {
    /// Returns `true` if this error is transient and the request should be retried.
    ///
    /// Retryable errors: RateLimit, ServerError, Timeout, Overloaded, Transport.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::RateLimit(_)
                | ProviderError::ServerError(_)
                | ProviderError::Timeout(_)
                | ProviderError::Overloaded(_)
                | ProviderError::Transport(_)
        )
    }

    /// Returns `true` if the prompt was rejected for being too large.
    pub fn is_context_overflow(&self) -> bool {
        matches!(self, ProviderError::ContextOverflow(_))
    }

    /// Returns the HTTP status code associated with this error, if applicable.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            ProviderError::Auth(_) => Some(401),
            ProviderError::RateLimit(_) => Some(429),
            ProviderError::Billing(_) => Some(402),
            ProviderError::ServerError(_) => Some(500),
            ProviderError::InvalidRequest(_) => Some(400),
            ProviderError::ModelNotFound(_) => Some(404),
            ProviderError::Overloaded(_) => Some(529),
            ProviderError::ContextOverflow(_) => Some(400),
            ProviderError::Timeout(_) | ProviderError::Transport(_) | ProviderError::Unknown(_) => {
                None
            }
        }
    }
}

impl From<ProviderError> for ClawError {
    fn from(err: ProviderError) -> Self {
        ClawError::ProviderTyped(err)
    }
}

// ============================================================================
// Primary Error Type
// ============================================================================

/// The primary error type for SkillClaw operations.
#[derive(Error, Debug)]
pub enum ClawError {
    /// Configuration-related errors (invalid config, out-of-range values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Untyped provider failure (free-form message from a model client).
    #[error("Provider error: {0}")]
    Provider(String),

    /// Structured provider error with classification for retry decisions.
    #[error("Provider error: {0}")]
    ProviderTyped(ProviderError),

    /// Tool execution errors (invalid parameters, execution failures, etc.)
    #[error("Tool error: {0}")]
    Tool(String),

    /// Session errors (invalid state, missing collaborator, etc.)
    #[error("Session error: {0}")]
    Session(String),

    /// Sub-agent lifecycle errors
    #[error("Sub-agent error: {0}")]
    SubAgent(String),

    /// Owner channel failures (notification or file delivery)
    #[error("Channel error: {0}")]
    Channel(String),

    /// Resource not found (skills, tasks, tools, etc.)
    #[error("Not found: {0}")]
    NotFound(String),

    /// Standard I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization errors
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ClawError {
    /// Classify this error as a provider failure.
    ///
    /// Typed provider errors are returned as-is; every other variant is
    /// classified from its message text.
    pub fn provider_kind(&self) -> ProviderError {
        match self {
            ClawError::ProviderTyped(err) => err.clone(),
            other => crate::providers::classify_error_message(&other.to_string()),
        }
    }

    /// Returns `true` if retrying the same request may succeed.
    pub fn is_retryable(&self) -> bool {
        match self {
            ClawError::ProviderTyped(err) => err.is_retryable(),
            ClawError::Provider(_) | ClawError::Io(_) => self.provider_kind().is_retryable(),
            _ => false,
        }
    }

    /// Returns `true` if the model rejected the prompt for its size.
    pub fn is_context_overflow(&self) -> bool {
        match self {
            ClawError::ProviderTyped(err) => err.is_context_overflow(),
            ClawError::Provider(_) => self.provider_kind().is_context_overflow(),
            _ => false,
        }
    }
}

/// A specialized `Result` type for SkillClaw operations.
pub type Result<T> = std::result::Result<T, ClawError>;
