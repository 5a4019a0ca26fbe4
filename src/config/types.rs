//! Configuration types for SkillClaw

use serde::{Deserialize, Serialize};

/// Main configuration structure for SkillClaw.
///
/// Every section uses `#[serde(default)]`, so a partial file only needs
/// the values it changes.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Conversation defaults
    pub agent: AgentConfig,
    /// Context compaction
    pub compaction: CompactionConfig,
    /// Background sub-agents
    pub subagents: SubAgentConfig,
    /// Logging output
    pub logging: LoggingConfig,
}

// ============================================================================
// Agent Configuration
// ============================================================================

/// Defaults for foreground conversations.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AgentConfig {
    /// Base system prompt injected on first use of a session.
    pub system_prompt: String,
    /// Model override passed to the provider (`None` = provider default).
    pub model: Option<String>,
    /// Default turn ceiling of one run.
    pub max_turns: u32,
    /// Stream model text through the runner observer.
    pub stream: bool,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            system_prompt: DEFAULT_SYSTEM_PROMPT.to_string(),
            model: None,
            max_turns: 150,
            stream: false,
        }
    }
}

/// Default base system prompt.
pub const DEFAULT_SYSTEM_PROMPT: &str = "You are a helpful assistant. Use the available tools \
when they help, activate a skill when a task matches one, and hand long-running work to a \
background sub-agent.";

// ============================================================================
// Compaction Configuration
// ============================================================================

/// Context compaction configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CompactionConfig {
    /// Whether automatic context compaction is enabled.
    pub enabled: bool,
    /// Maximum context window size in tokens.
    pub max_context_tokens: usize,
    /// Fraction (0.0-1.0) of `max_context_tokens` that triggers compaction.
    pub threshold: f64,
    /// Minimum trailing messages kept verbatim in skill mode.
    pub skill_keep_recent: usize,
    /// Minimum trailing non-system messages kept verbatim in generic mode.
    pub generic_keep_recent: usize,
    /// Character limit for old tool results in generic mode.
    pub tool_truncate_chars: usize,
    /// Character limit for old assistant text in generic mode.
    pub assistant_truncate_chars: usize,
    /// Character limit of the assistant excerpt in a unit summary.
    pub unit_summary_chars: usize,
    /// File names whose successful write ends a unit of work.
    pub boundary_artifacts: Vec<String>,
}

impl Default for CompactionConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            max_context_tokens: 128_000,
            threshold: 0.70,
            skill_keep_recent: 8,
            generic_keep_recent: 10,
            tool_truncate_chars: 200,
            assistant_truncate_chars: 500,
            unit_summary_chars: 200,
            boundary_artifacts: [
                "summary.md",
                "analysis.md",
                "report.md",
                "notes.md",
                "progress.md",
                "plan.md",
            ]
            .iter()
            .map(|s| s.to_string())
            .collect(),
        }
    }
}

// ============================================================================
// Sub-agent Configuration
// ============================================================================

/// Background sub-agent configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SubAgentConfig {
    /// Running tasks allowed per owner.
    pub max_concurrent: usize,
    /// Seconds a finished record stays queryable.
    pub retention_secs: u64,
    /// Session-level retries after the first attempt.
    pub max_retries: u32,
    /// Base backoff delay; attempt `n` waits `base * 2^(n-1)`.
    pub retry_base_delay_ms: u64,
    /// Turn ceiling when the skill sets none.
    pub default_max_turns: u32,
    /// Output file extensions forwarded to the owner on completion.
    pub deliverable_extensions: Vec<String>,
    /// System prompt of every sub-agent.
    pub system_prompt: String,
}

impl Default for SubAgentConfig {
    fn default() -> Self {
        Self {
            max_concurrent: 3,
            retention_secs: 30 * 60,
            max_retries: 2,
            retry_base_delay_ms: 5_000,
            default_max_turns: 100,
            deliverable_extensions: ["pptx", "pdf", "docx", "xlsx", "zip"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
            system_prompt: DEFAULT_SUBAGENT_PROMPT.to_string(),
        }
    }
}

/// Default sub-agent system prompt.
pub const DEFAULT_SUBAGENT_PROMPT: &str = "You are a background worker completing one task \
on behalf of the owner. Work autonomously. Ask the owner with ask_user_question only when a \
decision cannot be made without them. Finish with a short summary of what you produced.";

// ============================================================================
// Logging Configuration
// ============================================================================

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Multi-line human-readable output
    Pretty,
    /// Compact single-line output with component fields
    #[default]
    Component,
    /// JSON lines
    Json,
}

/// Logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Output format
    pub format: LogFormat,
    /// Default filter directive (overridden by `RUST_LOG`)
    pub level: String,
    /// Append JSON logs to this file instead of stdout
    pub file: Option<String>,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            format: LogFormat::Component,
            level: "info".to_string(),
            file: None,
        }
    }
}
