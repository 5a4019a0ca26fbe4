//! Configuration management for SkillClaw
//!
//! Configuration is loaded from `~/.skillclaw/config.json` with environment
//! variable overrides. A missing file yields the defaults.

mod types;
pub mod validate;

pub use types::*;

use std::path::{Path, PathBuf};

use tracing::warn;

use crate::error::{ClawError, Result};
use validate::{check_values, validate_config, DiagnosticLevel};

impl Config {
    /// Returns the SkillClaw configuration directory path (~/.skillclaw)
    pub fn dir() -> PathBuf {
        dirs::home_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".skillclaw")
    }

    /// Returns the path to the config file (~/.skillclaw/config.json)
    pub fn path() -> PathBuf {
        Self::dir().join("config.json")
    }

    /// Load configuration from the default path with environment overrides.
    ///
    /// Environment variables can override config values using the pattern
    /// `SKILLCLAW_SECTION_KEY`.
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::path())
    }

    /// Load configuration from a specific path with environment overrides.
    ///
    /// Unknown fields are reported as warnings; out-of-range values fail.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)?;
            let raw: serde_json::Value = serde_json::from_str(&content)?;
            for diag in validate_config(&raw) {
                if diag.level != DiagnosticLevel::Ok {
                    warn!(path = %path.display(), "{}", diag);
                }
            }
            serde_json::from_value(raw)?
        } else {
            Config::default()
        };

        config.apply_env_overrides();
        config.validate()?;

        Ok(config)
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Environment variables follow the pattern: SKILLCLAW_SECTION_KEY
    fn apply_env_overrides(&mut self) {
        // Agent
        if let Ok(val) = std::env::var("SKILLCLAW_AGENT_SYSTEM_PROMPT") {
            self.agent.system_prompt = val;
        }
        if let Ok(val) = std::env::var("SKILLCLAW_AGENT_MODEL") {
            self.agent.model = Some(val);
        }
        env_parse("SKILLCLAW_AGENT_MAX_TURNS", &mut self.agent.max_turns);
        env_parse("SKILLCLAW_AGENT_STREAM", &mut self.agent.stream);

        // Compaction
        env_parse("SKILLCLAW_COMPACTION_ENABLED", &mut self.compaction.enabled);
        env_parse(
            "SKILLCLAW_COMPACTION_MAX_CONTEXT_TOKENS",
            &mut self.compaction.max_context_tokens,
        );
        env_parse("SKILLCLAW_COMPACTION_THRESHOLD", &mut self.compaction.threshold);

        // Sub-agents
        env_parse(
            "SKILLCLAW_SUBAGENTS_MAX_CONCURRENT",
            &mut self.subagents.max_concurrent,
        );
        env_parse(
            "SKILLCLAW_SUBAGENTS_RETENTION_SECS",
            &mut self.subagents.retention_secs,
        );
        env_parse("SKILLCLAW_SUBAGENTS_MAX_RETRIES", &mut self.subagents.max_retries);
        env_parse(
            "SKILLCLAW_SUBAGENTS_RETRY_BASE_DELAY_MS",
            &mut self.subagents.retry_base_delay_ms,
        );

        // Logging
        if let Ok(val) = std::env::var("SKILLCLAW_LOGGING_LEVEL") {
            self.logging.level = val;
        }
        if let Ok(val) = std::env::var("SKILLCLAW_LOGGING_FILE") {
            self.logging.file = Some(val);
        }
    }

    /// Reject values the runtime cannot work with.
    pub fn validate(&self) -> Result<()> {
        let errors: Vec<String> = check_values(self)
            .into_iter()
            .filter(|d| d.level == DiagnosticLevel::Error)
            .map(|d| d.to_string())
            .collect();
        if errors.is_empty() {
            Ok(())
        } else {
            Err(ClawError::Config(errors.join("; ")))
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let content = serde_json::to_string_pretty(self)?;
        std::fs::write(path, content)?;
        Ok(())
    }
}

fn env_parse<T: std::str::FromStr>(key: &str, target: &mut T) {
    if let Ok(val) = std::env::var(key) {
        match val.parse() {
            Ok(v) => *target = v,
            Err(_) => warn!(key = key, value = %val, "Ignoring unparsable environment override"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.agent.max_turns, 150);
        assert!(config.compaction.enabled);
        assert_eq!(config.compaction.max_context_tokens, 128_000);
        assert_eq!(config.compaction.threshold, 0.70);
        assert_eq!(config.subagents.max_concurrent, 3);
        assert_eq!(config.subagents.retention_secs, 1800);
        assert_eq!(config.subagents.max_retries, 2);
        assert_eq!(config.subagents.retry_base_delay_ms, 5000);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_config_partial_json() {
        let json = r#"{"subagents": {"max_concurrent": 5}}"#;
        let config: Config = serde_json::from_str(json).unwrap();
        assert_eq!(config.subagents.max_concurrent, 5);
        assert_eq!(config.subagents.default_max_turns, 100);
        assert_eq!(config.agent.max_turns, 150);
    }

    #[test]
    fn test_env_override() {
        env::set_var("SKILLCLAW_AGENT_MAX_TURNS", "42");
        env::set_var("SKILLCLAW_COMPACTION_THRESHOLD", "not-a-number");

        let mut config = Config::default();
        config.apply_env_overrides();

        assert_eq!(config.agent.max_turns, 42);
        assert_eq!(config.compaction.threshold, 0.70);

        env::remove_var("SKILLCLAW_AGENT_MAX_TURNS");
        env::remove_var("SKILLCLAW_COMPACTION_THRESHOLD");
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join("config.json");

        let mut config = Config::default();
        config.subagents.max_concurrent = 7;
        config.agent.model = Some("test-model".to_string());
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.subagents.max_concurrent, 7);
        assert_eq!(loaded.agent.model.as_deref(), Some("test-model"));
    }

    #[test]
    fn test_load_rejects_out_of_range() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.json");
        std::fs::write(&path, r#"{"compaction": {"threshold": 1.5}}"#).unwrap();

        let err = Config::load_from_path(&path).unwrap_err();
        assert!(err.to_string().contains("compaction.threshold"));
    }

    #[test]
    fn test_load_nonexistent() {
        let path = PathBuf::from("/nonexistent/path/config.json");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.agent.max_turns, 150);
    }

    #[test]
    fn test_config_path() {
        assert!(Config::path().ends_with(".skillclaw/config.json"));
    }
}
