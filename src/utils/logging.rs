//! Logging initialization for SkillClaw.
//!
//! Supports three formats:
//! - `pretty`: default tracing pretty-print (human-readable, coloured)
//! - `component`: `[timestamp] [LEVEL] target message {fields}`, compact and grep-friendly;
//!   use the [`log_component!`] macro to add a `component` field for per-subsystem filtering
//! - `json`: structured JSON lines for log aggregators

use std::sync::Mutex;

use tracing_subscriber::EnvFilter;

use crate::config::{LogFormat, LoggingConfig};
use crate::error::{ClawError, Result};

/// Initialize the global tracing subscriber from config.
///
/// Call this once at startup before any tracing events are emitted.
/// `RUST_LOG` takes precedence over `cfg.level`. Fails if the log file
/// cannot be opened or a global subscriber is already installed.
pub fn init_logging(cfg: &LoggingConfig) -> Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cfg.level));

    let installed = match (&cfg.format, &cfg.file) {
        (LogFormat::Json, Some(path)) => {
            let file = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(path)?;
            tracing_subscriber::fmt()
                .json()
                .with_env_filter(filter)
                .with_writer(Mutex::new(file))
                .try_init()
        }
        (LogFormat::Json, None) => tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .try_init(),
        (LogFormat::Pretty, _) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .pretty()
            .try_init(),
        // Component-tagged events come from `log_component!`, which adds a
        // structured `component` field to the compact formatter.
        (LogFormat::Component, _) => tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .compact()
            .try_init(),
    };

    installed.map_err(|e| ClawError::Config(format!("failed to install logger: {}", e)))
}

/// Emit a component-tagged tracing event.
///
/// Works with any tracing level (`trace`, `debug`, `info`, `warn`, `error`).
/// The `component` field makes it easy to grep logs by subsystem:
///
/// ```
/// # use skillclaw::log_component;
/// log_component!(info, "subagent", "task spawned");
/// log_component!(warn, "compaction", "context near limit", used = 90000u64, limit = 128000u64);
/// ```
#[macro_export]
macro_rules! log_component {
    ($level:ident, $component:expr, $msg:expr) => {
        tracing::$level!(component = $component, $msg)
    };
    ($level:ident, $component:expr, $msg:expr, $($key:ident = $val:expr),+ $(,)?) => {
        tracing::$level!(component = $component, $($key = $val,)+ $msg)
    };
}

#[cfg(test)]
mod tests {
    use crate::config::{LogFormat, LoggingConfig};

    #[test]
    fn test_default_logging_config() {
        let cfg = LoggingConfig::default();
        assert_eq!(cfg.format, LogFormat::Component);
        assert_eq!(cfg.level, "info");
        assert!(cfg.file.is_none());
    }

    #[test]
    fn test_log_format_deserialize_json() {
        let cfg: LoggingConfig =
            serde_json::from_str(r#"{"format":"json","level":"debug"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Json);
        assert_eq!(cfg.level, "debug");
    }

    #[test]
    fn test_log_format_partial_config_uses_defaults() {
        let cfg: LoggingConfig = serde_json::from_str(r#"{"level":"trace"}"#).unwrap();
        assert_eq!(cfg.format, LogFormat::Component);
        assert!(cfg.file.is_none());
        assert_eq!(cfg.level, "trace");
    }

    #[test]
    fn test_init_logging_to_file_installs_once() {
        let dir = tempfile::tempdir().unwrap();
        let cfg = LoggingConfig {
            format: LogFormat::Json,
            level: "debug".to_string(),
            file: Some(dir.path().join("skillclaw.log").display().to_string()),
        };
        assert!(super::init_logging(&cfg).is_ok());
        assert!(dir.path().join("skillclaw.log").exists());
        assert!(super::init_logging(&cfg).is_err());
    }

    #[test]
    fn test_log_component_macro_compiles_without_subscriber() {
        crate::log_component!(debug, "test", "no subscriber installed");
        crate::log_component!(info, "test", "with fields", turns = 3u32);
    }
}
