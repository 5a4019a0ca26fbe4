//! Configuration validation with unknown field detection and range checks.

use serde_json::Value;
use std::collections::HashSet;

use super::Config;

/// Known top-level config field names.
const KNOWN_TOP_LEVEL: &[&str] = &["agent", "compaction", "subagents", "logging"];

const KNOWN_AGENT: &[&str] = &["system_prompt", "model", "max_turns", "stream"];

const KNOWN_COMPACTION: &[&str] = &[
    "enabled",
    "max_context_tokens",
    "threshold",
    "skill_keep_recent",
    "generic_keep_recent",
    "tool_truncate_chars",
    "assistant_truncate_chars",
    "unit_summary_chars",
    "boundary_artifacts",
];

const KNOWN_SUBAGENTS: &[&str] = &[
    "max_concurrent",
    "retention_secs",
    "max_retries",
    "retry_base_delay_ms",
    "default_max_turns",
    "deliverable_extensions",
    "system_prompt",
];

const KNOWN_LOGGING: &[&str] = &["format", "level", "file"];

/// A validation diagnostic.
#[derive(Debug)]
pub struct Diagnostic {
    pub level: DiagnosticLevel,
    pub path: String,
    pub message: String,
}

#[derive(Debug, PartialEq)]
pub enum DiagnosticLevel {
    Ok,
    Warn,
    Error,
}

impl Diagnostic {
    fn error(path: &str, message: impl Into<String>) -> Self {
        Self {
            level: DiagnosticLevel::Error,
            path: path.to_string(),
            message: message.into(),
        }
    }
}

impl std::fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let prefix = match self.level {
            DiagnosticLevel::Ok => "[OK]",
            DiagnosticLevel::Warn => "[WARN]",
            DiagnosticLevel::Error => "[ERROR]",
        };
        if self.path.is_empty() {
            write!(f, "{} {}", prefix, self.message)
        } else {
            write!(f, "{} {}: {}", prefix, self.path, self.message)
        }
    }
}

/// Simple Levenshtein distance for "did you mean?" suggestions.
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let mut matrix = vec![vec![0usize; b.len() + 1]; a.len() + 1];

    for (i, row) in matrix.iter_mut().enumerate() {
        row[0] = i;
    }
    for (j, val) in matrix[0].iter_mut().enumerate() {
        *val = j;
    }

    for (i, ca) in a.iter().enumerate() {
        for (j, cb) in b.iter().enumerate() {
            let cost = if ca == cb { 0 } else { 1 };
            matrix[i + 1][j + 1] = std::cmp::min(
                std::cmp::min(matrix[i][j + 1] + 1, matrix[i + 1][j] + 1),
                matrix[i][j] + cost,
            );
        }
    }
    matrix[a.len()][b.len()]
}

/// Suggest the closest known field name (if distance <= 3).
pub fn suggest_field(unknown: &str, known: &[&str]) -> Option<String> {
    known
        .iter()
        .map(|k| (k, levenshtein(unknown, k)))
        .filter(|(_, d)| *d <= 3)
        .min_by_key(|(_, d)| *d)
        .map(|(k, _)| format!("did you mean '{}'?", k))
}

fn check_keys(obj: &serde_json::Map<String, Value>, known: &[&str], prefix: &str) -> Vec<Diagnostic> {
    let known_set: HashSet<&str> = known.iter().copied().collect();
    obj.keys()
        .filter(|key| !known_set.contains(key.as_str()))
        .map(|key| {
            let msg = match suggest_field(key, known) {
                Some(suggestion) => format!("Unknown field '{}', {}", key, suggestion),
                None => format!("Unknown field '{}'", key),
            };
            let path = if prefix.is_empty() {
                key.clone()
            } else {
                format!("{}.{}", prefix, key)
            };
            Diagnostic {
                level: DiagnosticLevel::Warn,
                path,
                message: msg,
            }
        })
        .collect()
}

/// Validate a raw JSON config value against known field names.
pub fn validate_config(raw: &Value) -> Vec<Diagnostic> {
    let Some(obj) = raw.as_object() else {
        return vec![Diagnostic::error("", "Config must be a JSON object")];
    };

    let mut diagnostics = check_keys(obj, KNOWN_TOP_LEVEL, "");
    for (section, known) in [
        ("agent", KNOWN_AGENT),
        ("compaction", KNOWN_COMPACTION),
        ("subagents", KNOWN_SUBAGENTS),
        ("logging", KNOWN_LOGGING),
    ] {
        if let Some(inner) = obj.get(section).and_then(|v| v.as_object()) {
            diagnostics.extend(check_keys(inner, known, section));
        }
    }

    if diagnostics.is_empty() {
        diagnostics.push(Diagnostic {
            level: DiagnosticLevel::Ok,
            path: String::new(),
            message: "All fields recognized".to_string(),
        });
    }
    diagnostics
}

/// Check value ranges of a parsed config.
pub fn check_values(config: &Config) -> Vec<Diagnostic> {
    let mut out = Vec::new();
    let c = &config.compaction;
    if !(c.threshold > 0.0 && c.threshold <= 1.0) {
        out.push(Diagnostic::error(
            "compaction.threshold",
            format!("must be in (0, 1], got {}", c.threshold),
        ));
    }
    if c.max_context_tokens == 0 {
        out.push(Diagnostic::error("compaction.max_context_tokens", "must be positive"));
    }
    if c.skill_keep_recent == 0 || c.generic_keep_recent == 0 {
        out.push(Diagnostic::error(
            "compaction",
            "keep_recent windows must keep at least one message",
        ));
    }
    if config.agent.max_turns == 0 {
        out.push(Diagnostic::error("agent.max_turns", "must be positive"));
    }
    if config.subagents.max_concurrent == 0 {
        out.push(Diagnostic::error("subagents.max_concurrent", "must be positive"));
    }
    if config.subagents.default_max_turns == 0 {
        out.push(Diagnostic::error("subagents.default_max_turns", "must be positive"));
    }
    out
}
