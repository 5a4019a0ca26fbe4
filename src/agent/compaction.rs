//! Deterministic context compaction.
//!
//! Keeps a growing transcript under the token budget without any model
//! calls. Two strategies are chosen by the shape of the transcript:
//!
//! - **Skill mode**: the transcript contains unit boundaries, i.e. tool
//!   results reporting a successful write of a well-known artifact such as
//!   `summary.md`. Everything before the recent window is folded into one
//!   synthetic `user` message listing a short summary per unit of work.
//! - **Generic mode**: no boundaries. Old tool results and long assistant
//!   text are truncated in place; user and system messages are untouched
//!   and the newer half of the transcript is kept verbatim.
//!
//! Compaction never drops system messages and never splits tool-call chains.
//!
//! When compaction alone cannot bring a prompt under its budget, a hard
//! trim shrinks messages per role and drops the oldest ones, keeping at
//! least the last exchange. As a last resort only the first system message
//! and the last exchange remain.

use std::collections::VecDeque;

use once_cell::sync::Lazy;
use regex::Regex;
use tracing::{debug, info, warn};

use crate::config::CompactionConfig;
use crate::session::{Message, Role};
use crate::utils::string::{prefix_chars, preview, truncate_with_marker};

use super::tokens::TokenEstimator;

/// Marker appended to truncated tool output.
const TRUNCATION_MARKER: &str = "[truncated, original length";

/// Header of the synthetic summary message.
pub const COMPACTION_HEADER: &str = "[Compacted context]";

/// Floor of the message budget, whatever the window and catalog sizes.
pub const MIN_MESSAGE_BUDGET: usize = 2_000;

/// Fraction of a rejected prompt that overflow recovery aims for.
pub const OVERFLOW_REDUCTION_RATIO: f64 = 0.6;

/// Compact-then-trim rounds before falling back to a minimal transcript.
pub const BUDGET_PASSES: usize = 4;

/// Legacy phrasing of a successful file write, for tool messages without
/// a structured outcome.
static LEGACY_WRITE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"(?i)\b(?:wrote|written|saved|created)\b[^\n]*?([\w\-./]+\.[A-Za-z0-9]+)").unwrap()
});

static LEGACY_FAILURE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^\s*(?:error|failed|failure)\b").unwrap());

/// Token usage of a transcript against the configured window.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ContextUsage {
    /// Estimated tokens in use
    pub used_tokens: usize,
    /// Configured context window
    pub max_tokens: usize,
    /// Rounded usage percentage
    pub percent: u32,
}

/// One completed (or in-progress) unit of work folded into a summary.
#[derive(Debug, Clone, PartialEq)]
pub struct CompactionUnit {
    /// Human-readable label
    pub label: String,
    /// Messages the unit replaced
    pub original_message_count: usize,
    /// Estimated tokens the unit replaced
    pub original_token_estimate: usize,
    /// Deterministic summary text
    pub summary_text: String,
}

/// Which strategy a compaction pass used.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompactionMode {
    /// Unit boundaries were found
    Skill,
    /// No boundaries; truncation only
    Generic,
}

/// Decides when and how to shrink a transcript.
#[derive(Debug, Clone)]
pub struct ContextCompressor {
    config: CompactionConfig,
}

impl Default for ContextCompressor {
    fn default() -> Self {
        Self::new(CompactionConfig::default())
    }
}

impl ContextCompressor {
    /// Create a compressor from config.
    pub fn new(config: CompactionConfig) -> Self {
        Self { config }
    }

    /// The active configuration.
    pub fn config(&self) -> &CompactionConfig {
        &self.config
    }

    /// Current usage of `messages` against the window.
    pub fn usage(&self, messages: &[Message]) -> ContextUsage {
        let used = TokenEstimator::estimate_messages(messages);
        let max = self.config.max_context_tokens.max(1);
        ContextUsage {
            used_tokens: used,
            max_tokens: max,
            percent: ((used as f64 / max as f64) * 100.0).round() as u32,
        }
    }

    /// Returns `true` when the estimate exceeds `max_context_tokens * threshold`.
    pub fn needs_compaction(&self, messages: &[Message]) -> bool {
        let limit = self.config.max_context_tokens as f64 * self.config.threshold;
        TokenEstimator::estimate_messages(messages) as f64 > limit
    }

    /// Compact only if needed; otherwise return `messages` unchanged.
    pub fn compact(&self, messages: Vec<Message>) -> Vec<Message> {
        if !self.needs_compaction(&messages) {
            return messages;
        }
        self.force_compact(messages)
    }

    /// Compact regardless of the threshold.
    ///
    /// The first step of budget fitting and of overflow recovery.
    pub fn force_compact(&self, messages: Vec<Message>) -> Vec<Message> {
        let before = TokenEstimator::estimate_messages(&messages);
        let count_before = messages.len();
        let mode = self.mode_for(&messages);

        let result = match mode {
            CompactionMode::Skill => self.compact_skill_mode(messages),
            CompactionMode::Generic => self.compact_generic_mode(messages),
        };

        let after = TokenEstimator::estimate_messages(&result);
        info!(
            mode = ?mode,
            messages_before = count_before,
            messages_after = result.len(),
            tokens_before = before,
            tokens_after = after,
            "Context compacted"
        );
        result
    }

    /// Strategy that [`force_compact`](Self::force_compact) would use.
    pub fn mode_for(&self, messages: &[Message]) -> CompactionMode {
        if messages.iter().any(|m| self.is_unit_boundary(m)) {
            CompactionMode::Skill
        } else {
            CompactionMode::Generic
        }
    }

    /// Returns `true` if `msg` reports a successful write of a boundary artifact.
    pub fn is_unit_boundary(&self, msg: &Message) -> bool {
        if msg.role != Role::Tool {
            return false;
        }
        written_path(msg).is_some_and(|path| self.is_artifact(&path))
    }

    fn is_artifact(&self, path: &str) -> bool {
        let base = path.rsplit(['/', '\\']).next().unwrap_or(path);
        self.config
            .boundary_artifacts
            .iter()
            .any(|a| a.eq_ignore_ascii_case(base))
    }

    // ========================================================================
    // Skill mode
    // ========================================================================

    fn compact_skill_mode(&self, messages: Vec<Message>) -> Vec<Message> {
        let n = messages.len();
        let Some(last_boundary) = messages.iter().rposition(|m| self.is_unit_boundary(m)) else {
            return messages;
        };

        let mut recent_start = (last_boundary + 1).min(n.saturating_sub(self.config.skill_keep_recent));
        // A recent window must not open with orphaned tool results.
        while recent_start > 0 && recent_start < n && messages[recent_start].role == Role::Tool {
            recent_start -= 1;
        }

        let mut preserved = Vec::new();
        let mut compressible = Vec::new();
        let mut recent = Vec::with_capacity(n - recent_start);
        for (i, msg) in messages.into_iter().enumerate() {
            if i >= recent_start {
                recent.push(msg);
            } else if msg.role == Role::System {
                preserved.push(msg);
            } else {
                compressible.push(msg);
            }
        }

        if compressible.is_empty() {
            debug!("Skill-mode compaction found nothing to fold");
            preserved.extend(recent);
            return preserved;
        }

        let units = self.split_units(&compressible);
        let summary = render_summary(&units, compressible.len());

        preserved.push(Message::user(&summary));
        preserved.extend(recent);
        preserved
    }

    /// Split compressible messages into units ending at each boundary.
    pub fn split_units(&self, messages: &[Message]) -> Vec<CompactionUnit> {
        let mut units = Vec::new();
        let mut start = 0;
        for (i, msg) in messages.iter().enumerate() {
            if self.is_unit_boundary(msg) {
                let artifact = written_path(msg).unwrap_or_default();
                let label = format!("Unit {}: {}", units.len() + 1, artifact);
                units.push(self.summarize_unit(label, &messages[start..=i]));
                start = i + 1;
            }
        }
        if start < messages.len() {
            units.push(self.summarize_unit("In progress".to_string(), &messages[start..]));
        }
        units
    }

    fn summarize_unit(&self, label: String, unit: &[Message]) -> CompactionUnit {
        let last_text = unit
            .iter()
            .rev()
            .filter(|m| m.role == Role::Assistant)
            .map(|m| m.text().trim())
            .find(|t| !t.is_empty());

        let mut files: Vec<String> = Vec::new();
        for path in unit.iter().filter(|m| m.role == Role::Tool).filter_map(written_path) {
            if !files.contains(&path) {
                files.push(path);
            }
        }

        let mut summary_text = match last_text {
            Some(text) => preview(text, self.config.unit_summary_chars),
            None => "(no assistant output)".to_string(),
        };
        if !files.is_empty() {
            summary_text.push_str(&format!("\nFiles written: {}", files.join(", ")));
        }

        CompactionUnit {
            label,
            original_message_count: unit.len(),
            original_token_estimate: TokenEstimator::estimate_messages(unit),
            summary_text,
        }
    }

    // ========================================================================
    // Generic mode
    // ========================================================================

    fn compact_generic_mode(&self, mut messages: Vec<Message>) -> Vec<Message> {
        let non_system: Vec<usize> = messages
            .iter()
            .enumerate()
            .filter(|(_, m)| m.role != Role::System)
            .map(|(i, _)| i)
            .collect();

        let keep = self
            .config
            .generic_keep_recent
            .max(non_system.len().div_ceil(2));
        if non_system.len() <= keep {
            return messages;
        }

        let old = &non_system[..non_system.len() - keep];
        for &i in old {
            let msg = &mut messages[i];
            let text = msg.text();
            if text.contains(TRUNCATION_MARKER) {
                continue;
            }
            match msg.role {
                Role::Tool => {
                    let shrunk = truncate_with_marker(text, self.config.tool_truncate_chars);
                    msg.content = Some(shrunk);
                }
                Role::Assistant if text.chars().count() > self.config.assistant_truncate_chars => {
                    let shrunk = preview(text, self.config.assistant_truncate_chars);
                    msg.content = Some(shrunk);
                }
                _ => {}
            }
        }
        messages
    }

    // ========================================================================
    // Budget enforcement
    // ========================================================================

    /// Tokens left for messages once the tool catalog is accounted for.
    pub fn message_budget(&self, catalog_tokens: usize) -> usize {
        self.config
            .max_context_tokens
            .saturating_sub(catalog_tokens)
            .max(MIN_MESSAGE_BUDGET)
    }

    /// Bring `messages` under `budget` tokens.
    ///
    /// Compacts first, then hard-trims, for up to [`BUDGET_PASSES`] rounds.
    /// If that is still not enough the transcript is reduced to the first
    /// system message and the last exchange.
    pub fn fit_to_budget(&self, mut messages: Vec<Message>, budget: usize) -> Vec<Message> {
        let before = TokenEstimator::estimate_messages(&messages);
        if before <= budget {
            return messages;
        }

        let mut estimate = before;
        for _ in 0..BUDGET_PASSES {
            messages = self.force_compact(messages);
            estimate = TokenEstimator::estimate_messages(&messages);
            if estimate <= budget {
                break;
            }
            messages = hard_trim(messages, budget);
            estimate = TokenEstimator::estimate_messages(&messages);
            if estimate <= budget {
                break;
            }
        }

        if estimate > budget {
            messages = minimal_fallback(messages);
            estimate = TokenEstimator::estimate_messages(&messages);
            warn!(
                tokens = estimate,
                budget, "Transcript reduced to minimal fallback"
            );
        }

        info!(
            tokens_before = before,
            tokens_after = estimate,
            budget,
            "Transcript fitted to budget"
        );
        messages
    }

    /// Shrink a transcript the model rejected as too long.
    ///
    /// Aims for [`OVERFLOW_REDUCTION_RATIO`] of the rejected size, so the
    /// retried prompt is always smaller even when the estimate was already
    /// under the window.
    pub fn shrink_for_overflow(&self, messages: Vec<Message>) -> Vec<Message> {
        let before = TokenEstimator::estimate_messages(&messages);
        let target = ((before as f64 * OVERFLOW_REDUCTION_RATIO) as usize).max(MIN_MESSAGE_BUDGET);

        let result = hard_trim(self.force_compact(messages), target);
        info!(
            tokens_before = before,
            tokens_after = TokenEstimator::estimate_messages(&result),
            target,
            "Transcript shrunk after context overflow"
        );
        result
    }
}

/// Path a tool message reports as written, structured outcome first.
pub fn written_path(msg: &Message) -> Option<String> {
    match &msg.outcome {
        Some(outcome) => outcome
            .ok
            .then(|| outcome.written_path.clone())
            .flatten(),
        None => {
            let text = msg.text();
            if LEGACY_FAILURE.is_match(text) {
                return None;
            }
            LEGACY_WRITE
                .captures(text)
                .and_then(|c| c.get(1))
                .map(|m| m.as_str().to_string())
        }
    }
}

fn render_summary(units: &[CompactionUnit], folded: usize) -> String {
    let tokens: usize = units.iter().map(|u| u.original_token_estimate).sum();
    let mut out = format!(
        "{} {} earlier messages (~{} tokens) were summarized to save space.\n",
        COMPACTION_HEADER, folded, tokens
    );
    for unit in units {
        out.push_str(&format!(
            "\n## {} ({} messages)\n{}\n",
            unit.label, unit.original_message_count, unit.summary_text
        ));
    }
    out
}

/// Non-system messages a hard trim keeps before it starts dropping them.
const HARD_TRIM_KEEP_RECENT: usize = 8;

/// Per-role character limit for a shrunk message.
fn shrink_limit(role: Role, aggressive: bool) -> usize {
    match (role, aggressive) {
        (Role::System, true) => 1_200,
        (Role::System, false) => 2_400,
        (Role::User, true) => 600,
        (Role::User, false) => 1_200,
        (Role::Assistant, true) => 400,
        (Role::Assistant, false) => 900,
        (Role::Tool, true) => 120,
        (Role::Tool, false) => 240,
    }
}

/// Cap a message's text at its role limit. Tool-call ids and outcomes are
/// kept so pairing and unit boundaries survive; aggressive shrinking also
/// blanks oversized call arguments.
fn shrink_message(mut msg: Message, aggressive: bool) -> Message {
    let limit = shrink_limit(msg.role, aggressive);
    let text = msg.text();
    // Text cut earlier keeps its first marker, so the original length stays accurate.
    let (body, marker) = match text.find(TRUNCATION_MARKER) {
        Some(at) => {
            let head = text[..at].strip_suffix("\n...").unwrap_or(&text[..at]);
            (head, Some(&text[head.len()..]))
        }
        None => (text, None),
    };
    if body.chars().count() > limit {
        let shrunk = match marker {
            Some(marker) => format!("{}{}", prefix_chars(body, limit), marker),
            None => truncate_with_marker(body, limit),
        };
        msg.content = Some(shrunk);
    }
    if aggressive {
        if let Some(calls) = msg.tool_calls.as_mut() {
            for call in calls.iter_mut() {
                if call.arguments.chars().count() > limit {
                    call.arguments = "{}".to_string();
                }
            }
        }
    }
    msg
}

/// Index at which a tail of `keep` messages starts, moved back so the
/// tail never opens with an orphaned tool result.
fn tail_start(messages: &[Message], keep: usize) -> usize {
    let mut start = messages.len().saturating_sub(keep);
    while start > 0 && start < messages.len() && messages[start].role == Role::Tool {
        start -= 1;
    }
    start
}

fn drop_leading_tool_results(messages: &mut VecDeque<Message>, tokens: &mut usize) {
    while messages.front().is_some_and(|m| m.role == Role::Tool) {
        if let Some(dropped) = messages.pop_front() {
            *tokens = tokens.saturating_sub(TokenEstimator::estimate_message(&dropped));
        }
    }
}

/// Shrink and drop messages until the transcript fits `target` tokens.
///
/// System messages move to the front and are never dropped. The last
/// [`HARD_TRIM_KEEP_RECENT`] non-system messages are shrunk lightly and
/// everything older aggressively. Older messages go first, then recent
/// ones down to the final two, then extra system messages are shrunk.
pub fn hard_trim(messages: Vec<Message>, target: usize) -> Vec<Message> {
    let (mut system, mut rest): (Vec<Message>, Vec<Message>) =
        messages.into_iter().partition(|m| m.role == Role::System);

    let split = tail_start(&rest, HARD_TRIM_KEEP_RECENT);
    let mut recent: VecDeque<Message> = rest
        .split_off(split)
        .into_iter()
        .map(|m| shrink_message(m, false))
        .collect();
    let mut old: VecDeque<Message> = rest.into_iter().map(|m| shrink_message(m, true)).collect();

    let system_tokens = TokenEstimator::estimate_messages(&system);
    let mut old_tokens: usize = old.iter().map(TokenEstimator::estimate_message).sum();
    let mut recent_tokens: usize = recent.iter().map(TokenEstimator::estimate_message).sum();

    while system_tokens + old_tokens + recent_tokens > target {
        let Some(dropped) = old.pop_front() else {
            break;
        };
        old_tokens = old_tokens.saturating_sub(TokenEstimator::estimate_message(&dropped));
        drop_leading_tool_results(&mut old, &mut old_tokens);
    }

    while system_tokens + old_tokens + recent_tokens > target && recent.len() > 2 {
        if let Some(dropped) = recent.pop_front() {
            recent_tokens = recent_tokens.saturating_sub(TokenEstimator::estimate_message(&dropped));
        }
        drop_leading_tool_results(&mut recent, &mut recent_tokens);
    }

    if system_tokens + old_tokens + recent_tokens > target && system.len() > 1 {
        let extra = system.split_off(1);
        system.extend(extra.into_iter().map(|m| shrink_message(m, true)));
    }

    debug!(
        kept = system.len() + old.len() + recent.len(),
        target, "Hard trim finished"
    );
    system.into_iter().chain(old).chain(recent).collect()
}

/// First system message plus the last exchange, all shrunk aggressively.
fn minimal_fallback(messages: Vec<Message>) -> Vec<Message> {
    let (system, rest): (Vec<Message>, Vec<Message>) =
        messages.into_iter().partition(|m| m.role == Role::System);
    let start = tail_start(&rest, 2);

    system
        .into_iter()
        .take(1)
        .chain(rest.into_iter().skip(start))
        .map(|m| shrink_message(m, true))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::{ToolCall, ToolOutcome};

    fn compressor() -> ContextCompressor {
        ContextCompressor::default()
    }

    fn tiny_window() -> ContextCompressor {
        ContextCompressor::new(CompactionConfig {
            max_context_tokens: 100,
            ..Default::default()
        })
    }

    fn write_result(id: &str, path: &str) -> Message {
        Message::tool_result(id, &format!("Wrote {}", path)).with_outcome(ToolOutcome {
            ok: true,
            error_code: None,
            written_path: Some(path.to_string()),
        })
    }

    fn tool_turn(id: &str, name: &str) -> Message {
        Message::assistant_with_tools("", vec![ToolCall::new(id, name, "{}")])
    }

    #[test]
    fn test_compact_is_identity_below_threshold() {
        let msgs = vec![Message::system("sys"), Message::user("hi"), Message::assistant("hello")];
        let out = compressor().compact(msgs.clone());
        assert_eq!(out, msgs);
    }

    #[test]
    fn test_needs_compaction_threshold() {
        let c = tiny_window();
        // 70 token limit: 4 + 64 = 68 is below, 4 + 68 = 72 above
        assert!(!c.needs_compaction(&[Message::user(&"a".repeat(256))]));
        assert!(c.needs_compaction(&[Message::user(&"a".repeat(272))]));
    }

    #[test]
    fn test_usage_percent() {
        let c = tiny_window();
        let usage = c.usage(&[Message::user(&"a".repeat(184))]);
        assert_eq!(usage.used_tokens, 50);
        assert_eq!(usage.percent, 50);
    }

    #[test]
    fn test_boundary_requires_success_and_artifact_name() {
        let c = compressor();
        assert!(c.is_unit_boundary(&write_result("a", "out/summary.md")));
        assert!(!c.is_unit_boundary(&write_result("a", "out/draft.md")));

        let failed = Message::tool_result("a", "Error: disk full").with_outcome(ToolOutcome {
            ok: false,
            error_code: Some("execution_failed".into()),
            written_path: Some("summary.md".into()),
        });
        assert!(!c.is_unit_boundary(&failed));
        assert!(!c.is_unit_boundary(&Message::assistant("Wrote summary.md")));
    }

    #[test]
    fn test_boundary_legacy_text_fallback() {
        let c = compressor();
        assert!(c.is_unit_boundary(&Message::tool_result("a", "Successfully wrote 812 bytes to notes/plan.md")));
        assert!(!c.is_unit_boundary(&Message::tool_result("a", "Error: could not write plan.md")));
    }

    #[test]
    fn test_skill_mode_folds_units_and_keeps_system() {
        let mut msgs = vec![Message::system("base"), Message::user("task")];
        msgs.push(tool_turn("c1", "write_file"));
        msgs.push(write_result("c1", "summary.md"));
        msgs.push(Message::assistant("Chapter one summarized."));
        msgs.push(Message::system("[skill:paper]\nanalyze"));
        msgs.push(tool_turn("c2", "write_file"));
        msgs.push(write_result("c2", "analysis.md"));
        for i in 0..8 {
            msgs.push(Message::user(&format!("recent {}", i)));
        }

        let out = compressor().force_compact(msgs.clone());

        assert_eq!(out[0].text(), "base");
        assert_eq!(out[1].text(), "[skill:paper]\nanalyze");
        assert_eq!(out[2].role, Role::User);
        assert!(out[2].text().starts_with(COMPACTION_HEADER));
        assert!(out[2].text().contains("Unit 1: summary.md"));
        assert!(out[2].text().contains("Unit 2: analysis.md"));
        assert_eq!(&out[3..], &msgs[msgs.len() - 8..]);
    }

    #[test]
    fn test_skill_mode_keeps_everything_after_last_boundary() {
        let mut msgs = vec![Message::system("base"), Message::user("task")];
        msgs.push(tool_turn("c1", "write_file"));
        msgs.push(write_result("c1", "report.md"));
        for i in 0..12 {
            msgs.push(Message::assistant(&format!("step {}", i)));
        }
        let out = compressor().force_compact(msgs.clone());
        // base + summary + the 12 messages after the boundary
        assert_eq!(out.len(), 14);
        assert_eq!(&out[2..], &msgs[4..]);
    }

    #[test]
    fn test_skill_mode_never_opens_recent_window_with_tool_result() {
        let mut msgs = vec![Message::system("base"), Message::user("task")];
        msgs.push(Message::assistant_with_tools(
            "",
            vec![ToolCall::new("x", "read_file", "{}"), ToolCall::new("y", "read_file", "{}")],
        ));
        msgs.push(Message::tool_result("x", "a"));
        msgs.push(Message::tool_result("y", "b"));
        for i in 0..5 {
            msgs.push(Message::user(&format!("u{}", i)));
        }
        msgs.push(tool_turn("c0", "write_file"));
        msgs.push(write_result("c0", "plan.md"));
        // 12 messages: a window of 8 would open at the result for "y".

        let out = compressor().force_compact(msgs.clone());

        assert_eq!(out.len(), 12);
        assert_eq!(out[0].text(), "base");
        assert!(out[1].text().starts_with(COMPACTION_HEADER));
        assert!(out[1].text().contains("In progress"));
        assert_eq!(&out[2..], &msgs[2..]);
        assert!(out[2].has_tool_calls());
    }

    #[test]
    fn test_unit_summary_uses_last_assistant_text_and_files() {
        let c = compressor();
        let long = "x".repeat(400);
        let unit = vec![
            Message::assistant("first thought"),
            Message::assistant(&long),
            tool_turn("c1", "write_file"),
            write_result("c1", "data/chart.png"),
            tool_turn("c2", "write_file"),
            write_result("c2", "summary.md"),
        ];
        let units = c.split_units(&unit);
        assert_eq!(units.len(), 1);
        assert_eq!(units[0].original_message_count, 6);
        assert!(units[0].summary_text.starts_with(&"x".repeat(200)));
        assert!(!units[0].summary_text.contains(&"x".repeat(201)));
        assert!(units[0].summary_text.contains("Files written: data/chart.png, summary.md"));
    }

    #[test]
    fn test_trailing_messages_form_in_progress_unit() {
        let c = compressor();
        let msgs = vec![
            write_result("c1", "notes.md"),
            Message::user("next"),
            Message::assistant("working on it"),
        ];
        let units = c.split_units(&msgs);
        assert_eq!(units.len(), 2);
        assert_eq!(units[1].label, "In progress");
        assert_eq!(units[1].summary_text, "working on it");
    }

    #[test]
    fn test_generic_mode_truncates_old_half_only() {
        let big = "y".repeat(1000);
        let mut msgs = vec![Message::system("base")];
        for i in 0..12 {
            msgs.push(tool_turn(&format!("c{}", i), "read_file"));
            msgs.push(Message::tool_result(&format!("c{}", i), &big));
        }
        msgs.push(Message::user("question"));
        msgs.push(Message::assistant(&big));

        let out = compressor().force_compact(msgs.clone());
        assert_eq!(out.len(), msgs.len());
        assert_eq!(out[0], msgs[0]);

        // 26 non-system messages, keep max(10, 13) = 13 verbatim
        let non_system: Vec<usize> = (1..out.len()).collect();
        let (old, recent) = non_system.split_at(13);
        for &i in old {
            if out[i].role == Role::Tool {
                assert!(out[i].text().contains("[truncated, original length 1000]"));
            }
        }
        for &i in recent {
            assert_eq!(out[i], msgs[i]);
        }
        // Tool-call pairing survives
        assert!(out.iter().filter(|m| m.has_tool_calls()).count() == 12);
    }

    #[test]
    fn test_generic_mode_leaves_user_messages_and_short_input() {
        let big = "z".repeat(900);
        let mut msgs = Vec::new();
        for _ in 0..12 {
            msgs.push(Message::user(&big));
            msgs.push(Message::assistant(&big));
        }
        let out = compressor().force_compact(msgs.clone());
        assert_eq!(out[0], msgs[0]);
        assert_eq!(out[1].text().chars().count(), 503);
        assert_eq!(out[23], msgs[23]);

        let short = vec![Message::user("a"), Message::assistant("b")];
        assert_eq!(compressor().force_compact(short.clone()), short);
    }

    #[test]
    fn test_generic_mode_is_stable_on_second_pass() {
        let big = "q".repeat(700);
        let mut msgs = Vec::new();
        for i in 0..24 {
            msgs.push(Message::tool_result(&format!("c{}", i), &big));
        }
        let once = compressor().force_compact(msgs);
        let twice = compressor().force_compact(once.clone());
        assert_eq!(once, twice);
    }

    fn assert_tool_results_paired(messages: &[Message]) {
        for (j, msg) in messages.iter().enumerate().filter(|(_, m)| m.role == Role::Tool) {
            let id = msg.tool_call_id.as_deref().unwrap();
            assert!(
                messages[..j]
                    .iter()
                    .flat_map(|m| m.tool_calls.iter().flatten())
                    .any(|c| c.id == id),
                "tool result {} has no call",
                id
            );
        }
    }

    fn read_transcript(pairs: usize, result_chars: usize) -> Vec<Message> {
        let mut msgs = vec![Message::system("base")];
        for i in 0..pairs {
            let id = format!("c{}", i);
            msgs.push(tool_turn(&id, "read_file"));
            msgs.push(Message::tool_result(&id, &"x".repeat(result_chars)));
        }
        msgs
    }

    #[test]
    fn test_message_budget_reserves_catalog_with_floor() {
        assert_eq!(compressor().message_budget(8_000), 120_000);
        assert_eq!(tiny_window().message_budget(10), MIN_MESSAGE_BUDGET);
    }

    #[test]
    fn test_fit_to_budget_is_identity_under_budget() {
        let msgs = vec![Message::system("sys"), Message::user("hi"), Message::assistant("hello")];
        assert_eq!(compressor().fit_to_budget(msgs.clone(), 10_000), msgs);
    }

    #[test]
    fn test_hard_trim_drops_oldest_first_and_keeps_pairs() {
        let msgs = read_transcript(10, 4_000);
        let out = hard_trim(msgs, 500);

        assert!(TokenEstimator::estimate_messages(&out) <= 500);
        assert_eq!(out[0], Message::system("base"));
        assert_ne!(out[1].role, Role::Tool);
        assert_tool_results_paired(&out);

        let last = out.last().unwrap();
        assert_eq!(last.tool_call_id.as_deref(), Some("c9"));
        assert!(last.text().contains("[truncated, original length 4000]"));
        assert!(last.text().chars().count() < 300);
        assert!(!out.iter().any(|m| m.tool_call_id.as_deref() == Some("c0")));
    }

    #[test]
    fn test_shrinking_cut_text_keeps_first_marker() {
        let cut = truncate_with_marker(&"z".repeat(5_000), 1_000);
        let out = shrink_message(Message::tool_result("a", &cut), true);

        assert!(out.text().starts_with(&"z".repeat(120)));
        assert!(out.text().ends_with("\n...[truncated, original length 5000]"));
        assert!(out.text().chars().count() < 200);
        assert_eq!(out.tool_call_id.as_deref(), Some("a"));
    }

    #[test]
    fn test_hard_trim_keeps_last_pair_when_target_unreachable() {
        let out = hard_trim(read_transcript(10, 4_000), 50);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].role, Role::System);
        assert_eq!(out[1].tool_calls.as_ref().unwrap()[0].id, "c9");
        assert_eq!(out[2].tool_call_id.as_deref(), Some("c9"));
    }

    #[test]
    fn test_fit_to_budget_falls_back_to_minimal_transcript() {
        let msgs = vec![
            Message::system(&"s".repeat(10_000)),
            Message::system("[skill:deck]\nbuild slides"),
            Message::user("first request"),
            Message::assistant(&"a".repeat(4_000)),
            Message::user(&"u".repeat(4_000)),
        ];
        let out = compressor().fit_to_budget(msgs, 100);

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].role, Role::System);
        assert!(out[0].text().starts_with("sss"));
        assert!(out[0].text().contains(TRUNCATION_MARKER));
        assert_eq!(out[1].role, Role::Assistant);
        assert_eq!(out[2].role, Role::User);
        assert!(out[2].text().chars().count() < 700);
    }

    #[test]
    fn test_shrink_for_overflow_cuts_oversized_tool_result() {
        let msgs = vec![
            Message::system("base"),
            Message::user("read the log"),
            tool_turn("r", "read_file"),
            Message::tool_result("r", &"y".repeat(600_000)),
        ];
        let before = TokenEstimator::estimate_messages(&msgs);
        let out = compressor().shrink_for_overflow(msgs);

        assert!((TokenEstimator::estimate_messages(&out) as f64) < before as f64 * OVERFLOW_REDUCTION_RATIO);
        assert_eq!(out.len(), 4);
        assert_eq!(out[1], Message::user("read the log"));
        assert!(out[3].text().contains("[truncated, original length 600000]"));
        assert_tool_results_paired(&out);
    }
}
