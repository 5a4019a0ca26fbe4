//! Heuristic token estimation.
//!
//! Character classes are counted separately so CJK-heavy transcripts are
//! not underestimated: CJK characters cost 1/1.5 token, everything else
//! 1/4 token. This is a calibration heuristic, not a tokenizer.

use crate::providers::ToolDefinition;
use crate::session::Message;

const CHARS_PER_TOKEN: f64 = 4.0;
const CJK_CHARS_PER_TOKEN: f64 = 1.5;
/// Framing cost of one message (role markers etc.).
const MESSAGE_OVERHEAD: usize = 4;
/// Framing cost of one tool call or catalog entry.
const TOOL_OVERHEAD: usize = 4;
/// Extra margin on tool catalog estimates.
const CATALOG_MARGIN: f64 = 1.1;

/// Deterministic token estimator.
pub struct TokenEstimator;

fn is_cjk(c: char) -> bool {
    matches!(c,
        '\u{4e00}'..='\u{9fff}'
        | '\u{3400}'..='\u{4dbf}'
        | '\u{3000}'..='\u{303f}'
        | '\u{ff00}'..='\u{ffef}')
}

impl TokenEstimator {
    /// Estimate the tokens of a text fragment.
    ///
    /// # Example
    /// ```
    /// use skillclaw::agent::TokenEstimator;
    ///
    /// assert_eq!(TokenEstimator::estimate(""), 0);
    /// assert_eq!(TokenEstimator::estimate("abcdefgh"), 2);
    /// assert_eq!(TokenEstimator::estimate("你好世"), 2);
    /// ```
    pub fn estimate(text: &str) -> usize {
        if text.is_empty() {
            return 0;
        }
        let (cjk, other) = text.chars().fold((0usize, 0usize), |(cjk, other), c| {
            if is_cjk(c) {
                (cjk + 1, other)
            } else {
                (cjk, other + 1)
            }
        });
        (cjk as f64 / CJK_CHARS_PER_TOKEN + other as f64 / CHARS_PER_TOKEN).ceil() as usize
    }

    /// Estimate one message including framing, tool calls and name.
    pub fn estimate_message(msg: &Message) -> usize {
        let mut tokens = MESSAGE_OVERHEAD + Self::estimate(msg.text());
        for call in msg.tool_calls.iter().flatten() {
            tokens += Self::estimate(&call.name) + Self::estimate(&call.arguments) + TOOL_OVERHEAD;
        }
        if let Some(name) = &msg.name {
            tokens += Self::estimate(name);
        }
        tokens
    }

    /// Estimate a whole transcript.
    pub fn estimate_messages(messages: &[Message]) -> usize {
        messages.iter().map(Self::estimate_message).sum()
    }

    /// Estimate the tool catalog sent alongside a request, with a 10% margin.
    pub fn estimate_tool_catalog(tools: &[ToolDefinition]) -> usize {
        let raw: usize = tools
            .iter()
            .map(|t| {
                Self::estimate(&t.name)
                    + Self::estimate(&t.description)
                    + Self::estimate(&t.parameters.to_string())
                    + TOOL_OVERHEAD
            })
            .sum();
        (raw as f64 * CATALOG_MARGIN).ceil() as usize
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::session::ToolCall;
    use serde_json::json;

    #[test]
    fn test_mixed_text_counts_classes_separately() {
        // 3 CJK chars = 2.0, 4 ASCII chars = 1.0
        assert_eq!(TokenEstimator::estimate("你好世abcd"), 3);
        // Fullwidth punctuation counts as CJK
        assert_eq!(TokenEstimator::estimate("！！！"), 2);
    }

    #[test]
    fn test_rounds_up() {
        assert_eq!(TokenEstimator::estimate("a"), 1);
        assert_eq!(TokenEstimator::estimate("abcde"), 2);
    }

    #[test]
    fn test_message_overhead() {
        assert_eq!(TokenEstimator::estimate_message(&Message::user("")), 4);
        assert_eq!(TokenEstimator::estimate_message(&Message::user("abcd")), 5);
    }

    #[test]
    fn test_tool_calls_and_name_are_counted() {
        let call = ToolCall::new("c1", "abcd", "abcdefgh");
        let msg = Message::assistant_with_tools("", vec![call]);
        // 4 framing + (1 name + 2 args + 4 call framing)
        assert_eq!(TokenEstimator::estimate_message(&msg), 11);

        let named = Message::tool_result("c1", "abcd").with_name("abcd");
        assert_eq!(TokenEstimator::estimate_message(&named), 6);
    }

    #[test]
    fn test_estimate_messages_sums() {
        let msgs = vec![Message::user("abcd"), Message::assistant("abcd")];
        assert_eq!(TokenEstimator::estimate_messages(&msgs), 10);
        assert_eq!(TokenEstimator::estimate_messages(&[]), 0);
    }

    #[test]
    fn test_catalog_margin() {
        let tool = ToolDefinition::new("abcd", "abcdefgh", json!({}));
        // name 1 + desc 2 + "{}" 1 + 4 = 8, * 1.1 = 8.8 -> 9
        assert_eq!(TokenEstimator::estimate_tool_catalog(&[tool]), 9);
    }
}
