//! Pattern-based error classification for model client errors.
//!
//! Checks patterns in priority order:
//! context overflow > billing > auth > rate_limit > overloaded > server > transport > timeout.
//! Falls back to `Unknown` if no pattern matches.

use once_cell::sync::Lazy;
use regex::Regex;

use crate::error::ProviderError;

/// A standalone three-digit number, i.e. a candidate HTTP status code.
static STATUS_CODE: Lazy<Regex> = Lazy::new(|| Regex::new(r"\b([1-5]\d{2})\b").unwrap());

/// Phrases model APIs use when the prompt does not fit the context window.
pub const CONTEXT_OVERFLOW_PATTERNS: &[&str] = &[
    "prompt is too long",
    "maximum context length",
    "context_length_exceeded",
    "input is too long",
];

/// Classify an error message string into a `ProviderError`.
pub fn classify_error_message(msg: &str) -> ProviderError {
    let lower = msg.to_lowercase();
    let codes = status_codes(&lower);
    let has_code = |wanted: &[u16]| wanted.iter().any(|c| codes.contains(c));

    // Context overflow: checked first so "400 ... prompt is too long" is recoverable
    if contains_any(&lower, CONTEXT_OVERFLOW_PATTERNS) {
        return ProviderError::ContextOverflow(msg.to_string());
    }

    // Billing: check before auth (402 can appear in both)
    if has_code(&[402])
        || contains_any(
            &lower,
            &[
                "payment required",
                "insufficient credits",
                "credit balance",
                "insufficient balance",
                "billing",
            ],
        )
    {
        return ProviderError::Billing(msg.to_string());
    }

    // Auth
    if contains_any(
        &lower,
        &[
            "invalid_api_key",
            "invalid api key",
            "incorrect api key",
            "authentication",
            "unauthorized",
            "no api key found",
        ],
    ) || has_code(&[401])
    {
        return ProviderError::Auth(msg.to_string());
    }

    // Rate limit
    if contains_any(
        &lower,
        &[
            "rate_limit",
            "rate limit",
            "too many requests",
            "exceeded your current quota",
            "resource_exhausted",
        ],
    ) || has_code(&[429])
    {
        return ProviderError::RateLimit(msg.to_string());
    }

    // Overloaded
    if contains_any(&lower, &["overloaded"]) || has_code(&[529]) {
        return ProviderError::Overloaded(msg.to_string());
    }

    // Server errors
    if has_code(&[500, 502, 503, 504])
        || contains_any(
            &lower,
            &["internal server error", "bad gateway", "service unavailable"],
        )
    {
        return ProviderError::ServerError(msg.to_string());
    }

    // Transport resets (ETIMEDOUT lands here rather than in Timeout)
    if contains_any(
        &lower,
        &["econnreset", "etimedout", "econnaborted", "connection reset"],
    ) {
        return ProviderError::Transport(msg.to_string());
    }

    // Timeout
    if contains_any(&lower, &["timeout", "timed out", "deadline exceeded"]) {
        return ProviderError::Timeout(msg.to_string());
    }

    if contains_any(&lower, &["model not found"]) || has_code(&[404]) {
        return ProviderError::ModelNotFound(msg.to_string());
    }

    ProviderError::Unknown(msg.to_string())
}

/// Returns `true` if the message describes a prompt that exceeds the context window.
pub fn is_context_overflow_message(msg: &str) -> bool {
    contains_any(&msg.to_lowercase(), CONTEXT_OVERFLOW_PATTERNS)
}

/// Standalone three-digit numbers in `text`, so `5000` never reads as `500`.
fn status_codes(text: &str) -> Vec<u16> {
    STATUS_CODE
        .captures_iter(text)
        .filter_map(|c| c.get(1))
        .filter_map(|m| m.as_str().parse().ok())
        .collect()
}

fn contains_any(haystack: &str, patterns: &[&str]) -> bool {
    patterns.iter().any(|p| haystack.contains(p))
}
