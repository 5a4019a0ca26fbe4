//! Session-level retry policy for background sub-agents.
//!
//! A whole sub-agent run is retried, not a single request: the transcript
//! is rebuilt from scratch on every attempt. Only transient provider
//! failures (rate limit, overload, 5xx, transport reset) qualify.

use std::time::Duration;

use crate::error::ClawError;

/// Upper bound on a single backoff wait.
pub const MAX_DELAY_MS: u64 = 60_000;

/// Check whether a run failure is worth another attempt.
pub fn is_retryable(err: &ClawError) -> bool {
    err.is_retryable()
}

/// Backoff before retry number `attempt` (1-indexed).
///
/// Delay formula: `min(base_delay_ms * 2^(attempt - 1) + jitter_ms, max_delay_ms)`
///
/// # Example
/// ```
/// use skillclaw::subagent::retry::compute_delay;
///
/// assert_eq!(compute_delay(1, 5_000, 60_000, 0), 5_000);
/// assert_eq!(compute_delay(2, 5_000, 60_000, 0), 10_000);
/// assert_eq!(compute_delay(5, 5_000, 60_000, 0), 60_000);
/// ```
pub fn compute_delay(attempt: u32, base_delay_ms: u64, max_delay_ms: u64, jitter_ms: u64) -> u64 {
    let exponent = attempt.saturating_sub(1).min(16);
    base_delay_ms
        .saturating_mul(1u64 << exponent)
        .saturating_add(jitter_ms)
        .min(max_delay_ms)
}

/// Backoff with a small jitter taken from the clock's nanosecond component.
pub fn backoff(attempt: u32, base_delay_ms: u64) -> Duration {
    let jitter_ms = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos() as u64 % (base_delay_ms / 10).max(1))
        .unwrap_or(0);
    Duration::from_millis(compute_delay(attempt, base_delay_ms, MAX_DELAY_MS, jitter_ms))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ProviderError;

    #[test]
    fn test_compute_delay_doubles() {
        assert_eq!(compute_delay(1, 100, 10_000, 0), 100);
        assert_eq!(compute_delay(2, 100, 10_000, 0), 200);
        assert_eq!(compute_delay(3, 100, 10_000, 0), 400);
    }

    #[test]
    fn test_compute_delay_caps_and_adds_jitter() {
        assert_eq!(compute_delay(3, 100, 10_000, 7), 407);
        assert_eq!(compute_delay(30, 1_000, 5_000, 0), 5_000);
        assert_eq!(compute_delay(0, 100, 10_000, 0), 100);
    }

    #[test]
    fn test_backoff_stays_within_jitter_window() {
        let d = backoff(2, 1_000).as_millis() as u64;
        assert!((2_000..2_100).contains(&d));
    }

    #[test]
    fn test_retryable_classification() {
        assert!(is_retryable(&ClawError::ProviderTyped(ProviderError::RateLimit(
            "slow down".into()
        ))));
        assert!(is_retryable(&ClawError::Provider("HTTP 503 Service Unavailable".into())));
        assert!(is_retryable(&ClawError::Provider("connection reset by peer".into())));
        assert!(!is_retryable(&ClawError::Provider("401 invalid api key".into())));
        assert!(!is_retryable(&ClawError::Tool("boom".into())));
    }
}
