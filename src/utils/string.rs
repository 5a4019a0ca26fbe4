//! UTF-8 safe string preview helpers.
//!
//! Provides small helpers to take the first N Unicode scalar values (chars)
//! from a string without slicing by byte index which can panic on multibyte
//! characters.

/// Return the first `n` characters of `s` as a `String` (no ellipsis).
pub fn prefix_chars(s: &str, n: usize) -> String {
    s.chars().take(n).collect()
}

/// Return a preview of `s` up to `n` characters. If `s` is longer than `n`
/// characters, the returned string will include a trailing ellipsis `...`.
pub fn preview(s: &str, n: usize) -> String {
    let mut prefix = prefix_chars(s, n);
    if s.chars().count() > n {
        prefix.push_str("...");
    }
    prefix
}

/// Truncate `s` to `n` characters, appending a marker that records the
/// original length in characters. Strings within the limit are returned as-is.
pub fn truncate_with_marker(s: &str, n: usize) -> String {
    let len = s.chars().count();
    if len <= n {
        return s.to_string();
    }
    format!("{}\n...[truncated, original length {}]", prefix_chars(s, n), len)
}
