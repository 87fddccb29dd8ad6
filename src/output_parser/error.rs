//! Error types for JSON recovery.

/// Errors returned by [`recover`](crate::output_parser::recover).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    /// The LLM response was empty or whitespace-only (before or after fence stripping).
    #[error("LLM returned an empty response")]
    EmptyResponse,

    /// No `{` or `[` appeared in the text and it did not parse as a bare JSON value.
    #[error("failed to find a JSON object/array in LLM response; response start: {preview}")]
    NoContainerFound {
        /// The first 200 characters of the cleaned text.
        preview: String,
    },

    /// A container was located but every repair attempt failed.
    #[error("failed to parse JSON from LLM response: {reason}; snippet: {snippet}")]
    Failed {
        /// The serde error from the last attempt.
        reason: String,
        /// A truncated copy of the candidate text (max 400 chars).
        snippet: String,
    },
}

/// Truncate a string to at most `max_chars` characters, appending "..." if truncated.
///
/// Counts `char`s rather than bytes so multi-byte text never splits mid-codepoint.
pub(crate) fn truncate(s: &str, max_chars: usize) -> String {
    match s.char_indices().nth(max_chars) {
        None => s.to_string(),
        Some((byte_idx, _)) => format!("{}...", &s[..byte_idx]),
    }
}

/// Take at most `max_chars` characters from the start of `s`, without an ellipsis.
pub(crate) fn prefix(s: &str, max_chars: usize) -> &str {
    match s.char_indices().nth(max_chars) {
        None => s,
        Some((byte_idx, _)) => &s[..byte_idx],
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_short_is_unchanged() {
        assert_eq!(truncate("abc", 10), "abc");
    }

    #[test]
    fn truncate_long_gets_ellipsis() {
        assert_eq!(truncate("abcdef", 3), "abc...");
    }

    #[test]
    fn truncate_respects_char_boundaries() {
        assert_eq!(truncate("héllo wörld", 2), "hé...");
        assert_eq!(prefix("ünïcode", 3), "ünï");
    }
}
