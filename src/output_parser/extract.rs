//! Shared extraction strategies for recovering JSON from LLM output.
//!
//! This is the load-bearing module: [`recover`](super::recover) calls into
//! these functions for fence stripping, diagnostic truncation, and the
//! balanced container scan.

/// Markers that introduce trailing diagnostic text after an otherwise valid payload.
///
/// Matched anywhere, so `"\nError:"` and an inline `"Error:"` are both caught.
pub const DIAGNOSTIC_MARKERS: &[&str] = &["Error:", "Traceback", "Exception:"];

/// Strip a leading markdown fence (bare or language-tagged) and a trailing fence.
///
/// # Examples
///
/// ```
/// use wiki_quiz::output_parser::extract::strip_fences;
///
/// assert_eq!(strip_fences("```json\n[1, 2]\n```"), "[1, 2]");
/// assert_eq!(strip_fences("```\n{}\n```\n"), "{}");
/// assert_eq!(strip_fences("  {\"a\": 1}  "), "{\"a\": 1}");
/// ```
pub fn strip_fences(text: &str) -> &str {
    let mut s = text.trim();
    if let Some(rest) = s.strip_prefix("```") {
        // Language tag directly after the backticks (json, JSON, javascript, ...)
        s = rest.trim_start_matches(|c: char| c.is_ascii_alphabetic());
    }
    if let Some(rest) = s.strip_suffix("```") {
        s = rest;
    }
    s.trim()
}

/// Truncate `text` at the earliest diagnostic marker, then trim.
///
/// Returns `text` unchanged when no marker is present.
///
/// # Examples
///
/// ```
/// use wiki_quiz::output_parser::extract::strip_trailing_diagnostics;
///
/// let text = "{\"a\": 1}\nTraceback (most recent call last):\n  ...";
/// assert_eq!(strip_trailing_diagnostics(text), "{\"a\": 1}");
/// ```
pub fn strip_trailing_diagnostics(text: &str) -> &str {
    match DIAGNOSTIC_MARKERS.iter().filter_map(|m| text.find(m)).min() {
        Some(cut) => text[..cut].trim(),
        None => text,
    }
}

/// Byte index of the first `{` or `[`, whichever comes first.
pub fn find_container_start(text: &str) -> Option<usize> {
    text.find(|c: char| c == '{' || c == '[')
}

/// Result of a balanced scan from a container start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScanOutcome {
    /// The container closed. `end` is the byte index of the final closing token.
    Balanced {
        /// Inclusive byte index of the closing `}` or `]`.
        end: usize,
    },
    /// The text ran out before the container closed (typically truncation).
    Unterminated {
        /// Open tokens still on the stack, outermost first.
        open: Vec<char>,
        /// Whether the text ended inside a string literal.
        in_string: bool,
    },
}

/// Walk from `start` tracking container depth, ignoring characters inside strings.
///
/// Both `"` and `'` open a string literal; only the same quote character
/// closes it. A backslash inside a string escapes the next character. Close
/// tokens seen with an empty stack are ignored.
///
/// # Examples
///
/// ```
/// use wiki_quiz::output_parser::extract::{scan_balanced, ScanOutcome};
///
/// let text = r#"noise {"a": "}"} tail"#;
/// assert_eq!(scan_balanced(text, 6), ScanOutcome::Balanced { end: 15 });
/// ```
pub fn scan_balanced(text: &str, start: usize) -> ScanOutcome {
    let mut stack: Vec<char> = Vec::new();
    let mut quote: Option<char> = None;
    let mut escape_next = false;

    for (offset, ch) in text[start..].char_indices() {
        if escape_next {
            escape_next = false;
            continue;
        }
        if let Some(q) = quote {
            if ch == '\\' {
                escape_next = true;
            } else if ch == q {
                quote = None;
            }
            continue;
        }
        match ch {
            '"' | '\'' => quote = Some(ch),
            '{' | '[' => stack.push(ch),
            '}' | ']' => {
                if stack.pop().is_some() && stack.is_empty() {
                    return ScanOutcome::Balanced { end: start + offset };
                }
            }
            _ => {}
        }
    }

    ScanOutcome::Unterminated {
        open: stack,
        in_string: quote.is_some(),
    }
}
