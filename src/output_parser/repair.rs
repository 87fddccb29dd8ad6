//! Deterministic repairs for common LLM JSON damage.
//!
//! All repairs are manual string operations, no regex. Each is tried only
//! after a direct parse has already failed.

/// Closing tokens for a stack of still-open containers, innermost first.
///
/// # Examples
///
/// ```
/// use wiki_quiz::output_parser::repair::closing_tokens;
///
/// assert_eq!(closing_tokens(&['{', '[', '{']), "}]}");
/// ```
pub fn closing_tokens(open: &[char]) -> String {
    open.iter()
        .rev()
        .map(|&c| if c == '{' { '}' } else { ']' })
        .collect()
}

/// Remove commas that directly precede `}` or `]` (whitespace allowed between).
///
/// Commas inside double-quoted strings are left alone.
///
/// # Examples
///
/// ```
/// use wiki_quiz::output_parser::repair::remove_trailing_commas;
///
/// assert_eq!(remove_trailing_commas(r#"{"a": 1, "b": 2,}"#), r#"{"a": 1, "b": 2}"#);
/// assert_eq!(remove_trailing_commas("[1, 2,\n ]"), "[1, 2\n ]");
/// ```
pub fn remove_trailing_commas(s: &str) -> String {
    let mut result = String::with_capacity(s.len());
    let chars: Vec<char> = s.chars().collect();
    let len = chars.len();
    let mut i = 0;
    let mut in_string = false;
    let mut escape_next = false;

    while i < len {
        let ch = chars[i];
        if escape_next {
            escape_next = false;
            result.push(ch);
            i += 1;
            continue;
        }

        if in_string {
            if ch == '\\' {
                escape_next = true;
            } else if ch == '"' {
                in_string = false;
            }
            result.push(ch);
            i += 1;
            continue;
        }

        if ch == '"' {
            in_string = true;
        } else if ch == ',' {
            let mut j = i + 1;
            while j < len && chars[j].is_whitespace() {
                j += 1;
            }
            if j < len && (chars[j] == '}' || chars[j] == ']') {
                i += 1;
                continue;
            }
        }

        result.push(ch);
        i += 1;
    }
    result
}
