//! Staged JSON recovery from LLM responses.
//!
//! Provides [`recover`] for extracting a `serde_json::Value` out of noisy
//! model output, and [`recover_with_stage`] which also reports the stage
//! that produced it. Worst-case work is one linear scan plus a handful of
//! reparse attempts.

use serde_json::Value;

use crate::output_parser::error::{truncate, ParseError};
use crate::output_parser::extract::{
    find_container_start, scan_balanced, strip_fences, strip_trailing_diagnostics, ScanOutcome,
};
use crate::output_parser::repair::{closing_tokens, remove_trailing_commas};

/// Which recovery stage produced the value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryStage {
    /// The fence-stripped (or diagnostics-stripped, container-free) text parsed as-is.
    Direct,
    /// A balanced container was sliced out of surrounding noise.
    Balanced,
    /// Trailing commas had to be removed.
    TrailingComma,
    /// Truncated output was closed by synthesizing the missing tokens.
    AutoClosed,
    /// Truncated output was cut back to the last closing token.
    LastCloser,
}

impl RecoveryStage {
    /// Stable lowercase name for logs and events.
    pub fn as_str(self) -> &'static str {
        match self {
            RecoveryStage::Direct => "direct",
            RecoveryStage::Balanced => "balanced",
            RecoveryStage::TrailingComma => "trailing_comma",
            RecoveryStage::AutoClosed => "auto_closed",
            RecoveryStage::LastCloser => "last_closer",
        }
    }
}

/// Recover a JSON value from raw LLM output.
///
/// Stages (in order):
/// 1. Reject empty/whitespace-only input
/// 2. Strip markdown fences
/// 3. Direct parse
/// 4. Truncate at trailing diagnostics (`Error:`, `Traceback`, `Exception:`)
/// 5. Locate the first `{` or `[`
/// 6. Balanced scan to the matching close
/// 7. Parse the balanced slice, or
/// 8. For truncated output, append the missing closers, else cut back to the
///    last closer (closing whatever that slice leaves open)
/// 9. Remove trailing commas and parse once more
///
/// # Examples
///
/// ```
/// use wiki_quiz::output_parser::recover;
/// use serde_json::json;
///
/// let raw = "```json\n{\"title\": \"Foo\", \"items\": [1, 2, 3]}\n```";
/// assert_eq!(recover(raw).unwrap(), json!({"title": "Foo", "items": [1, 2, 3]}));
/// ```
pub fn recover(raw: &str) -> Result<Value, ParseError> {
    recover_with_stage(raw).map(|(value, _)| value)
}

/// Same as [`recover`], also returning the [`RecoveryStage`] that succeeded.
pub fn recover_with_stage(raw: &str) -> Result<(Value, RecoveryStage), ParseError> {
    if raw.trim().is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    let text = strip_fences(raw);
    if text.is_empty() {
        return Err(ParseError::EmptyResponse);
    }

    if let Ok(value) = parse(text) {
        return Ok((value, RecoveryStage::Direct));
    }

    let text = strip_trailing_diagnostics(text);

    let Some(start) = find_container_start(text) else {
        return parse(text)
            .map(|value| (value, RecoveryStage::Direct))
            .map_err(|_| ParseError::NoContainerFound {
                preview: truncate(text, 200),
            });
    };

    match scan_balanced(text, start) {
        ScanOutcome::Balanced { end } => {
            let candidate = text[start..=end].trim();
            if let Ok(value) = parse(candidate) {
                return Ok((value, RecoveryStage::Balanced));
            }
            parse_without_trailing_commas(candidate, candidate)
        }
        ScanOutcome::Unterminated { open, .. } => {
            let rest = &text[start..];
            let closed = format!("{}{}", rest, closing_tokens(&open));
            if let Ok(value) = parse(&closed) {
                return Ok((value, RecoveryStage::AutoClosed));
            }

            if let Some(value) = cut_to_last_closer(text, start) {
                return Ok((value, RecoveryStage::LastCloser));
            }

            parse_without_trailing_commas(&closed, rest)
        }
    }
}

/// Cut `text` back to its rightmost `}` or `]` and parse from `start`.
///
/// The slice is tried as-is, then with its own still-open containers
/// closed. The second form rescues output truncated inside a string after
/// at least one complete nested item.
fn cut_to_last_closer(text: &str, start: usize) -> Option<Value> {
    let last = text.rfind(|c: char| c == '}' || c == ']')?;
    if last <= start {
        return None;
    }
    let slice = &text[start..=last];
    if let Ok(value) = parse(slice) {
        return Some(value);
    }
    match scan_balanced(slice, 0) {
        ScanOutcome::Unterminated {
            open,
            in_string: false,
        } => parse(&format!("{}{}", slice, closing_tokens(&open))).ok(),
        _ => None,
    }
}

/// Final stage: strip trailing commas from `candidate` and parse.
///
/// On failure the error snippet is taken from `snippet_source`.
fn parse_without_trailing_commas(
    candidate: &str,
    snippet_source: &str,
) -> Result<(Value, RecoveryStage), ParseError> {
    let cleaned = remove_trailing_commas(candidate);
    parse(&cleaned)
        .map(|value| (value, RecoveryStage::TrailingComma))
        .map_err(|e| ParseError::Failed {
            reason: e.to_string(),
            snippet: truncate(snippet_source, 400),
        })
}

fn parse(text: &str) -> serde_json::Result<Value> {
    serde_json::from_str(text)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn empty_response_fails() {
        assert_eq!(recover(""), Err(ParseError::EmptyResponse));
        assert_eq!(recover("   \n\t "), Err(ParseError::EmptyResponse));
    }

    #[test]
    fn fence_with_no_body_is_empty() {
        assert_eq!(recover("```json\n```"), Err(ParseError::EmptyResponse));
    }

    #[test]
    fn valid_json_is_direct() {
        let (value, stage) = recover_with_stage(r#"[{"a": 1}, {"b": [true, null]}]"#).unwrap();
        assert_eq!(value, json!([{"a": 1}, {"b": [true, null]}]));
        assert_eq!(stage, RecoveryStage::Direct);
    }

    #[test]
    fn idempotent_on_valid_json() {
        let inputs = [
            r#"{"a": 1}"#,
            "[1, 2, 3]",
            r#""just a string""#,
            "42",
            r#"{"nested": {"deep": [{"x": "y"}]}}"#,
        ];
        for input in inputs {
            let direct: Value = serde_json::from_str(input).unwrap();
            assert_eq!(recover(input).unwrap(), direct, "input: {}", input);
        }
    }

    #[test]
    fn fenced_object_recovered_exactly() {
        let raw = "```json\n{\"title\":\"Foo\",\"items\":[1,2,3]}\n```";
        assert_eq!(recover(raw).unwrap(), json!({"title": "Foo", "items": [1, 2, 3]}));
    }

    #[test]
    fn fenced_with_trailing_newline() {
        let raw = "```json\n{\"title\": \"Foo\", \"items\": [1,2,3]}\n```\n";
        assert_eq!(recover(raw).unwrap(), json!({"title": "Foo", "items": [1, 2, 3]}));
    }

    #[test]
    fn trailing_error_text_is_cut() {
        let raw = r#"{"title": "History of India", "summary": "A long summary."} Error: Unterminated string starting at"#;
        let (value, stage) = recover_with_stage(raw).unwrap();
        assert_eq!(
            value,
            json!({"title": "History of India", "summary": "A long summary."})
        );
        assert_eq!(stage, RecoveryStage::Balanced);
    }

    #[test]
    fn fence_plus_diagnostics_plus_prose() {
        let raw = "```json\n[{\"q\": \"one\"}, {\"q\": \"two\"}]\n```\nTraceback (most recent call last):\n  File \"x.py\"";
        assert_eq!(recover(raw).unwrap(), json!([{"q": "one"}, {"q": "two"}]));
    }

    #[test]
    fn prose_before_and_after_container() {
        let raw = "Sure! Here is the quiz:\n[{\"q\": \"a\"}]\nLet me know if you need more.";
        let (value, stage) = recover_with_stage(raw).unwrap();
        assert_eq!(value, json!([{"q": "a"}]));
        assert_eq!(stage, RecoveryStage::Balanced);
    }

    #[test]
    fn trailing_comma_cleanup() {
        let raw = r#"{"a": 1, "b": 2,} and some trailing noise"#;
        let (value, stage) = recover_with_stage(raw).unwrap();
        assert_eq!(value, json!({"a": 1, "b": 2}));
        assert_eq!(stage, RecoveryStage::TrailingComma);
    }

    #[test]
    fn truncated_object_is_auto_closed() {
        let raw = r#"{"title": "T", "sections": ["Intro", "History"]"#;
        let (value, stage) = recover_with_stage(raw).unwrap();
        assert_eq!(value, json!({"title": "T", "sections": ["Intro", "History"]}));
        assert_eq!(stage, RecoveryStage::AutoClosed);
    }

    #[test]
    fn truncated_list_of_objects_is_auto_closed() {
        let raw = r#"[{"question": "Q1", "options": ["a", "b"]}, {"question": "Q2", "options": ["c""#;
        let value = recover(raw).unwrap();
        assert_eq!(value.as_array().map(Vec::len), Some(2));
        assert_eq!(value[1]["options"], json!(["c"]));
    }

    #[test]
    fn truncated_inside_string_cuts_back_to_last_complete_item() {
        let raw = r#"[{"question": "Q1", "options": ["a", "b"]}, {"question": "Q2", "options": ["c", "d"]}, {"question": "Q3", "opt"#;
        let (value, stage) = recover_with_stage(raw).unwrap();
        assert_eq!(stage, RecoveryStage::LastCloser);
        assert_eq!(
            value,
            json!([
                {"question": "Q1", "options": ["a", "b"]},
                {"question": "Q2", "options": ["c", "d"]}
            ])
        );
    }

    #[test]
    fn cut_back_inside_a_string_still_fails() {
        let raw = r#"{"a": [1], "b": "x}y and then the output sto"#;
        assert!(matches!(recover(raw), Err(ParseError::Failed { .. })));
    }

    #[test]
    fn truncated_after_comma_uses_final_cleanup() {
        let raw = r#"{"a": [1, 2,"#;
        let (value, stage) = recover_with_stage(raw).unwrap();
        assert_eq!(value, json!({"a": [1, 2]}));
        assert_eq!(stage, RecoveryStage::TrailingComma);
    }

    #[test]
    fn unterminated_string_fails() {
        let raw = r#"{"title": "Truncated", "summary": "This is incomplete..."#;
        let err = recover(raw).unwrap_err();
        let ParseError::Failed { snippet, .. } = err else {
            panic!("expected ParseError::Failed, got {:?}", err);
        };
        assert!(snippet.starts_with(r#"{"title": "Truncated""#));
    }

    #[test]
    fn failure_snippet_is_bounded() {
        let long_value = "x".repeat(1000);
        let raw = format!(r#"{{"title": "{}"#, long_value);
        let ParseError::Failed { snippet, .. } = recover(&raw).unwrap_err() else {
            panic!("expected ParseError::Failed");
        };
        assert_eq!(snippet.chars().count(), 403);
        assert!(snippet.ends_with("..."));
    }

    #[test]
    fn no_container_reports_preview() {
        let err = recover("I'm sorry, I cannot help with that.").unwrap_err();
        assert_eq!(
            err,
            ParseError::NoContainerFound {
                preview: "I'm sorry, I cannot help with that.".to_string()
            }
        );
    }

    #[test]
    fn bare_scalar_before_diagnostics() {
        let (value, stage) = recover_with_stage("42\nError: something broke").unwrap();
        assert_eq!(value, json!(42));
        assert_eq!(stage, RecoveryStage::Direct);
    }

    #[test]
    fn balanced_but_invalid_reports_failure() {
        let err = recover("{not json at all}").unwrap_err();
        assert!(matches!(err, ParseError::Failed { .. }));
    }

    #[test]
    fn array_before_object_wins() {
        let raw = r#"result: ["a", {"b": 1}]"#;
        assert_eq!(recover(raw).unwrap(), json!(["a", {"b": 1}]));
    }

    #[test]
    fn brackets_in_strings_do_not_confuse_scan() {
        let raw = r#"noise {"text": "a } b ] c", "n": [1]} more noise ]"#;
        assert_eq!(recover(raw).unwrap(), json!({"text": "a } b ] c", "n": [1]}));
    }

    #[test]
    fn stage_names_are_stable() {
        assert_eq!(RecoveryStage::AutoClosed.as_str(), "auto_closed");
        assert_eq!(RecoveryStage::TrailingComma.as_str(), "trailing_comma");
        assert_eq!(RecoveryStage::LastCloser.as_str(), "last_closer");
    }
}
