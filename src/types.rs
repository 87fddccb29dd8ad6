//! Core data types: the article window, analysis, questions, and the
//! deduplicating question set.

use crate::config::QuizConfig;
use crate::diagnostics::GenerationDiagnostics;
use crate::error::Result;
use crate::output_parser::error::prefix;
use crate::PipelineError;
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;
use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;
use tracing::warn;

/// Article text that has passed the length precondition.
///
/// The raw text is cut to `max_input_chars` characters and trimmed. If what
/// remains is shorter than `min_input_chars`, construction fails with
/// [`PipelineError::InputTooShort`] and no model call is ever made.
///
/// # Example
///
/// ```
/// use wiki_quiz::{ArticleText, PipelineError, QuizConfig};
///
/// let config = QuizConfig::default();
/// let err = ArticleText::new("   too short   ", &config).unwrap_err();
/// assert!(matches!(err, PipelineError::InputTooShort { len: 9, min: 100 }));
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ArticleText(String);

impl ArticleText {
    pub fn new(raw: &str, config: &QuizConfig) -> Result<Self> {
        let windowed = prefix(raw, config.max_input_chars).trim();
        let len = windowed.chars().count();
        if len < config.min_input_chars {
            return Err(PipelineError::InputTooShort {
                len,
                min: config.min_input_chars,
            });
        }
        Ok(Self(windowed.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Length in characters.
    pub fn len(&self) -> usize {
        self.0.chars().count()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// Deserialize `null` as `T::default()`.
fn null_as_default<'de, D, T>(deserializer: D) -> std::result::Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

/// Named entities grouped by category.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntities {
    #[serde(default, deserialize_with = "null_as_default")]
    pub people: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub organizations: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub locations: Vec<String>,
}

/// Structured facts pulled from an article.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AnalysisResult {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub summary: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub key_entities: KeyEntities,
    #[serde(default, deserialize_with = "null_as_default")]
    pub sections: Vec<String>,
}

impl AnalysisResult {
    /// Build from a recovered JSON value.
    ///
    /// Missing or `null` fields become empty. A top level that is not an
    /// object, or a field of the wrong type, is a
    /// [`PipelineError::SchemaViolation`].
    pub fn from_value(value: Value) -> Result<Self> {
        if !value.is_object() {
            return Err(PipelineError::SchemaViolation {
                expected: "a JSON object with title, summary, key_entities, sections",
                found: value_kind(&value).to_string(),
            });
        }
        serde_json::from_value(value).map_err(|e| PipelineError::SchemaViolation {
            expected: "a JSON object with title, summary, key_entities, sections",
            found: e.to_string(),
        })
    }
}

/// Question difficulty. Defaults to [`Difficulty::Medium`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Difficulty {
    Easy,
    #[default]
    Medium,
    Hard,
}

impl Difficulty {
    pub fn as_str(self) -> &'static str {
        match self {
            Difficulty::Easy => "easy",
            Difficulty::Medium => "medium",
            Difficulty::Hard => "hard",
        }
    }
}

impl fmt::Display for Difficulty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Difficulty {
    type Err = PipelineError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "easy" => Ok(Difficulty::Easy),
            "medium" => Ok(Difficulty::Medium),
            "hard" => Ok(Difficulty::Hard),
            other => Err(PipelineError::SchemaViolation {
                expected: "one of easy, medium, hard",
                found: other.to_string(),
            }),
        }
    }
}

// Models write "Easy", "MEDIUM", null, or nonsense. Anything unrecognised is medium.
impl<'de> Deserialize<'de> for Difficulty {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
        let raw = Option::<Value>::deserialize(deserializer)?;
        Ok(raw
            .as_ref()
            .and_then(Value::as_str)
            .and_then(|s| s.parse().ok())
            .unwrap_or_default())
    }
}

/// One multiple-choice question.
///
/// `answer` is not checked against `options`. Model output is accepted as
/// given; only synthesized fillers are guaranteed consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Question {
    pub question: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub options: Vec<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub answer: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub explanation: String,
    #[serde(default)]
    pub difficulty: Difficulty,
}

impl Question {
    /// Lenient conversion from a model-produced item.
    ///
    /// Returns `None` for non-objects and objects without a string `question`.
    /// Numbers and booleans in `options` and `answer` are kept as their text,
    /// so `"options": [1943, 1944]` with `"answer": 1944` survives.
    pub fn from_value(value: &Value) -> Option<Self> {
        let obj = value.as_object()?;
        obj.get("question")?.as_str()?;

        let mut obj = obj.clone();
        if let Some(Value::Array(options)) = obj.get_mut("options") {
            options.iter_mut().for_each(scalar_to_string);
        }
        if let Some(answer) = obj.get_mut("answer") {
            scalar_to_string(answer);
        }
        serde_json::from_value(Value::Object(obj)).ok()
    }
}

fn scalar_to_string(value: &mut Value) {
    match value {
        Value::Number(n) => *value = Value::String(n.to_string()),
        Value::Bool(b) => *value = Value::String(b.to_string()),
        _ => {}
    }
}

/// Ordered questions, deduplicated by exact `question` text.
///
/// Comparison is case-sensitive with no normalization.
#[derive(Debug, Clone, Default)]
pub struct QuestionSet {
    items: Vec<Question>,
    seen: HashSet<String>,
}

impl QuestionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append `question` unless its text is already present.
    pub fn insert_unique(&mut self, question: Question) -> bool {
        if !self.seen.insert(question.question.clone()) {
            return false;
        }
        self.items.push(question);
        true
    }

    /// Append without a duplicate check. Used for synthesized fillers,
    /// which share one question template.
    pub fn append(&mut self, question: Question) {
        self.seen.insert(question.question.clone());
        self.items.push(question);
    }

    /// Merge raw model items, skipping malformed ones and duplicates.
    /// Returns how many were added.
    pub fn merge_values(&mut self, items: &[Value]) -> usize {
        let mut added = 0;
        for item in items {
            match Question::from_value(item) {
                Some(q) => {
                    if self.insert_unique(q) {
                        added += 1;
                    }
                }
                None => warn!(kind = value_kind(item), "skipping malformed question item"),
            }
        }
        added
    }

    pub fn contains(&self, question_text: &str) -> bool {
        self.seen.contains(question_text)
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Keep the first `len` questions. Dropped texts leave the seen set
    /// unless an earlier question shares them.
    pub fn truncate(&mut self, len: usize) {
        if len >= self.items.len() {
            return;
        }
        self.items.truncate(len);
        self.seen = self.items.iter().map(|q| q.question.clone()).collect();
    }

    pub fn as_slice(&self) -> &[Question] {
        &self.items
    }

    pub fn into_vec(self) -> Vec<Question> {
        self.items
    }

    /// Serialize the current questions as a JSON array.
    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string(&self.items)?)
    }
}

/// Everything produced for one article.
#[derive(Debug, Clone)]
pub struct GeneratedQuiz {
    pub analysis: AnalysisResult,
    pub questions: Vec<Question>,
    pub related_topics: Vec<String>,
    pub diagnostics: GenerationDiagnostics,
}

/// Short name of a JSON value's type, for error messages.
pub(crate) fn value_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}
