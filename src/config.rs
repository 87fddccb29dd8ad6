//! Model and generation configuration.

use crate::{error::Result, PipelineError};
use serde_json::Value;

/// Configuration for LLM requests.
#[derive(Debug, Clone)]
pub struct LlmConfig {
    /// Temperature (0.0 = deterministic, 1.0 = creative).
    pub temperature: f64,

    /// Maximum tokens to generate.
    pub max_tokens: u32,

    /// Request JSON format output from the model.
    pub json_mode: bool,

    /// Custom options merged into the provider options object.
    pub options: Option<Value>,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            temperature: 0.2,
            max_tokens: 2048,
            json_mode: false,
            options: None,
        }
    }
}

impl LlmConfig {
    pub fn with_temperature(mut self, temp: f64) -> Self {
        self.temperature = temp;
        self
    }

    pub fn with_max_tokens(mut self, tokens: u32) -> Self {
        self.max_tokens = tokens;
        self
    }

    pub fn with_json_mode(mut self, enabled: bool) -> Self {
        self.json_mode = enabled;
        self
    }

    pub fn with_options(mut self, options: Value) -> Self {
        self.options = Some(options);
        self
    }
}

/// Limits and quotas for article analysis and quiz generation.
///
/// # Example
///
/// ```
/// use wiki_quiz::QuizConfig;
///
/// let config = QuizConfig::default().with_target_questions(5);
/// assert_eq!(config.target_questions, 5);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone)]
pub struct QuizConfig {
    /// Article text beyond this many characters is not sent to the model. Default: 8000.
    pub max_input_chars: usize,

    /// Windowed, trimmed text shorter than this fails with `InputTooShort`. Default: 100.
    pub min_input_chars: usize,

    /// How many questions a finished quiz should hold. Default: 10.
    pub target_questions: usize,

    /// Supplemental request rounds when the model under-delivers. Default: 3.
    pub supplemental_rounds: u32,

    /// Fallback candidates must be strictly longer than this. Default: 3.
    pub min_candidate_chars: usize,

    /// Answer prefix length embedded in fallback explanations. Default: 120.
    pub explanation_prefix_chars: usize,

    /// Summary length in history listings. Default: 300.
    pub summary_preview_chars: usize,
}

impl Default for QuizConfig {
    fn default() -> Self {
        Self {
            max_input_chars: 8000,
            min_input_chars: 100,
            target_questions: 10,
            supplemental_rounds: 3,
            min_candidate_chars: 3,
            explanation_prefix_chars: 120,
            summary_preview_chars: 300,
        }
    }
}

impl QuizConfig {
    pub fn with_max_input_chars(mut self, chars: usize) -> Self {
        self.max_input_chars = chars;
        self
    }

    pub fn with_min_input_chars(mut self, chars: usize) -> Self {
        self.min_input_chars = chars;
        self
    }

    pub fn with_target_questions(mut self, target: usize) -> Self {
        self.target_questions = target;
        self
    }

    pub fn with_supplemental_rounds(mut self, rounds: u32) -> Self {
        self.supplemental_rounds = rounds;
        self
    }

    /// Reject configurations that can never produce a quiz.
    pub fn validate(&self) -> Result<()> {
        if self.target_questions == 0 {
            return Err(PipelineError::InvalidConfig(
                "target_questions must be at least 1".into(),
            ));
        }
        if self.min_input_chars > self.max_input_chars {
            return Err(PipelineError::InvalidConfig(format!(
                "min_input_chars ({}) exceeds max_input_chars ({})",
                self.min_input_chars, self.max_input_chars
            )));
        }
        Ok(())
    }
}
