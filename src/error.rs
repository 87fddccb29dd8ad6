use crate::output_parser::ParseError;
use thiserror::Error;

/// Errors produced by the generation pipeline and its collaborators.
#[derive(Error, Debug)]
pub enum PipelineError {
    /// Low-level HTTP transport failure (connection refused, timeout, etc.).
    #[error("HTTP request failed: {0}")]
    Request(#[from] reqwest::Error),

    /// JSON (de)serialization failed at the serde level.
    #[error("JSON parsing failed: {0}")]
    Json(#[from] serde_json::Error),

    /// HTTP error with status code and response body.
    ///
    /// The rendered message (`HTTP 429: ...`) is what rate-limit
    /// classification inspects, so the body is kept verbatim.
    #[error("HTTP {status}: {body}")]
    HttpError {
        /// HTTP status code (e.g. 429, 500, 503).
        status: u16,
        /// Response body text.
        body: String,
    },

    /// Article text failed the minimum-length precondition. No model call was made.
    #[error("article text is too short ({len} chars); need at least {min} characters")]
    InputTooShort {
        /// Length of the trimmed, windowed text in characters.
        len: usize,
        /// Required minimum.
        min: usize,
    },

    /// The model returned no content for a call.
    #[error("model returned an empty response for '{call}'")]
    EmptyResponse {
        /// Name of the call that came back empty.
        call: String,
    },

    /// The completion could not be recovered into a JSON value.
    #[error(transparent)]
    Parse(#[from] ParseError),

    /// Parsing failed, and so did the single model-assisted repair.
    #[error("failed to parse and repair model output; original error: {original}; repair error: {repair}")]
    RepairFailed {
        /// Why the first completion could not be parsed.
        original: String,
        /// Why the repair call (or parsing its output) failed.
        repair: String,
    },

    /// Every attempt hit a rate limit.
    #[error("rate limited after {attempts} attempts: {last}")]
    RetryExhausted {
        /// How many calls were made.
        attempts: u32,
        /// The transport error from the final attempt.
        last: Box<PipelineError>,
    },

    /// A parsed value had the wrong top-level shape.
    #[error("expected {expected}, got {found}")]
    SchemaViolation {
        /// What the caller needed (e.g. "a JSON array of questions").
        expected: &'static str,
        /// Short description of what was produced.
        found: String,
    },

    /// The content fetcher could not supply usable article text.
    #[error("failed to fetch article: {0}")]
    FetchFailed(String),

    /// No stored record matched the lookup.
    #[error("quiz {0} not found")]
    NotFound(u64),

    /// The pipeline was cancelled via the cancellation flag.
    #[error("pipeline was cancelled")]
    Cancelled,

    /// Invalid configuration detected before any work started.
    #[error("invalid configuration: {0}")]
    InvalidConfig(String),

    /// Catch-all for other errors.
    #[error("{0}")]
    Other(String),
}

impl From<anyhow::Error> for PipelineError {
    fn from(err: anyhow::Error) -> Self {
        PipelineError::Other(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn http_error_message_carries_status_and_body() {
        let err = PipelineError::HttpError {
            status: 429,
            body: "RESOURCE_EXHAUSTED".into(),
        };
        assert_eq!(err.to_string(), "HTTP 429: RESOURCE_EXHAUSTED");
    }

    #[test]
    fn retry_exhausted_wraps_last_error() {
        let err = PipelineError::RetryExhausted {
            attempts: 3,
            last: Box::new(PipelineError::Other("quota exceeded".into())),
        };
        assert_eq!(err.to_string(), "rate limited after 3 attempts: quota exceeded");
    }

    #[test]
    fn parse_error_is_transparent() {
        let err: PipelineError = ParseError::EmptyResponse.into();
        assert_eq!(err.to_string(), ParseError::EmptyResponse.to_string());
    }

    #[test]
    fn anyhow_converts_to_other() {
        let err: PipelineError = anyhow::anyhow!("boom").into();
        assert!(matches!(err, PipelineError::Other(ref m) if m == "boom"));
    }
}
