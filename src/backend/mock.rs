//! Mock backend for testing without a live LLM.
//!
//! [`MockBackend`] plays back a script of replies in order, so the whole
//! pipeline (including rate limits and empty completions) can be exercised
//! deterministically.
//!
//! # Example
//!
//! ```
//! use wiki_quiz::backend::{MockBackend, MockReply};
//!
//! let mock = MockBackend::scripted(vec![
//!     MockReply::Fail("429 RESOURCE_EXHAUSTED".into()),
//!     MockReply::Text("[]".into()),
//! ]);
//! assert_eq!(mock.calls(), 0);
//! ```

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use reqwest::Client;

use super::{Backend, LlmRequest, LlmResponse};
use crate::error::Result;
use crate::PipelineError;

/// One scripted reply.
#[derive(Debug, Clone)]
pub enum MockReply {
    /// A successful completion with this text.
    Text(String),
    /// A transport failure rendered as [`PipelineError::Other`].
    Fail(String),
    /// A provider HTTP error.
    Http {
        /// Status code.
        status: u16,
        /// Response body.
        body: String,
    },
}

/// A test backend that returns scripted replies in order.
///
/// Cycles back to the beginning when the script is exhausted. Every prompt
/// received is recorded and can be inspected with [`MockBackend::prompts`].
#[derive(Debug)]
pub struct MockBackend {
    replies: Vec<MockReply>,
    index: AtomicUsize,
    prompts: Mutex<Vec<String>>,
}

impl MockBackend {
    /// Create a mock that plays back `replies` in order.
    pub fn scripted(replies: Vec<MockReply>) -> Self {
        assert!(!replies.is_empty(), "MockBackend requires at least one reply");
        Self {
            replies,
            index: AtomicUsize::new(0),
            prompts: Mutex::new(Vec::new()),
        }
    }

    /// Create a mock that returns the given completions in order.
    pub fn new(responses: Vec<String>) -> Self {
        Self::scripted(responses.into_iter().map(MockReply::Text).collect())
    }

    /// Create a mock that always returns the same completion.
    pub fn fixed(response: impl Into<String>) -> Self {
        Self::new(vec![response.into()])
    }

    /// Number of completions requested so far.
    pub fn calls(&self) -> usize {
        self.index.load(Ordering::Relaxed)
    }

    /// Every prompt received so far, in call order.
    pub fn prompts(&self) -> Vec<String> {
        self.prompts
            .lock()
            .map(|p| p.clone())
            .unwrap_or_default()
    }

    fn next_reply(&self) -> MockReply {
        let idx = self.index.fetch_add(1, Ordering::Relaxed) % self.replies.len();
        self.replies[idx].clone()
    }
}

#[async_trait]
impl Backend for MockBackend {
    async fn complete(
        &self,
        _client: &Client,
        _base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse> {
        if let Ok(mut prompts) = self.prompts.lock() {
            prompts.push(request.prompt.clone());
        }
        match self.next_reply() {
            MockReply::Text(text) => Ok(LlmResponse { text, status: 200 }),
            MockReply::Fail(message) => Err(PipelineError::Other(message)),
            MockReply::Http { status, body } => Err(PipelineError::HttpError { status, body }),
        }
    }

    fn name(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::LlmConfig;

    fn request(prompt: &str) -> LlmRequest {
        LlmRequest {
            model: "test".to_string(),
            system_prompt: None,
            prompt: prompt.to_string(),
            config: LlmConfig::default(),
        }
    }

    #[tokio::test]
    async fn test_mock_fixed_response() {
        let mock = MockBackend::fixed("Hello!");
        let client = Client::new();
        let resp = mock.complete(&client, "http://unused", &request("p")).await.unwrap();
        assert_eq!(resp.text, "Hello!");
        assert_eq!(resp.status, 200);
    }

    #[tokio::test]
    async fn test_mock_cycles_responses() {
        let mock = MockBackend::new(vec!["first".into(), "second".into()]);
        let client = Client::new();
        let r1 = mock.complete(&client, "http://unused", &request("a")).await.unwrap();
        let r2 = mock.complete(&client, "http://unused", &request("b")).await.unwrap();
        let r3 = mock.complete(&client, "http://unused", &request("c")).await.unwrap();
        assert_eq!(r1.text, "first");
        assert_eq!(r2.text, "second");
        assert_eq!(r3.text, "first"); // cycles
        assert_eq!(mock.calls(), 3);
        assert_eq!(mock.prompts(), vec!["a", "b", "c"]);
    }

    #[tokio::test]
    async fn test_mock_scripted_failures() {
        let mock = MockBackend::scripted(vec![
            MockReply::Fail("boom".into()),
            MockReply::Http {
                status: 503,
                body: "unavailable".into(),
            },
        ]);
        let client = Client::new();
        let e1 = mock.complete(&client, "http://unused", &request("x")).await.unwrap_err();
        let e2 = mock.complete(&client, "http://unused", &request("x")).await.unwrap_err();
        assert_eq!(e1.to_string(), "boom");
        assert_eq!(e2.to_string(), "HTTP 503: unavailable");
    }
}
