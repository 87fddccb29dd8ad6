//! Backend trait, normalized request/response types, and the retrying invoker.
//!
//! The [`Backend`] trait abstracts over LLM providers. [`with_backoff`] wraps
//! every call with rate-limit detection and backoff.
//!
//! ```text
//! LlmCall ──► LlmRequest ──► with_backoff ──► Backend::complete() ──► LlmResponse
//!                                 │                   │
//!                     rate limited? sleep, retry   ┌──┴──────────┐
//!                     anything else? propagate  OllamaBackend  MockBackend
//! ```

pub mod backoff;
pub mod mock;
pub mod ollama;

pub use backoff::BackoffConfig;
pub use mock::{MockBackend, MockReply};
pub use ollama::OllamaBackend;

use crate::config::LlmConfig;
use crate::error::Result;
use crate::PipelineError;
use async_trait::async_trait;
use reqwest::Client;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

/// Callback invoked before each rate-limit retry.
///
/// Arguments: `(attempt_number, delay_before_retry, reason_for_retry)`.
pub type RetryCallback<'a> = Option<&'a mut (dyn FnMut(u32, Duration, &str) + Send)>;

/// A normalized LLM request, independent of provider.
#[derive(Debug, Clone)]
pub struct LlmRequest {
    /// Model identifier (e.g. `"llama3.2:3b"`).
    pub model: String,

    /// Optional system prompt. Selects the chat endpoint on Ollama.
    pub system_prompt: Option<String>,

    /// The rendered user prompt.
    pub prompt: String,

    /// Sampling configuration.
    pub config: LlmConfig,
}

/// A normalized LLM response.
#[derive(Debug)]
pub struct LlmResponse {
    /// The generated text content.
    pub text: String,

    /// HTTP status code (for diagnostics/logging).
    pub status: u16,
}

/// Abstraction over LLM providers.
///
/// Transport failures come back as [`PipelineError`]s whose rendered message
/// carries the provider's text; rate limits are recognised from that text.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Execute a single non-streaming completion.
    async fn complete(
        &self,
        client: &Client,
        base_url: &str,
        request: &LlmRequest,
    ) -> Result<LlmResponse>;

    /// Human-readable name for logging and diagnostics.
    fn name(&self) -> &'static str;
}

fn is_cancelled(cancel: Option<&AtomicBool>) -> bool {
    cancel.is_some_and(|flag| flag.load(Ordering::Relaxed))
}

/// Execute a backend call, retrying rate-limited failures with backoff.
///
/// - Success returns immediately.
/// - An error whose message is not a rate limit is fatal and returned as-is.
/// - A rate-limited error sleeps for [`BackoffConfig::delay_for`] and retries,
///   up to `config.max_attempts` calls in total, after which the last error
///   is wrapped in [`PipelineError::RetryExhausted`].
///
/// The wait is a tokio timer, so dropping the returned future cancels it.
/// The `cancel` flag is checked before every attempt and after every wait.
pub async fn with_backoff(
    backend: &Arc<dyn Backend>,
    client: &Client,
    base_url: &str,
    request: &LlmRequest,
    config: &BackoffConfig,
    cancel: Option<&AtomicBool>,
    mut on_retry: RetryCallback<'_>,
) -> Result<LlmResponse> {
    let max_attempts = config.max_attempts.max(1);
    let mut attempt: u32 = 0;

    loop {
        if is_cancelled(cancel) {
            return Err(PipelineError::Cancelled);
        }

        let err = match backend.complete(client, base_url, request).await {
            Ok(response) => return Ok(response),
            Err(e) => e,
        };

        let message = err.to_string();
        if !backoff::is_rate_limited(&message) {
            debug!(backend = backend.name(), error = %message, "fatal transport error");
            return Err(err);
        }

        attempt += 1;
        if attempt >= max_attempts {
            warn!(
                backend = backend.name(),
                attempts = attempt,
                "rate limited on every attempt, giving up"
            );
            return Err(PipelineError::RetryExhausted {
                attempts: attempt,
                last: Box::new(err),
            });
        }

        let delay = config.delay_for(&message, attempt - 1);
        warn!(
            backend = backend.name(),
            attempt,
            delay_ms = delay.as_millis() as u64,
            "rate limited, backing off"
        );
        if let Some(ref mut cb) = on_retry {
            cb(attempt, delay, &message);
        }

        tokio::time::sleep(delay).await;

        if is_cancelled(cancel) {
            return Err(PipelineError::Cancelled);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::time::Instant;

    fn request() -> LlmRequest {
        LlmRequest {
            model: "test".into(),
            system_prompt: None,
            prompt: "test".into(),
            config: LlmConfig::default(),
        }
    }

    async fn run(
        mock: &Arc<MockBackend>,
        config: &BackoffConfig,
        cancel: Option<&AtomicBool>,
    ) -> (Result<LlmResponse>, Vec<(u32, Duration)>) {
        let backend: Arc<dyn Backend> = mock.clone();
        let client = Client::new();
        let mut retries = Vec::new();
        let mut on_retry = |attempt: u32, delay: Duration, _reason: &str| {
            retries.push((attempt, delay));
        };
        let result = with_backoff(
            &backend,
            &client,
            "http://unused",
            &request(),
            config,
            cancel,
            Some(&mut on_retry),
        )
        .await;
        (result, retries)
    }

    #[tokio::test(start_paused = true)]
    async fn success_on_first_attempt() {
        let mock = Arc::new(MockBackend::fixed("ok"));
        let (result, retries) = run(&mock, &BackoffConfig::standard(), None).await;
        assert_eq!(result.unwrap().text, "ok");
        assert!(retries.is_empty());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn rate_limit_then_success_uses_hinted_delay() {
        let mock = Arc::new(MockBackend::scripted(vec![
            MockReply::Fail("429 RESOURCE_EXHAUSTED. Please retry in 2.5s.".into()),
            MockReply::Text("recovered".into()),
        ]));
        let started = Instant::now();
        let (result, retries) = run(&mock, &BackoffConfig::standard(), None).await;

        assert_eq!(result.unwrap().text, "recovered");
        assert_eq!(retries, vec![(1, Duration::from_millis(2500))]);
        assert!(started.elapsed() >= Duration::from_millis(2500));
        assert_eq!(mock.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn exponential_fallback_between_attempts() {
        let mock = Arc::new(MockBackend::scripted(vec![
            MockReply::Fail("quota exceeded".into()),
            MockReply::Fail("quota exceeded".into()),
            MockReply::Text("third time lucky".into()),
        ]));
        let (result, retries) = run(&mock, &BackoffConfig::standard(), None).await;

        assert_eq!(result.unwrap().text, "third time lucky");
        assert_eq!(
            retries,
            vec![(1, Duration::from_secs(5)), (2, Duration::from_secs(10))]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn exhausted_after_max_attempts() {
        let mock = Arc::new(MockBackend::scripted(vec![MockReply::Fail(
            "rate limit reached".into(),
        )]));
        let (result, retries) = run(&mock, &BackoffConfig::standard(), None).await;

        match result {
            Err(PipelineError::RetryExhausted { attempts, last }) => {
                assert_eq!(attempts, 3);
                assert!(last.to_string().contains("rate limit"));
            }
            other => panic!("expected RetryExhausted, got {:?}", other),
        }
        // No wait after the final attempt
        assert_eq!(retries.len(), 2);
        assert_eq!(mock.calls(), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn fatal_error_is_not_retried() {
        let mock = Arc::new(MockBackend::scripted(vec![
            MockReply::Fail("invalid API key".into()),
            MockReply::Text("never reached".into()),
        ]));
        let (result, retries) = run(&mock, &BackoffConfig::standard(), None).await;

        assert!(matches!(result, Err(PipelineError::Other(ref m)) if m == "invalid API key"));
        assert!(retries.is_empty());
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn http_429_status_is_rate_limited() {
        let mock = Arc::new(MockBackend::scripted(vec![
            MockReply::Http {
                status: 429,
                body: "Too Many Requests".into(),
            },
            MockReply::Text("fine".into()),
        ]));
        let (result, retries) = run(&mock, &BackoffConfig::standard(), None).await;
        assert_eq!(result.unwrap().text, "fine");
        assert_eq!(retries.len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn respects_cancellation_before_first_attempt() {
        let cancel = AtomicBool::new(true);
        let mock = Arc::new(MockBackend::fixed("unused"));
        let (result, _) = run(&mock, &BackoffConfig::standard(), Some(&cancel)).await;
        assert!(matches!(result, Err(PipelineError::Cancelled)));
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn single_attempt_config_exhausts_immediately() {
        let mock = Arc::new(MockBackend::scripted(vec![MockReply::Fail("429".into())]));
        let (result, retries) = run(&mock, &BackoffConfig::none(), None).await;
        assert!(matches!(
            result,
            Err(PipelineError::RetryExhausted { attempts: 1, .. })
        ));
        assert!(retries.is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn outer_timeout_interrupts_backoff() {
        let mock = Arc::new(MockBackend::scripted(vec![MockReply::Fail(
            "Please retry in 100s".into(),
        )]));
        let outcome = tokio::time::timeout(
            Duration::from_secs(1),
            run(&mock, &BackoffConfig::standard(), None),
        )
        .await;
        assert!(outcome.is_err(), "timeout should fire during the backoff wait");
        assert_eq!(mock.calls(), 1);
    }
}
