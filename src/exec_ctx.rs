//! Execution context shared by every model call in a request.
//!
//! [`ExecCtx`] carries the HTTP client, LLM backend, endpoint, model id,
//! backoff policy, cancellation handle, and optional event handler. It holds
//! no mutable state, so one context can serve many concurrent requests.

use crate::backend::{Backend, BackoffConfig, OllamaBackend};
use crate::config::LlmConfig;
use crate::events::EventHandler;
use reqwest::Client;
use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc,
};
use std::time::Duration;

/// Environment variable for the provider base URL.
pub const ENV_LLM_URL: &str = "WIKI_QUIZ_LLM_URL";
/// Environment variable for the model identifier.
pub const ENV_MODEL: &str = "WIKI_QUIZ_MODEL";

const DEFAULT_BASE_URL: &str = "http://localhost:11434";
const DEFAULT_MODEL: &str = "llama3.2:3b";

/// Shared execution context for model calls.
///
/// # Example
///
/// ```
/// use wiki_quiz::ExecCtx;
/// use wiki_quiz::backend::BackoffConfig;
///
/// let ctx = ExecCtx::builder("http://localhost:11434")
///     .model("llama3.2:3b")
///     .backoff(BackoffConfig::interactive())
///     .build();
/// assert_eq!(ctx.model, "llama3.2:3b");
/// ```
pub struct ExecCtx {
    /// HTTP client (cheap to clone -- uses `Arc` internally).
    pub client: Client,
    /// Base URL for the LLM provider (e.g. `http://localhost:11434`).
    pub base_url: String,
    /// LLM backend. Default: [`OllamaBackend`].
    pub backend: Arc<dyn Backend>,
    /// Rate-limit retry policy. Default: [`BackoffConfig::standard()`].
    pub backoff: BackoffConfig,
    /// Model identifier sent with every request.
    pub model: String,
    /// Sampling configuration sent with every request.
    pub llm: LlmConfig,
    /// Optional cancellation flag, checked around every model call and wait.
    pub cancellation: Option<Arc<AtomicBool>>,
    /// Optional event handler for lifecycle events.
    pub event_handler: Option<Arc<dyn EventHandler>>,
}

impl ExecCtx {
    /// Create a new builder.
    pub fn builder(base_url: impl Into<String>) -> ExecCtxBuilder {
        ExecCtxBuilder {
            client: None,
            base_url: base_url.into(),
            backend: None,
            backoff: None,
            model: None,
            llm: None,
            cancellation: None,
            event_handler: None,
            timeout: None,
        }
    }

    /// Builder seeded from `WIKI_QUIZ_LLM_URL` and `WIKI_QUIZ_MODEL`.
    pub fn from_env() -> ExecCtxBuilder {
        let base_url =
            std::env::var(ENV_LLM_URL).unwrap_or_else(|_| DEFAULT_BASE_URL.to_string());
        let builder = Self::builder(base_url);
        match std::env::var(ENV_MODEL) {
            Ok(model) if !model.trim().is_empty() => builder.model(model),
            _ => builder,
        }
    }

    /// Check whether cancellation has been requested.
    pub fn is_cancelled(&self) -> bool {
        self.cancellation
            .as_ref()
            .is_some_and(|c| c.load(Ordering::Relaxed))
    }

    /// Return an error if cancellation has been requested.
    pub fn check_cancelled(&self) -> crate::error::Result<()> {
        if self.is_cancelled() {
            return Err(crate::PipelineError::Cancelled);
        }
        Ok(())
    }

    /// Get a reference to the cancellation AtomicBool, if set.
    pub fn cancel_flag(&self) -> Option<&AtomicBool> {
        self.cancellation.as_deref()
    }
}

impl std::fmt::Debug for ExecCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExecCtx")
            .field("base_url", &self.base_url)
            .field("backend", &self.backend.name())
            .field("model", &self.model)
            .field("backoff", &self.backoff)
            .field("has_cancellation", &self.cancellation.is_some())
            .field("has_event_handler", &self.event_handler.is_some())
            .finish()
    }
}

/// Builder for [`ExecCtx`].
pub struct ExecCtxBuilder {
    client: Option<Client>,
    base_url: String,
    backend: Option<Arc<dyn Backend>>,
    backoff: Option<BackoffConfig>,
    model: Option<String>,
    llm: Option<LlmConfig>,
    cancellation: Option<Arc<AtomicBool>>,
    event_handler: Option<Arc<dyn EventHandler>>,
    timeout: Option<Duration>,
}

impl ExecCtxBuilder {
    /// Set the HTTP client. If not set, a default client is created.
    pub fn client(mut self, client: Client) -> Self {
        self.client = Some(client);
        self
    }

    /// Set the LLM backend. Default: [`OllamaBackend`].
    pub fn backend(mut self, backend: Arc<dyn Backend>) -> Self {
        self.backend = Some(backend);
        self
    }

    /// Set the rate-limit retry policy. Default: [`BackoffConfig::standard()`].
    pub fn backoff(mut self, config: BackoffConfig) -> Self {
        self.backoff = Some(config);
        self
    }

    /// Set the model identifier. Default: `llama3.2:3b`.
    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Set the sampling configuration. Default: [`LlmConfig::default()`].
    pub fn llm_config(mut self, config: LlmConfig) -> Self {
        self.llm = Some(config);
        self
    }

    /// Set the cancellation flag.
    pub fn cancellation(mut self, cancel: Option<Arc<AtomicBool>>) -> Self {
        self.cancellation = cancel;
        self
    }

    /// Set the event handler.
    pub fn event_handler(mut self, handler: Arc<dyn EventHandler>) -> Self {
        self.event_handler = Some(handler);
        self
    }

    /// Set the per-request HTTP timeout. Default: 60 seconds.
    ///
    /// Ignored when a custom `Client` is supplied via `.client()`.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    /// Build the execution context.
    pub fn build(self) -> ExecCtx {
        let timeout = self.timeout.unwrap_or(Duration::from_secs(60));
        let client = self.client.unwrap_or_else(|| {
            Client::builder()
                .timeout(timeout)
                .build()
                .unwrap_or_else(|_| Client::new())
        });
        ExecCtx {
            client,
            base_url: normalize_base_url(&self.base_url),
            backend: self.backend.unwrap_or_else(|| Arc::new(OllamaBackend)),
            backoff: self.backoff.unwrap_or_default(),
            model: self.model.unwrap_or_else(|| DEFAULT_MODEL.to_string()),
            llm: self.llm.unwrap_or_default(),
            cancellation: self.cancellation,
            event_handler: self.event_handler,
        }
    }
}

/// Strip known provider path suffixes from a base URL.
/// e.g., "http://localhost:11434/api" -> "http://localhost:11434"
fn normalize_base_url(url: &str) -> String {
    let trimmed = url.trim_end_matches('/');
    for suffix in &["/api/generate", "/api/chat", "/api"] {
        if let Some(stripped) = trimmed.strip_suffix(suffix) {
            return stripped.to_string();
        }
    }
    trimmed.to_string()
}
