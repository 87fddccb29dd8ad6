//! LLM call: the unit every pipeline stage goes through.
//!
//! [`LlmCall`] renders a prompt template, dispatches it through
//! [`with_backoff`](crate::backend::with_backoff) on the context's backend,
//! and returns the completion text together with its transport statistics.

use crate::{
    backend::{self, LlmRequest},
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    prompt, PipelineError,
};
use tracing::{debug, info};

/// A completion plus what it cost to get it.
#[derive(Debug, Clone, PartialEq)]
pub struct Completion {
    /// The raw completion text. Never empty.
    pub text: String,
    /// Rate-limit retries performed for this call.
    pub transport_retries: u32,
    /// Time spent waiting in backoff (milliseconds).
    pub backoff_ms: u64,
}

/// A named prompt template invoked against the context's backend.
///
/// # Example
///
/// ```ignore
/// use wiki_quiz::{ExecCtx, LlmCall};
/// use wiki_quiz::prompt::RELATED_TOPICS_TEMPLATE;
///
/// let call = LlmCall::new("related_topics", RELATED_TOPICS_TEMPLATE);
/// let ctx = ExecCtx::builder("http://localhost:11434").build();
/// let completion = call.invoke(&ctx, &[("article_text", "...")]).await?;
/// ```
#[derive(Debug, Clone)]
pub struct LlmCall {
    /// Instance name (for logging/events).
    name: String,
    /// Prompt template with `{key}` placeholders.
    prompt_template: String,
    /// Optional system prompt (triggers the chat endpoint on Ollama).
    system: Option<String>,
}

impl LlmCall {
    /// Create a new call with a prompt template.
    pub fn new(name: impl Into<String>, prompt_template: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            prompt_template: prompt_template.into(),
            system: None,
        }
    }

    /// Set a system prompt.
    pub fn with_system(mut self, system: impl Into<String>) -> Self {
        self.system = Some(system.into());
        self
    }

    /// Returns the call name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the prompt template.
    pub fn prompt_template(&self) -> &str {
        &self.prompt_template
    }

    fn build_request(&self, ctx: &ExecCtx, prompt: String) -> LlmRequest {
        LlmRequest {
            model: ctx.model.clone(),
            system_prompt: self.system.clone(),
            prompt,
            config: ctx.llm.clone(),
        }
    }

    /// Render the template with `vars` and invoke the backend.
    ///
    /// Rate-limited failures are retried per `ctx.backoff`. An empty (or
    /// whitespace-only) completion is [`PipelineError::EmptyResponse`].
    pub async fn invoke(&self, ctx: &ExecCtx, vars: &[(&str, &str)]) -> Result<Completion> {
        ctx.check_cancelled()?;
        emit(
            &ctx.event_handler,
            Event::CallStart {
                name: self.name.clone(),
            },
        );

        let request = self.build_request(ctx, prompt::render(&self.prompt_template, vars));
        debug!(call = %self.name, prompt_chars = request.prompt.len(), "invoking model");

        let mut transport_retries: u32 = 0;
        let mut backoff_ms: u64 = 0;
        let name = self.name.clone();
        let event_handler = ctx.event_handler.clone();
        let mut on_retry = |attempt: u32, delay: std::time::Duration, reason: &str| {
            transport_retries = attempt;
            backoff_ms += delay.as_millis() as u64;
            emit(
                &event_handler,
                Event::TransportRetry {
                    name: name.clone(),
                    attempt,
                    delay_ms: delay.as_millis() as u64,
                    reason: reason.to_string(),
                },
            );
        };

        let result = backend::with_backoff(
            &ctx.backend,
            &ctx.client,
            &ctx.base_url,
            &request,
            &ctx.backoff,
            ctx.cancel_flag(),
            Some(&mut on_retry),
        )
        .await;

        let outcome = result.and_then(|response| {
            if response.text.trim().is_empty() {
                Err(PipelineError::EmptyResponse {
                    call: self.name.clone(),
                })
            } else {
                Ok(response.text)
            }
        });

        emit(
            &ctx.event_handler,
            Event::CallEnd {
                name: self.name.clone(),
                ok: outcome.is_ok(),
            },
        );

        let text = outcome?;
        info!(
            call = %self.name,
            chars = text.len(),
            transport_retries,
            "model call complete"
        );
        Ok(Completion {
            text,
            transport_retries,
            backoff_ms,
        })
    }
}
