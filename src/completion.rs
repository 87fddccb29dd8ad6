//! Supplemental question rounds.
//!
//! When the first question list comes up short, the model is asked for
//! exactly the missing count, with the existing questions attached so it
//! can avoid repeats. New items are merged by exact question text. Running
//! out of rounds is not an error; whatever is still missing is left for
//! [`fallback`](crate::fallback). Transport failures are, once the retrying
//! invoker has given up.

use crate::{
    config::QuizConfig,
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    llm_call::LlmCall,
    output_parser::recover,
    prompt::{MORE_QUESTIONS_TEMPLATE, SYSTEM_PROMPT},
    types::{value_kind, ArticleText, QuestionSet},
    PipelineError,
};
use serde_json::Value;
use tracing::{debug, info, warn};

/// What the supplemental rounds achieved.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CompletionOutcome {
    /// Rounds in which a request was sent.
    pub rounds: u32,
    /// Unique questions added across all rounds.
    pub added: usize,
    /// Rate-limit retries across all rounds.
    pub transport_retries: u32,
    /// Backoff time across all rounds (milliseconds).
    pub backoff_ms: u64,
}

/// Request more questions until `config.target_questions` is reached or
/// `config.supplemental_rounds` requests have been made.
///
/// The loop stops early, keeping what it has, when a round returns no
/// content or does not parse. A parsed value that is not a list is
/// discarded and the next round proceeds. Transport errors (including
/// [`PipelineError::RetryExhausted`]) and cancellation are returned.
pub async fn complete(
    ctx: &ExecCtx,
    set: &mut QuestionSet,
    article: &ArticleText,
    config: &QuizConfig,
) -> Result<CompletionOutcome> {
    let mut outcome = CompletionOutcome::default();
    let call = LlmCall::new("more_questions", MORE_QUESTIONS_TEMPLATE).with_system(SYSTEM_PROMPT);

    for round in 1..=config.supplemental_rounds {
        if set.len() >= config.target_questions {
            break;
        }
        let needed = config.target_questions - set.len();
        debug!(round, needed, have = set.len(), "requesting supplemental questions");

        let existing_json = set.to_json()?;
        let needed_str = needed.to_string();
        let vars = [
            ("needed", needed_str.as_str()),
            ("article_text", article.as_str()),
            ("existing_json", existing_json.as_str()),
        ];

        let completion = match call.invoke(ctx, &vars).await {
            Ok(c) => c,
            Err(PipelineError::EmptyResponse { .. }) => {
                info!(round, "supplemental call returned no content, stopping");
                break;
            }
            Err(e) => return Err(e),
        };
        outcome.rounds = round;
        outcome.transport_retries += completion.transport_retries;
        outcome.backoff_ms += completion.backoff_ms;

        let added = match recover(&completion.text) {
            Ok(Value::Array(items)) => set.merge_values(&items),
            Ok(other) => {
                debug!(round, kind = value_kind(&other), "supplemental output is not a list, discarding");
                0
            }
            Err(e) => {
                warn!(round, error = %e, "supplemental output did not parse, stopping");
                emit(
                    &ctx.event_handler,
                    Event::SupplementRound {
                        round,
                        needed,
                        added: 0,
                    },
                );
                break;
            }
        };

        outcome.added += added;
        info!(round, needed, added, total = set.len(), "supplemental round complete");
        emit(
            &ctx.event_handler,
            Event::SupplementRound {
                round,
                needed,
                added,
            },
        );
    }

    Ok(outcome)
}
