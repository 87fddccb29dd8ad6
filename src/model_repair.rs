//! Model-assisted repair of unparseable output.
//!
//! When [`recover`](crate::output_parser::recover) gives up, the broken text
//! is sent back to the model once, with a reminder of the expected schema.
//! If that call fails, or its answer still does not parse, the result is
//! [`PipelineError::RepairFailed`].

use crate::{
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    llm_call::{Completion, LlmCall},
    output_parser::{recover_with_stage, RecoveryStage},
    prompt::{REPAIR_ANALYSIS_TEMPLATE, REPAIR_QUIZ_TEMPLATE, SYSTEM_PROMPT},
    PipelineError,
};
use serde_json::Value;
use tracing::{info, warn};

/// Which shape the repaired output must have.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RepairSchema {
    /// A JSON array of question objects.
    QuestionList,
    /// A JSON object with title, summary, key_entities, sections.
    Analysis,
}

impl RepairSchema {
    pub fn as_str(self) -> &'static str {
        match self {
            RepairSchema::QuestionList => "question_list",
            RepairSchema::Analysis => "analysis",
        }
    }

    fn template(self) -> &'static str {
        match self {
            RepairSchema::QuestionList => REPAIR_QUIZ_TEMPLATE,
            RepairSchema::Analysis => REPAIR_ANALYSIS_TEMPLATE,
        }
    }

    fn call_name(self) -> &'static str {
        match self {
            RepairSchema::QuestionList => "repair_quiz",
            RepairSchema::Analysis => "repair_analysis",
        }
    }
}

/// A recovered value and how it was obtained.
#[derive(Debug, Clone, PartialEq)]
pub struct Recovered {
    pub value: Value,
    /// Stage that produced `value` (from the repaired text if `repaired`).
    pub stage: RecoveryStage,
    /// Whether the model had to repair its output.
    pub repaired: bool,
    /// Rate-limit retries spent on the repair call.
    pub transport_retries: u32,
    /// Backoff time spent on the repair call (milliseconds).
    pub backoff_ms: u64,
}

/// Ask the model to fix `broken` so it matches `schema`.
pub async fn request_repair(ctx: &ExecCtx, broken: &str, schema: RepairSchema) -> Result<Completion> {
    LlmCall::new(schema.call_name(), schema.template())
        .with_system(SYSTEM_PROMPT)
        .invoke(ctx, &[("broken_json", broken)])
        .await
}

/// Recover JSON from `raw`, falling back to one model repair round-trip.
///
/// Cancellation during the repair call is returned as
/// [`PipelineError::Cancelled`], not folded into `RepairFailed`.
pub async fn recover_or_repair(ctx: &ExecCtx, raw: &str, schema: RepairSchema) -> Result<Recovered> {
    let original = match recover_with_stage(raw) {
        Ok((value, stage)) => {
            return Ok(Recovered {
                value,
                stage,
                repaired: false,
                transport_retries: 0,
                backoff_ms: 0,
            })
        }
        Err(e) => e,
    };

    warn!(schema = schema.as_str(), error = %original, "local recovery failed, requesting model repair");
    emit(
        &ctx.event_handler,
        Event::RepairStart {
            schema: schema.as_str(),
            reason: original.to_string(),
        },
    );

    let outcome = match request_repair(ctx, raw, schema).await {
        Ok(completion) => recover_with_stage(&completion.text)
            .map(|(value, stage)| (value, stage, completion))
            .map_err(PipelineError::from),
        Err(e) => Err(e),
    };

    emit(
        &ctx.event_handler,
        Event::RepairEnd {
            schema: schema.as_str(),
            success: outcome.is_ok(),
        },
    );

    match outcome {
        Ok((value, stage, completion)) => {
            info!(schema = schema.as_str(), stage = stage.as_str(), "model repair succeeded");
            Ok(Recovered {
                value,
                stage,
                repaired: true,
                transport_retries: completion.transport_retries,
                backoff_ms: completion.backoff_ms,
            })
        }
        Err(PipelineError::Cancelled) => Err(PipelineError::Cancelled),
        Err(repair) => Err(PipelineError::RepairFailed {
            original: original.to_string(),
            repair: repair.to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::{MockBackend, MockReply};
    use crate::events::RecordingHandler;
    use serde_json::json;
    use std::sync::Arc;

    fn ctx(mock: &Arc<MockBackend>) -> ExecCtx {
        ExecCtx::builder("http://unused").backend(mock.clone()).build()
    }

    #[tokio::test]
    async fn valid_input_makes_no_model_call() {
        let mock = Arc::new(MockBackend::fixed("unused"));
        let recovered = recover_or_repair(&ctx(&mock), "```json\n[1, 2]\n```", RepairSchema::QuestionList)
            .await
            .unwrap();
        assert_eq!(recovered.value, json!([1, 2]));
        assert!(!recovered.repaired);
        assert_eq!(mock.calls(), 0);
    }

    #[tokio::test]
    async fn broken_input_is_repaired_by_model() {
        let mock = Arc::new(MockBackend::fixed(r#"[{"question": "Fixed?"}]"#));
        let recorder = Arc::new(RecordingHandler::default());
        let ctx = ExecCtx::builder("http://unused")
            .backend(mock.clone())
            .event_handler(recorder.clone())
            .build();

        let recovered = recover_or_repair(&ctx, "here you go: [{\"question\": \"Broken", RepairSchema::QuestionList)
            .await
            .unwrap();
        assert!(recovered.repaired);
        assert_eq!(recovered.value, json!([{"question": "Fixed?"}]));

        let prompts = mock.prompts();
        assert_eq!(prompts.len(), 1);
        assert!(prompts[0].contains("JSON array of quiz question objects"));
        assert!(prompts[0].contains("[{\"question\": \"Broken"));

        let events = recorder.events();
        assert!(matches!(events.first(), Some(Event::RepairStart { schema: "question_list", .. })));
        assert!(matches!(
            events.last(),
            Some(Event::RepairEnd {
                schema: "question_list",
                success: true
            })
        ));
    }

    #[tokio::test]
    async fn analysis_uses_its_own_instructions() {
        let mock = Arc::new(MockBackend::fixed(r#"{"title": "T"}"#));
        let recovered = recover_or_repair(&ctx(&mock), "no json here", RepairSchema::Analysis)
            .await
            .unwrap();
        assert_eq!(recovered.value["title"], "T");
        assert!(mock.prompts()[0].contains("key_entities (object with arrays"));
    }

    #[tokio::test]
    async fn unparseable_repair_is_repair_failed() {
        let mock = Arc::new(MockBackend::fixed("still not json"));
        let err = recover_or_repair(&ctx(&mock), "garbage", RepairSchema::Analysis)
            .await
            .unwrap_err();
        match err {
            PipelineError::RepairFailed { original, repair } => {
                assert!(original.contains("garbage"));
                assert!(repair.contains("still not json"));
            }
            other => panic!("expected RepairFailed, got {:?}", other),
        }
        assert_eq!(mock.calls(), 1);
    }

    #[tokio::test]
    async fn failed_repair_call_is_repair_failed() {
        let mock = Arc::new(MockBackend::scripted(vec![MockReply::Fail("connection reset".into())]));
        let err = recover_or_repair(&ctx(&mock), "garbage", RepairSchema::QuestionList)
            .await
            .unwrap_err();
        assert!(matches!(err, PipelineError::RepairFailed { ref repair, .. } if repair == "connection reset"));
    }
}
