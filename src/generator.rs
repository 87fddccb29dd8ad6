//! The quiz generator: analysis, questions, related topics, fallback.
//!
//! ```text
//! article ──► ArticleText (window + length check)
//!               │
//!               ├─► analysis ──► recover ─┬─► AnalysisResult
//!               │                         └─ repair once on failure
//!               ├─► quiz ──► recover/repair ──► QuestionSet ──► supplemental rounds
//!               ├─► related topics ──► recover (no repair)
//!               └─► fallback synthesis from the candidate pool ──► truncate to target
//! ```

use crate::{
    completion,
    config::QuizConfig,
    diagnostics::GenerationDiagnostics,
    error::Result,
    events::{emit, Event},
    exec_ctx::ExecCtx,
    fallback::{self, CandidatePool},
    llm_call::LlmCall,
    model_repair::{recover_or_repair, RepairSchema},
    output_parser::recover,
    prompt::{ANALYSIS_TEMPLATE, QUIZ_TEMPLATE, RELATED_TOPICS_TEMPLATE, SYSTEM_PROMPT},
    types::{value_kind, AnalysisResult, ArticleText, GeneratedQuiz, QuestionSet},
    PipelineError,
};
use serde_json::Value;
use std::sync::Arc;
use tracing::{info, warn};

/// Generates an analysis, a fixed-size quiz, and related topics for one
/// article.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use wiki_quiz::{ExecCtx, QuizGenerator};
///
/// let ctx = Arc::new(ExecCtx::from_env().build());
/// let quiz = QuizGenerator::new(ctx).generate(&article_text).await?;
/// println!("{} questions", quiz.questions.len());
/// ```
#[derive(Debug, Clone)]
pub struct QuizGenerator {
    ctx: Arc<ExecCtx>,
    config: QuizConfig,
    seed: Option<u64>,
}

impl QuizGenerator {
    pub fn new(ctx: Arc<ExecCtx>) -> Self {
        Self {
            ctx,
            config: QuizConfig::default(),
            seed: None,
        }
    }

    pub fn with_config(mut self, config: QuizConfig) -> Self {
        self.config = config;
        self
    }

    /// Seed the fallback synthesizer for reproducible fillers.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn config(&self) -> &QuizConfig {
        &self.config
    }

    pub fn ctx(&self) -> &ExecCtx {
        &self.ctx
    }

    /// Apply the input window and length check to raw article text.
    pub fn article(&self, raw: &str) -> Result<ArticleText> {
        ArticleText::new(raw, &self.config)
    }

    /// Extract title, summary, entities, and sections.
    pub async fn analyze_article(
        &self,
        article: &ArticleText,
        diag: &mut GenerationDiagnostics,
    ) -> Result<AnalysisResult> {
        let completion = LlmCall::new("analysis", ANALYSIS_TEMPLATE)
            .with_system(SYSTEM_PROMPT)
            .invoke(&self.ctx, &[("article_text", article.as_str())])
            .await?;
        diag.record_transport(completion.transport_retries, completion.backoff_ms);

        let recovered = recover_or_repair(&self.ctx, &completion.text, RepairSchema::Analysis).await?;
        diag.record_transport(recovered.transport_retries, recovered.backoff_ms);
        diag.analysis_repaired = recovered.repaired;

        AnalysisResult::from_value(recovered.value)
    }

    /// Generate the question list, running supplemental rounds if short.
    ///
    /// The result may hold fewer than the target (fallback is not applied
    /// here) or more (it is not truncated here).
    pub async fn generate_quiz(
        &self,
        article: &ArticleText,
        diag: &mut GenerationDiagnostics,
    ) -> Result<QuestionSet> {
        let target = self.config.target_questions.to_string();
        let completion = LlmCall::new("quiz", QUIZ_TEMPLATE)
            .with_system(SYSTEM_PROMPT)
            .invoke(
                &self.ctx,
                &[("article_text", article.as_str()), ("target", target.as_str())],
            )
            .await?;
        diag.record_transport(completion.transport_retries, completion.backoff_ms);

        let recovered = recover_or_repair(&self.ctx, &completion.text, RepairSchema::QuestionList).await?;
        diag.record_transport(recovered.transport_retries, recovered.backoff_ms);
        diag.quiz_repaired = recovered.repaired;
        diag.quiz_recovery = Some(recovered.stage);

        let items = match recovered.value {
            Value::Array(items) => items,
            other => {
                return Err(PipelineError::SchemaViolation {
                    expected: "a JSON array of question objects",
                    found: value_kind(&other).to_string(),
                })
            }
        };

        let mut set = QuestionSet::new();
        let accepted = set.merge_values(&items);
        info!(received = items.len(), accepted, "initial questions parsed");

        let outcome = completion::complete(&self.ctx, &mut set, article, &self.config).await?;
        diag.record_transport(outcome.transport_retries, outcome.backoff_ms);
        diag.supplemental_rounds = outcome.rounds;

        Ok(set)
    }

    /// Suggest follow-up topics. Parse failures are terminal.
    pub async fn generate_related_topics(
        &self,
        article: &ArticleText,
        diag: &mut GenerationDiagnostics,
    ) -> Result<Vec<String>> {
        let completion = LlmCall::new("related_topics", RELATED_TOPICS_TEMPLATE)
            .with_system(SYSTEM_PROMPT)
            .invoke(&self.ctx, &[("article_text", article.as_str())])
            .await?;
        diag.record_transport(completion.transport_retries, completion.backoff_ms);

        match recover(&completion.text)? {
            Value::Array(items) => items
                .into_iter()
                .map(|item| match item {
                    Value::String(s) => Ok(s),
                    other => Err(PipelineError::SchemaViolation {
                        expected: "a JSON array of strings",
                        found: format!("array containing {}", value_kind(&other)),
                    }),
                })
                .collect(),
            other => Err(PipelineError::SchemaViolation {
                expected: "a JSON array of strings",
                found: value_kind(&other).to_string(),
            }),
        }
    }

    /// Run the full pipeline on raw article text.
    pub async fn generate(&self, raw: &str) -> Result<GeneratedQuiz> {
        self.config.validate()?;
        let article = self.article(raw)?;
        self.generate_article(&article).await
    }

    /// Run the full pipeline on text that already passed the length check.
    pub async fn generate_article(&self, article: &ArticleText) -> Result<GeneratedQuiz> {
        let target = self.config.target_questions;
        let mut diag = GenerationDiagnostics::default();

        let analysis = self.analyze_article(article, &mut diag).await?;
        let mut questions = self.generate_quiz(article, &mut diag).await?;
        let related_topics = self.generate_related_topics(article, &mut diag).await?;

        questions.truncate(target);
        diag.model_questions = questions.len();

        if questions.len() < target {
            let shortfall = target - questions.len();
            let pool = CandidatePool::from_analysis(&analysis, &related_topics, self.config.min_candidate_chars);
            let mut rng = match self.seed {
                Some(seed) => fastrand::Rng::with_seed(seed),
                None => fastrand::Rng::new(),
            };
            let added = fallback::synthesize(
                &mut questions,
                &pool,
                target,
                &mut rng,
                self.config.explanation_prefix_chars,
            );
            diag.synthesized_questions = added;

            let remaining = shortfall - added;
            if remaining > 0 {
                warn!(
                    have = questions.len(),
                    target,
                    pool = pool.len(),
                    "quiz is short after fallback synthesis"
                );
            }
            emit(
                &self.ctx.event_handler,
                Event::FallbackFilled {
                    count: added,
                    shortfall: remaining,
                },
            );
        }

        info!(
            questions = questions.len(),
            model = diag.model_questions,
            synthesized = diag.synthesized_questions,
            related_topics = related_topics.len(),
            "quiz generated"
        );

        Ok(GeneratedQuiz {
            analysis,
            questions: questions.into_vec(),
            related_topics,
            diagnostics: diag,
        })
    }
}
