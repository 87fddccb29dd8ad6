//! # Wiki Quiz
//!
//! Turns free-form LLM output into a validated article analysis and a
//! fixed-size multiple-choice quiz, despite markdown fences, trailing
//! commentary, truncated JSON, model under-generation, and rate limits.
//!
//! ## Core Concepts
//!
//! - **[`ExecCtx`]**: shared execution context (HTTP client, backend,
//!   model id, backoff policy, cancellation, optional event handler).
//! - **[`LlmCall`]**: renders a prompt template and invokes the backend
//!   through [`backend::with_backoff`], which retries rate-limited calls.
//! - **[`output_parser::recover`]**: staged JSON recovery from messy text.
//! - **[`model_repair`]**: one model round-trip to fix unparseable output.
//! - **[`completion`]**: supplemental rounds until the target count is met.
//! - **[`fallback`]**: seeded filler questions from local candidate strings.
//! - **[`QuizGenerator`]**: runs all of the above for one article.
//! - **[`QuizService`]**: fetch by URL, generate, store, and list.
//!
//! ## Quick Start
//!
//! ```no_run
//! use std::sync::Arc;
//! use wiki_quiz::{ExecCtx, QuizGenerator};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let ctx = Arc::new(ExecCtx::from_env().build());
//!     let article = std::fs::read_to_string("article.txt")?;
//!
//!     let quiz = QuizGenerator::new(ctx).generate(&article).await?;
//!     for q in &quiz.questions {
//!         println!("[{}] {}", q.difficulty, q.question);
//!     }
//!     Ok(())
//! }
//! ```

pub mod backend;
pub mod completion;
pub mod config;
pub mod diagnostics;
pub mod error;
pub mod events;
pub mod exec_ctx;
pub mod fallback;
pub mod generator;
pub mod llm_call;
pub mod model_repair;
pub mod output_parser;
pub mod prompt;
pub mod service;
pub mod types;

pub use backend::{BackoffConfig, MockBackend, MockReply, OllamaBackend};
pub use config::{LlmConfig, QuizConfig};
pub use diagnostics::GenerationDiagnostics;
pub use error::{PipelineError, Result};
pub use exec_ctx::{ExecCtx, ExecCtxBuilder};
pub use generator::QuizGenerator;
pub use llm_call::{Completion, LlmCall};
pub use output_parser::{recover, ParseError, RecoveryStage};
pub use service::{ContentFetcher, FetchedArticle, InMemoryStore, QuizRecord, QuizService, QuizStore, QuizSummary};
pub use types::{AnalysisResult, ArticleText, Difficulty, GeneratedQuiz, KeyEntities, Question, QuestionSet};
