//! URL-level service: fetch, generate, store, and list quizzes.
//!
//! [`QuizService`] ties the generator to two collaborators: a
//! [`ContentFetcher`] that turns a URL into article text, and a
//! [`QuizStore`] that keeps finished quizzes. A URL that was already
//! processed is served from the store without touching the model.

use crate::{
    config::QuizConfig,
    error::Result,
    generator::QuizGenerator,
    output_parser::error::truncate,
    types::{AnalysisResult, GeneratedQuiz, Question},
    PipelineError,
};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Article content returned by a [`ContentFetcher`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedArticle {
    /// The page as fetched (e.g. HTML).
    pub raw_source: String,
    /// Extracted plain article text.
    pub text: String,
}

/// Turns a URL into article text.
#[async_trait]
pub trait ContentFetcher: Send + Sync {
    async fn fetch(&self, url: &str) -> anyhow::Result<FetchedArticle>;
}

/// A quiz ready to be stored. The store assigns the id.
#[derive(Debug, Clone)]
pub struct QuizDraft {
    pub url: String,
    pub raw_source: String,
    pub analysis: AnalysisResult,
    pub questions: Vec<Question>,
    pub related_topics: Vec<String>,
}

impl QuizDraft {
    pub fn new(url: impl Into<String>, raw_source: impl Into<String>, quiz: GeneratedQuiz) -> Self {
        Self {
            url: url.into(),
            raw_source: raw_source.into(),
            analysis: quiz.analysis,
            questions: quiz.questions,
            related_topics: quiz.related_topics,
        }
    }
}

/// A stored quiz.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizRecord {
    pub id: u64,
    pub url: String,
    pub title: Option<String>,
    pub raw_source: String,
    pub analysis: AnalysisResult,
    pub questions: Vec<Question>,
    pub related_topics: Vec<String>,
}

/// One line of quiz history.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuizSummary {
    pub id: u64,
    pub url: String,
    pub title: Option<String>,
    pub summary: Option<String>,
}

/// Persistence for finished quizzes.
pub trait QuizStore: Send + Sync {
    fn find_by_url(&self, url: &str) -> Result<Option<QuizRecord>>;
    fn get(&self, id: u64) -> Result<Option<QuizRecord>>;
    fn insert(&self, draft: QuizDraft) -> Result<QuizRecord>;
    /// Every record, oldest first.
    fn list(&self) -> Result<Vec<QuizRecord>>;
}

#[derive(Debug, Default)]
struct StoreState {
    next_id: u64,
    records: BTreeMap<u64, QuizRecord>,
}

/// A [`QuizStore`] kept in memory. Ids start at 1 and only increase.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    state: Mutex<StoreState>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, StoreState>> {
        self.state
            .lock()
            .map_err(|_| PipelineError::Other("quiz store lock poisoned".into()))
    }
}

impl QuizStore for InMemoryStore {
    fn find_by_url(&self, url: &str) -> Result<Option<QuizRecord>> {
        Ok(self.lock()?.records.values().find(|r| r.url == url).cloned())
    }

    fn get(&self, id: u64) -> Result<Option<QuizRecord>> {
        Ok(self.lock()?.records.get(&id).cloned())
    }

    fn insert(&self, draft: QuizDraft) -> Result<QuizRecord> {
        let mut state = self.lock()?;
        state.next_id += 1;
        let record = QuizRecord {
            id: state.next_id,
            url: draft.url,
            title: draft.analysis.title.clone(),
            raw_source: draft.raw_source,
            analysis: draft.analysis,
            questions: draft.questions,
            related_topics: draft.related_topics,
        };
        state.records.insert(record.id, record.clone());
        Ok(record)
    }

    fn list(&self) -> Result<Vec<QuizRecord>> {
        Ok(self.lock()?.records.values().cloned().collect())
    }
}

/// Fetch, generate, and store quizzes by URL.
pub struct QuizService {
    generator: QuizGenerator,
    fetcher: Arc<dyn ContentFetcher>,
    store: Arc<dyn QuizStore>,
}

impl QuizService {
    pub fn new(
        generator: QuizGenerator,
        fetcher: Arc<dyn ContentFetcher>,
        store: Arc<dyn QuizStore>,
    ) -> Self {
        Self {
            generator,
            fetcher,
            store,
        }
    }

    fn config(&self) -> &QuizConfig {
        self.generator.config()
    }

    /// Return the stored quiz for `url`, generating it first if needed.
    pub async fn generate_for_url(&self, url: &str) -> Result<QuizRecord> {
        if let Some(record) = self.store.find_by_url(url)? {
            info!(url, id = record.id, "quiz served from store");
            return Ok(record);
        }

        self.config().validate()?;
        let fetched = self
            .fetcher
            .fetch(url)
            .await
            .map_err(|e| PipelineError::FetchFailed(format!("{}: {:#}", url, e)))?;

        let article = self.generator.article(&fetched.text).map_err(|e| match e {
            PipelineError::InputTooShort { len, min } => PipelineError::FetchFailed(format!(
                "{}: extracted text too short ({} chars, need {})",
                url, len, min
            )),
            other => other,
        })?;
        debug!(url, chars = article.len(), "article fetched");

        let quiz = self.generator.generate_article(&article).await?;
        let record = self
            .store
            .insert(QuizDraft::new(url, fetched.raw_source, quiz))?;
        info!(url, id = record.id, questions = record.questions.len(), "quiz stored");
        Ok(record)
    }

    /// Stored quizzes, newest first, with summaries shortened for listing.
    pub fn history(&self) -> Result<Vec<QuizSummary>> {
        let preview = self.config().summary_preview_chars;
        let mut records = self.store.list()?;
        records.sort_by(|a, b| b.id.cmp(&a.id));
        Ok(records
            .into_iter()
            .map(|r| QuizSummary {
                id: r.id,
                url: r.url,
                title: r.title,
                summary: r.analysis.summary.map(|s| truncate(&s, preview)),
            })
            .collect())
    }

    pub fn get(&self, id: u64) -> Result<QuizRecord> {
        self.store.get(id)?.ok_or(PipelineError::NotFound(id))
    }
}
