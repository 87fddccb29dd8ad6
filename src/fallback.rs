//! Local filler questions.
//!
//! When the model still under-delivers after the supplemental rounds, the
//! shortfall is filled with "which of these is mentioned" questions built
//! from strings the pipeline already has: section titles, related topics,
//! named entities, and summary sentences. Randomness is injected, so a fixed
//! seed gives a fixed quiz.

use crate::output_parser::error::prefix;
use crate::types::{AnalysisResult, Difficulty, Question, QuestionSet};
use std::collections::HashSet;
use tracing::debug;

/// Question text shared by every synthesized filler.
pub const FILLER_QUESTION: &str = "Which of the following is mentioned in the article?";

/// Minimum distinct candidates needed for one filler (answer + 3 distractors).
const MIN_POOL: usize = 4;

/// Deduplicated candidate strings, in preference order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CandidatePool {
    candidates: Vec<String>,
}

impl CandidatePool {
    /// Build a pool from `candidates`, trimming each, keeping the first
    /// occurrence of duplicates, and dropping strings of `min_chars`
    /// characters or fewer.
    pub fn new<I>(candidates: I, min_chars: usize) -> Self
    where
        I: IntoIterator<Item = String>,
    {
        let mut seen = HashSet::new();
        let candidates = candidates
            .into_iter()
            .map(|c| c.trim().to_string())
            .filter(|c| c.chars().count() > min_chars)
            .filter(|c| seen.insert(c.clone()))
            .collect();
        Self { candidates }
    }

    /// Sections, then related topics, then people, organizations, locations,
    /// then summary sentences.
    pub fn from_analysis(analysis: &AnalysisResult, related_topics: &[String], min_chars: usize) -> Self {
        let entities = &analysis.key_entities;
        let sentences = analysis
            .summary
            .as_deref()
            .unwrap_or_default()
            .split('.')
            .map(str::to_string);

        let all = analysis
            .sections
            .iter()
            .chain(related_topics)
            .chain(&entities.people)
            .chain(&entities.organizations)
            .chain(&entities.locations)
            .cloned()
            .chain(sentences);
        Self::new(all, min_chars)
    }

    pub fn len(&self) -> usize {
        self.candidates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.candidates.is_empty()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.candidates
    }
}

/// Append filler questions to `set` until it holds `target` items or the
/// pool runs out of unused answers. Returns how many were added.
///
/// Each candidate is used as an answer at most once. Distractors are three
/// other pool entries, so every filler has four distinct options. A pool
/// with fewer than four candidates produces nothing.
pub fn synthesize(
    set: &mut QuestionSet,
    pool: &CandidatePool,
    target: usize,
    rng: &mut fastrand::Rng,
    explanation_chars: usize,
) -> usize {
    if set.len() >= target {
        return 0;
    }
    if pool.len() < MIN_POOL {
        debug!(pool = pool.len(), "candidate pool too small for fallback questions");
        return 0;
    }

    let mut order: Vec<&String> = pool.candidates.iter().collect();
    rng.shuffle(&mut order);

    let mut added = 0;
    for answer in order {
        if set.len() >= target {
            break;
        }

        let mut distractors: Vec<&String> = pool.candidates.iter().filter(|c| *c != answer).collect();
        rng.shuffle(&mut distractors);

        let mut options: Vec<String> = std::iter::once(answer)
            .chain(distractors.into_iter().take(MIN_POOL - 1))
            .cloned()
            .collect();
        rng.shuffle(&mut options);

        set.append(Question {
            question: FILLER_QUESTION.to_string(),
            options,
            answer: answer.clone(),
            explanation: format!("Mentioned in article: {}", prefix(answer, explanation_chars)),
            difficulty: Difficulty::Medium,
        });
        added += 1;
    }

    debug!(added, total = set.len(), "synthesized fallback questions");
    added
}
