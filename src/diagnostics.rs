//! Generation diagnostics.
//!
//! [`GenerationDiagnostics`] records what it took to produce a quiz: how
//! often the provider rate-limited us, whether the model had to repair its
//! own JSON, how many supplemental rounds ran, and how many questions came
//! from the model versus local synthesis.

use crate::output_parser::RecoveryStage;

/// What happened while generating one quiz.
///
/// # Example
///
/// ```
/// use wiki_quiz::diagnostics::GenerationDiagnostics;
///
/// let diag = GenerationDiagnostics::default();
/// assert!(diag.clean());
/// ```
#[derive(Debug, Clone, Default, PartialEq)]
pub struct GenerationDiagnostics {
    /// Rate-limit retries across every model call.
    pub transport_retries: u32,

    /// Total time spent in backoff waits (milliseconds).
    pub backoff_total_ms: u64,

    /// Whether the analysis needed a model-assisted repair.
    pub analysis_repaired: bool,

    /// Whether the initial question list needed a model-assisted repair.
    pub quiz_repaired: bool,

    /// Recovery stage that produced the initial question list.
    pub quiz_recovery: Option<RecoveryStage>,

    /// Supplemental rounds actually run.
    pub supplemental_rounds: u32,

    /// Questions that came from the model (after dedup).
    pub model_questions: usize,

    /// Filler questions synthesized locally.
    pub synthesized_questions: usize,
}

impl GenerationDiagnostics {
    /// True when the model delivered everything on the first try.
    pub fn clean(&self) -> bool {
        self.transport_retries == 0
            && !self.analysis_repaired
            && !self.quiz_repaired
            && self.supplemental_rounds == 0
            && self.synthesized_questions == 0
    }

    /// Fold in transport retry counters from one model call.
    pub(crate) fn record_transport(&mut self, retries: u32, backoff_ms: u64) {
        self.transport_retries += retries;
        self.backoff_total_ms += backoff_ms;
    }
}
