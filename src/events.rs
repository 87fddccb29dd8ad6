//! Per-request diagnostic events.
//!
//! The [`EventHandler`] travels inside the [`ExecCtx`](crate::ExecCtx), so
//! every request can have its own sink. Nothing is global. Events mirror the
//! `tracing` records the pipeline writes, but are delivered as typed values
//! for progress UIs and tests.

use std::sync::Arc;

/// Events emitted while generating an analysis or quiz.
#[derive(Debug, Clone, PartialEq)]
pub enum Event {
    /// A model call is starting.
    CallStart {
        /// Name of the call (e.g. `"analysis"`, `"quiz"`).
        name: String,
    },
    /// A model call has finished.
    CallEnd {
        /// Name of the call.
        name: String,
        /// Whether a non-empty completion came back.
        ok: bool,
    },
    /// A rate-limited call is about to be retried.
    TransportRetry {
        /// Name of the call being retried.
        name: String,
        /// The retry number (1-indexed).
        attempt: u32,
        /// Delay before this retry in milliseconds.
        delay_ms: u64,
        /// The error message that triggered the retry.
        reason: String,
    },
    /// Local recovery failed; asking the model to fix its own output.
    RepairStart {
        /// Which schema the repair targets (`"question_list"` or `"analysis"`).
        schema: &'static str,
        /// The parse error that triggered the repair.
        reason: String,
    },
    /// The repair round-trip has finished.
    RepairEnd {
        /// Which schema the repair targeted.
        schema: &'static str,
        /// Whether the repaired output parsed.
        success: bool,
    },
    /// A supplemental question round has finished.
    SupplementRound {
        /// Round number (1-indexed).
        round: u32,
        /// Questions requested this round.
        needed: usize,
        /// Unique questions actually added.
        added: usize,
    },
    /// Filler questions were synthesized locally.
    FallbackFilled {
        /// How many filler questions were appended.
        count: usize,
        /// Questions still missing after synthesis.
        shortfall: usize,
    },
}

/// Handler for pipeline events.
///
/// # Example
///
/// ```
/// use wiki_quiz::events::{Event, EventHandler};
///
/// struct PrintHandler;
///
/// impl EventHandler for PrintHandler {
///     fn on_event(&self, event: Event) {
///         if let Event::SupplementRound { round, added, .. } = event {
///             println!("round {} added {}", round, added);
///         }
///     }
/// }
/// ```
pub trait EventHandler: Send + Sync {
    /// Called when the pipeline emits an event.
    fn on_event(&self, event: Event);
}

/// Emit an event if a handler is present. No-op otherwise.
pub(crate) fn emit(handler: &Option<Arc<dyn EventHandler>>, event: Event) {
    if let Some(ref h) = handler {
        h.on_event(event);
    }
}

/// An [`EventHandler`] backed by a closure.
///
/// # Example
///
/// ```
/// use wiki_quiz::events::{Event, FnEventHandler};
/// use std::sync::Arc;
///
/// let handler = Arc::new(FnEventHandler(|event: Event| {
///     if let Event::FallbackFilled { count, .. } = event {
///         println!("synthesized {} questions", count);
///     }
/// }));
/// ```
pub struct FnEventHandler<F: Fn(Event) + Send + Sync>(pub F);

impl<F: Fn(Event) + Send + Sync> EventHandler for FnEventHandler<F> {
    fn on_event(&self, event: Event) {
        (self.0)(event);
    }
}

/// Test helper: an [`EventHandler`] that records every event.
#[cfg(test)]
#[derive(Default)]
pub(crate) struct RecordingHandler(pub std::sync::Mutex<Vec<Event>>);

#[cfg(test)]
impl RecordingHandler {
    pub(crate) fn events(&self) -> Vec<Event> {
        self.0.lock().map(|e| e.clone()).unwrap_or_default()
    }
}

#[cfg(test)]
impl EventHandler for RecordingHandler {
    fn on_event(&self, event: Event) {
        if let Ok(mut events) = self.0.lock() {
            events.push(event);
        }
    }
}
