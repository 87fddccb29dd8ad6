//! # LLM Output Recovery
//!
//! Extracts a well-formed JSON value from model output that may be wrapped
//! in markdown fences, followed by commentary or stack traces, truncated
//! mid-stream, or sprinkled with trailing commas. No model call is made here;
//! model-assisted repair lives in [`model_repair`](crate::model_repair).
//!
//! | Function | Purpose |
//! |----------|---------|
//! | [`recover`] | Staged recovery into a `serde_json::Value` |
//! | [`recover_with_stage`] | Same, plus which [`RecoveryStage`] succeeded |
//! | [`extract::scan_balanced`] | String-aware container boundary scan |
//! | [`repair::remove_trailing_commas`] | Drop commas before `}` / `]` |

pub mod error;
pub mod extract;
pub mod json;
pub mod repair;

pub use error::ParseError;
pub use json::{recover, recover_with_stage, RecoveryStage};
