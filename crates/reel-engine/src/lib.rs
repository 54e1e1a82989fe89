//! Job reconciliation engine.
//!
//! Converges a project's desired state (every scene gets a video, then one
//! composed final cut) against externally-hosted, webhook-or-poll-driven
//! generation runs. This crate provides:
//! - Submission: ensure a generation job is in flight per uncovered scene
//! - Completion: idempotent application of success/failure signals from
//!   either delivery path
//! - Correlation: scene↔job matching with content and positional fallbacks
//! - Reconciliation passes with staleness sweeping and bounded retries
//! - Compose finalization with cost/duration rollup

pub mod completion;
pub mod compose;
pub mod config;
pub mod correlate;
pub mod engine;
pub mod error;
pub mod progress;
pub mod reconcile;
pub mod submission;

pub use completion::CompletionOutcome;
pub use compose::ComposeFinalization;
pub use config::EngineConfig;
pub use correlate::{resolve_scene, SceneMatch};
pub use engine::ReconcileEngine;
pub use error::{EngineError, EngineResult};
pub use progress::{compute_progress, rollup_totals};
pub use reconcile::ReconcileOutcome;
pub use submission::SubmissionReport;

#[cfg(test)]
mod tests;
