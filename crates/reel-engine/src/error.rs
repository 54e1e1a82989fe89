//! Engine error types.
//!
//! Expected failure modes (submission failures, provider-reported
//! failures, relocation failures) are captured as data on jobs and
//! projects, not as errors. Only precondition violations, unknown run
//! references, and store failures surface here.

use thiserror::Error;

pub type EngineResult<T> = Result<T, EngineError>;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Project not found: {0}")]
    ProjectNotFound(String),

    #[error("Precondition failed: {0}")]
    Precondition(String),

    #[error("No job known for run reference: {0}")]
    RunNotFound(String),

    #[error("Store error: {0}")]
    Store(#[from] reel_store::StoreError),
}

impl EngineError {
    pub fn precondition(msg: impl Into<String>) -> Self {
        Self::Precondition(msg.into())
    }
}
