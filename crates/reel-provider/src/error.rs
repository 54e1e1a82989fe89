//! Provider client error types.

use thiserror::Error;

pub type ProviderResult<T> = Result<T, ProviderError>;

#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Provider unavailable: {0}")]
    ServiceUnavailable(String),

    #[error("Submission rejected: {0}")]
    SubmissionRejected(String),

    #[error("Request failed: {0}")]
    RequestFailed(String),

    #[error("Run not found: {0}")]
    RunNotFound(String),

    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

impl ProviderError {
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ProviderError::ServiceUnavailable(_) | ProviderError::Network(_)
        )
    }
}
