//! Asset storage error types.

use thiserror::Error;

/// Result type for asset operations.
pub type AssetResult<T> = Result<T, AssetError>;

/// Errors that can occur while relocating or storing assets.
#[derive(Debug, Error)]
pub enum AssetError {
    #[error("Failed to configure storage client: {0}")]
    ConfigError(String),

    #[error("Download failed: {0}")]
    DownloadFailed(String),

    #[error("Upload failed: {0}")]
    UploadFailed(String),

    #[error("Invalid key: {0}")]
    InvalidKey(String),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl AssetError {
    pub fn config_error(msg: impl Into<String>) -> Self {
        Self::ConfigError(msg.into())
    }

    pub fn download_failed(msg: impl Into<String>) -> Self {
        Self::DownloadFailed(msg.into())
    }

    pub fn upload_failed(msg: impl Into<String>) -> Self {
        Self::UploadFailed(msg.into())
    }
}
