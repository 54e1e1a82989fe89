//! Composition error types.

use thiserror::Error;

pub type ComposeResult<T> = Result<T, ComposeError>;

#[derive(Debug, Error)]
pub enum ComposeError {
    #[error("FFmpeg binary not found in PATH")]
    FfmpegNotFound,

    #[error("FFmpeg failed (exit code {code:?}): {stderr}")]
    FfmpegFailed { code: Option<i32>, stderr: String },

    #[error("FFmpeg timed out after {0} seconds")]
    Timeout(u64),

    #[error("No clips to compose")]
    NoClips,

    #[error("Clip download failed: {0}")]
    DownloadFailed(String),

    #[error("Upload failed: {0}")]
    Upload(#[from] reel_assets::AssetError),

    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
