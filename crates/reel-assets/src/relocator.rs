//! Asset relocation: republish a provider-hosted URL to durable storage.

use async_trait::async_trait;
use tracing::{debug, info};
use uuid::Uuid;

use crate::client::{guess_content_type, BucketClient};
use crate::error::{AssetError, AssetResult};

/// Relocates a transient provider URL to durable storage.
///
/// Implementations return a stable public URL. Callers treat failure as a
/// soft error and fall back to the source URL.
#[async_trait]
pub trait AssetRelocator: Send + Sync {
    /// Download `source_url` and republish it; `destination_hint` is a
    /// path prefix such as `videos/{project_id}`.
    async fn relocate(&self, source_url: &str, destination_hint: &str) -> AssetResult<String>;
}

/// Relocator that downloads over HTTP and republishes to an R2 bucket.
pub struct BucketRelocator {
    http: reqwest::Client,
    bucket: BucketClient,
}

impl BucketRelocator {
    pub fn new(bucket: BucketClient) -> Self {
        Self {
            http: reqwest::Client::new(),
            bucket,
        }
    }

    fn destination_key(source_url: &str, destination_hint: &str) -> String {
        let extension = source_url
            .split('?')
            .next()
            .and_then(|path| path.rsplit('.').next())
            .filter(|ext| ext.len() <= 4 && ext.chars().all(|c| c.is_ascii_alphanumeric()))
            .unwrap_or("mp4");

        format!(
            "{}/{}.{}",
            destination_hint.trim_matches('/'),
            Uuid::new_v4(),
            extension
        )
    }
}

#[async_trait]
impl AssetRelocator for BucketRelocator {
    async fn relocate(&self, source_url: &str, destination_hint: &str) -> AssetResult<String> {
        debug!(source = %source_url, hint = %destination_hint, "relocating asset");

        let response = self.http.get(source_url).send().await?;
        if !response.status().is_success() {
            return Err(AssetError::download_failed(format!(
                "{} returned {}",
                source_url,
                response.status()
            )));
        }

        let bytes = response.bytes().await?.to_vec();
        let key = Self::destination_key(source_url, destination_hint);
        let content_type = guess_content_type(source_url);

        let durable_url = self.bucket.upload_bytes(bytes, &key, content_type).await?;
        info!(source = %source_url, durable = %durable_url, "asset relocated");
        Ok(durable_url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_destination_key_keeps_extension() {
        let key = BucketRelocator::destination_key(
            "https://delivery.example/out.webm?expires=123",
            "videos/proj-1",
        );
        assert!(key.starts_with("videos/proj-1/"));
        assert!(key.ends_with(".webm"));
    }

    #[test]
    fn test_destination_key_defaults_to_mp4() {
        let key = BucketRelocator::destination_key("https://delivery.example/stream", "videos/p");
        assert!(key.ends_with(".mp4"));
    }
}
