//! R2 bucket client.

use std::path::Path;

use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::config::{Builder, Region};
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client;
use tracing::{debug, info};

use crate::error::{AssetError, AssetResult};

/// Configuration for the bucket client.
#[derive(Debug, Clone)]
pub struct BucketConfig {
    /// S3 API endpoint URL.
    pub endpoint_url: String,
    /// Access key ID.
    pub access_key_id: String,
    /// Secret access key.
    pub secret_access_key: String,
    /// Bucket name.
    pub bucket_name: String,
    /// Region (usually "auto" for R2).
    pub region: String,
    /// Public base URL objects are served from.
    pub public_base_url: String,
}

impl BucketConfig {
    /// Create config from environment variables.
    pub fn from_env() -> AssetResult<Self> {
        Ok(Self {
            endpoint_url: std::env::var("R2_ENDPOINT_URL")
                .map_err(|_| AssetError::config_error("R2_ENDPOINT_URL not set"))?,
            access_key_id: std::env::var("R2_ACCESS_KEY_ID")
                .map_err(|_| AssetError::config_error("R2_ACCESS_KEY_ID not set"))?,
            secret_access_key: std::env::var("R2_SECRET_ACCESS_KEY")
                .map_err(|_| AssetError::config_error("R2_SECRET_ACCESS_KEY not set"))?,
            bucket_name: std::env::var("R2_BUCKET_NAME")
                .map_err(|_| AssetError::config_error("R2_BUCKET_NAME not set"))?,
            region: std::env::var("R2_REGION").unwrap_or_else(|_| "auto".to_string()),
            public_base_url: std::env::var("R2_PUBLIC_BASE_URL")
                .map_err(|_| AssetError::config_error("R2_PUBLIC_BASE_URL not set"))?,
        })
    }
}

/// S3-compatible bucket client serving objects from a public base URL.
#[derive(Clone)]
pub struct BucketClient {
    client: Client,
    bucket: String,
    public_base_url: String,
}

impl BucketClient {
    /// Create a new bucket client from configuration.
    pub fn new(config: BucketConfig) -> Self {
        let credentials = Credentials::new(
            &config.access_key_id,
            &config.secret_access_key,
            None,
            None,
            "r2",
        );

        let sdk_config = Builder::new()
            .behavior_version(BehaviorVersion::latest())
            .endpoint_url(&config.endpoint_url)
            .region(Region::new(config.region))
            .credentials_provider(credentials)
            .force_path_style(true)
            .build();

        Self {
            client: Client::from_conf(sdk_config),
            bucket: config.bucket_name,
            public_base_url: config.public_base_url.trim_end_matches('/').to_string(),
        }
    }

    /// Create from environment variables.
    pub fn from_env() -> AssetResult<Self> {
        Ok(Self::new(BucketConfig::from_env()?))
    }

    /// Upload bytes under `key`, returning the public URL.
    pub async fn upload_bytes(
        &self,
        data: Vec<u8>,
        key: &str,
        content_type: &str,
    ) -> AssetResult<String> {
        debug!("Uploading {} bytes to {}", data.len(), key);

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(ByteStream::from(data))
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AssetError::upload_failed(e.to_string()))?;

        Ok(self.public_url(key))
    }

    /// Upload a local file under `key`, returning the public URL.
    pub async fn upload_file(
        &self,
        path: impl AsRef<Path>,
        key: &str,
        content_type: &str,
    ) -> AssetResult<String> {
        let path = path.as_ref();
        debug!("Uploading {} to {}", path.display(), key);

        let body = ByteStream::from_path(path)
            .await
            .map_err(|e| AssetError::upload_failed(e.to_string()))?;

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(key)
            .body(body)
            .content_type(content_type)
            .send()
            .await
            .map_err(|e| AssetError::upload_failed(e.to_string()))?;

        info!("Uploaded {} to {}", path.display(), key);
        Ok(self.public_url(key))
    }

    /// Public URL for an object key.
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}", self.public_base_url, key.trim_start_matches('/'))
    }
}

/// Guess a content type from the tail of a URL or key.
pub fn guess_content_type(name: &str) -> &'static str {
    let name = name.split('?').next().unwrap_or(name);
    if name.ends_with(".mp4") {
        "video/mp4"
    } else if name.ends_with(".mp3") {
        "audio/mpeg"
    } else if name.ends_with(".png") {
        "image/png"
    } else if name.ends_with(".jpg") || name.ends_with(".jpeg") {
        "image/jpeg"
    } else {
        "application/octet-stream"
    }
}
