//! Compiled artifact storage.
//!
//! Rendered PDFs are short-lived: each upload is paired with a background
//! task that deletes it once the configured TTL has passed.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use aws_config::Region;
use aws_sdk_s3::config::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::Client as S3Client;
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;

use crate::config::Config;

const KEY_PREFIX: &str = "renders";

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("S3 error: {0}")]
    S3(String),
}

#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn put(&self, id: Uuid, pdf: Vec<u8>) -> Result<(), StoreError>;

    /// `Ok(None)` when the artifact never existed or has expired.
    async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, StoreError>;

    async fn delete(&self, id: Uuid) -> Result<(), StoreError>;
}

pub fn artifact_key(id: Uuid) -> String {
    format!("{KEY_PREFIX}/{id}.pdf")
}

/// Artifacts stored as `renders/<uuid>.pdf` in one bucket.
pub struct S3ArtifactStore {
    s3: S3Client,
    bucket: String,
}

impl S3ArtifactStore {
    pub fn new(s3: S3Client, bucket: String) -> Self {
        Self { s3, bucket }
    }

    /// Static credentials against `S3_ENDPOINT`: MinIO locally, AWS in production.
    pub async fn connect(config: &Config) -> Self {
        let credentials = Credentials::new(
            &config.aws_access_key_id,
            &config.aws_secret_access_key,
            None,
            None,
            "tailor-static",
        );

        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new("us-east-1"))
            .credentials_provider(credentials)
            .endpoint_url(&config.s3_endpoint)
            .load()
            .await;

        Self::new(S3Client::new(&sdk_config), config.s3_bucket.clone())
    }
}

#[async_trait]
impl ArtifactStore for S3ArtifactStore {
    async fn put(&self, id: Uuid, pdf: Vec<u8>) -> Result<(), StoreError> {
        let key = artifact_key(id);
        self.s3
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .body(ByteStream::from(pdf))
            .content_type("application/pdf")
            .send()
            .await
            .map_err(|e| StoreError::S3(format!("upload failed: {e}")))?;

        info!("Uploaded rendered PDF to s3://{}/{}", self.bucket, key);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, StoreError> {
        let result = self
            .s3
            .get_object()
            .bucket(&self.bucket)
            .key(artifact_key(id))
            .send()
            .await;

        let output = match result {
            Ok(output) => output,
            Err(e) if e.as_service_error().is_some_and(|se| se.is_no_such_key()) => {
                return Ok(None)
            }
            Err(e) => return Err(StoreError::S3(format!("download failed: {e}"))),
        };

        let bytes = output
            .body
            .collect()
            .await
            .map_err(|e| StoreError::S3(format!("download failed: {e}")))?
            .into_bytes();
        Ok(Some(bytes.to_vec()))
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.s3
            .delete_object()
            .bucket(&self.bucket)
            .key(artifact_key(id))
            .send()
            .await
            .map_err(|e| StoreError::S3(format!("delete failed: {e}")))?;
        Ok(())
    }
}

/// Deletes `id` from `store` after `ttl`. Failures are logged, never surfaced.
pub fn schedule_expiry(store: Arc<dyn ArtifactStore>, id: Uuid, ttl: Duration) {
    tokio::spawn(async move {
        tokio::time::sleep(ttl).await;
        match store.delete(id).await {
            Ok(()) => info!("Cleaned up rendered PDF {id}"),
            Err(e) => warn!("Error cleaning up rendered PDF {id}: {e}"),
        }
    });
}

/// In-process store used by tests.
#[cfg(test)]
#[derive(Default)]
pub struct MemoryArtifactStore {
    items: std::sync::Mutex<std::collections::HashMap<Uuid, Vec<u8>>>,
}

#[cfg(test)]
#[async_trait]
impl ArtifactStore for MemoryArtifactStore {
    async fn put(&self, id: Uuid, pdf: Vec<u8>) -> Result<(), StoreError> {
        self.items.lock().unwrap().insert(id, pdf);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> Result<Option<Vec<u8>>, StoreError> {
        Ok(self.items.lock().unwrap().get(&id).cloned())
    }

    async fn delete(&self, id: Uuid) -> Result<(), StoreError> {
        self.items.lock().unwrap().remove(&id);
        Ok(())
    }
}
