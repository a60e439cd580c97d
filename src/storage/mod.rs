//! Object storage for uploading job artifacts
//!
//! Every job carries its own `storage_uri` (an `s3://bucket/key` target),
//! so unlike the reference crate's single bucket bound at construction
//! time, the bucket here is parsed per upload and an [`AmazonS3`] store
//! is built for it on demand (spec §4.G, §6 `AWS_REGION` / `S3_ENDPOINT`).

use std::sync::Arc;
use std::time::Duration;

use object_store::aws::AmazonS3Builder;
use object_store::path::Path as StoragePath;
use object_store::{ObjectStore, PutPayload};
use thiserror::Error;
use tracing::{info, warn};

const MAX_ATTEMPTS: u32 = 3;
const BASE_BACKOFF: Duration = Duration::from_millis(500);

#[derive(Debug, Error)]
pub enum StorageError {
    #[error("target uri '{0}' is not a valid s3:// uri")]
    InvalidUri(String),

    #[error("failed to configure object store: {0}")]
    ConfigError(String),

    #[error("upload to '{0}' failed after {1} attempts: {2}")]
    UploadFailure(String, u32, String),
}

/// Uploads artifacts for a single job's region/endpoint pair (spec §4.G).
/// Constructed per job rather than held process-wide, since the region
/// or custom endpoint (MinIO-compatible) can vary per job assignment.
pub struct StorageClient {
    aws_region: String,
    s3_endpoint: Option<String>,
    /// Test-only seam: bypasses `AmazonS3Builder::from_env` entirely.
    override_store: Option<Arc<dyn ObjectStore>>,
}

impl StorageClient {
    pub fn for_job(aws_region: impl Into<String>, s3_endpoint: Option<String>) -> Self {
        Self {
            aws_region: aws_region.into(),
            s3_endpoint,
            override_store: None,
        }
    }

    /// Substitute a fixed store (e.g. `object_store::memory::InMemory`)
    /// for tests, skipping real credential/endpoint resolution.
    pub fn with_store(store: Arc<dyn ObjectStore>) -> Self {
        Self {
            aws_region: String::new(),
            s3_endpoint: None,
            override_store: Some(store),
        }
    }

    fn build_store(&self, bucket: &str) -> Result<Arc<dyn ObjectStore>, StorageError> {
        if let Some(store) = &self.override_store {
            return Ok(Arc::clone(store));
        }

        let mut builder = AmazonS3Builder::from_env()
            .with_bucket_name(bucket)
            .with_region(&self.aws_region);

        if let Some(endpoint) = &self.s3_endpoint {
            // A custom endpoint (MinIO, or a test double) implies
            // path-style addressing rather than virtual-hosted buckets.
            builder = builder.with_endpoint(endpoint).with_allow_http(true).with_virtual_hosted_style_request(false);
        }

        let store = builder
            .build()
            .map_err(|e| StorageError::ConfigError(e.to_string()))?;
        Ok(Arc::new(store))
    }

    /// Upload `data` to `target_uri` (an `s3://bucket/key` path), retrying
    /// up to [`MAX_ATTEMPTS`] times with exponential backoff on failure
    /// (spec §8 scenario 6: 500, 500, 200 resolves on the third attempt).
    pub async fn upload(&self, target_uri: &str, data: Vec<u8>) -> Result<(), StorageError> {
        let (bucket, key) = parse_s3_uri(target_uri)?;
        let store = self.build_store(&bucket)?;
        let path = StoragePath::from(key.as_str());
        let payload = PutPayload::from(data);

        retry_upload(target_uri, || {
            let store = Arc::clone(&store);
            let path = path.clone();
            let payload = payload.clone();
            async move { store.put(&path, payload).await.map(|_| ()) }
        })
        .await
    }
}

/// Retry an upload attempt up to [`MAX_ATTEMPTS`] times with exponential
/// backoff (spec §8 scenario 6). Factored out of [`StorageClient::upload`]
/// so the retry/backoff behavior is testable against a fake fallible
/// operation, without standing up a real (or fake) `ObjectStore`.
async fn retry_upload<F, Fut, E>(target_uri: &str, mut attempt: F) -> Result<(), StorageError>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<(), E>>,
    E: std::fmt::Display,
{
    let mut attempts = 0;
    let mut backoff = BASE_BACKOFF;
    loop {
        attempts += 1;
        match attempt().await {
            Ok(()) => {
                info!(target = target_uri, attempts, "uploaded job artifact");
                return Ok(());
            }
            Err(err) if attempts < MAX_ATTEMPTS => {
                warn!(target = target_uri, attempts, error = %err, "upload failed, retrying");
                tokio::time::sleep(backoff).await;
                backoff *= 2;
            }
            Err(err) => {
                return Err(StorageError::UploadFailure(
                    target_uri.to_string(),
                    attempts,
                    err.to_string(),
                ));
            }
        }
    }
}

/// Split `s3://bucket/key/with/slashes` into `(bucket, key)`.
fn parse_s3_uri(uri: &str) -> Result<(String, String), StorageError> {
    let rest = uri
        .strip_prefix("s3://")
        .ok_or_else(|| StorageError::InvalidUri(uri.to_string()))?;
    let (bucket, key) = rest
        .split_once('/')
        .ok_or_else(|| StorageError::InvalidUri(uri.to_string()))?;
    if bucket.is_empty() || key.is_empty() {
        return Err(StorageError::InvalidUri(uri.to_string()));
    }
    Ok((bucket.to_string(), key.to_string()))
}
