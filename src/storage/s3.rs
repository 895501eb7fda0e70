//! S3-compatible object store backend
//!
//! Talks to any S3-compatible HTTP gateway (MinIO, SeaweedFS, or a signing
//! proxy in front of AWS) with path-style URLs: `{endpoint}/{bucket}/{key}`.
//! A `HEAD` probe before the `PUT` detects pre-existing objects, which is
//! reported as `AlreadyExists` rather than silently overwritten.

use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use std::time::Duration;
use tracing::debug;

use super::{StorageBackend, StorageKind, StorageLocator};
use crate::types::StorageError;

/// Configuration for the S3 backend
#[derive(Debug, Clone)]
pub struct S3Config {
    /// Endpoint URL without trailing slash (e.g. "https://s3.example.com")
    pub endpoint: String,
    /// Bucket name
    pub bucket: String,
    /// Optional bearer token for the gateway
    pub access_token: Option<String>,
    /// Per-request timeout
    pub timeout: Duration,
}

pub struct S3Backend {
    config: S3Config,
    client: Client,
}

impl S3Backend {
    pub fn new(config: S3Config) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Unavailable(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { config, client })
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint.trim_end_matches('/'),
            self.config.bucket,
            key
        )
    }

    fn apply_auth(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.access_token {
            Some(token) => req.bearer_auth(token),
            None => req,
        }
    }
}

#[async_trait]
impl StorageBackend for S3Backend {
    fn kind(&self) -> StorageKind {
        StorageKind::S3
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<StorageLocator, StorageError> {
        // Detecting a pre-existing object is a failure for this backend,
        // not a silent overwrite.
        if self.exists(key).await? {
            return Err(StorageError::AlreadyExists);
        }

        let url = self.object_url(key);
        let response = self
            .apply_auth(self.client.put(&url).body(data.to_vec()))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StorageError::Timeout
                } else {
                    StorageError::Unavailable(format!("S3 put failed: {}", e))
                }
            })?;

        if !response.status().is_success() {
            return Err(StorageError::Unavailable(format!(
                "S3 put returned HTTP {}",
                response.status()
            )));
        }

        debug!(key = %key, size = data.len(), "S3 object stored");
        Ok(StorageLocator(url))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let url = self.object_url(key);
        let response = self
            .apply_auth(self.client.head(&url))
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    StorageError::Timeout
                } else {
                    StorageError::Unavailable(format!("S3 head failed: {}", e))
                }
            })?;

        match response.status() {
            StatusCode::NOT_FOUND => Ok(false),
            s if s.is_success() => Ok(true),
            s => Err(StorageError::Unavailable(format!(
                "S3 head returned HTTP {}",
                s
            ))),
        }
    }
}
