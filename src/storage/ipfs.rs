//! IPFS backend via a node's HTTP API
//!
//! Uses a JSON add endpoint carrying the payload inline as base64 and reads
//! the CID out of the response. The locator points at a public gateway so it
//! is retrievable without API access. Since IPFS is content-addressed, the
//! duplicate check is keyed on the upload key via the node's pin metadata
//! rather than on the CID.

use async_trait::async_trait;
use base64::Engine;
use reqwest::Client;
use serde_json::Value;
use std::time::Duration;
use tracing::debug;

use super::{StorageBackend, StorageKind, StorageLocator};
use crate::types::StorageError;

/// Configuration for the IPFS backend
#[derive(Debug, Clone)]
pub struct IpfsConfig {
    /// Node HTTP API URL (e.g. "http://localhost:5001")
    pub api_url: String,
    /// Gateway prefix for building locators (e.g. "https://ipfs.io/ipfs")
    pub gateway_url: String,
    /// Per-request timeout
    pub timeout: Duration,
}

pub struct IpfsBackend {
    config: IpfsConfig,
    client: Client,
}

impl IpfsBackend {
    pub fn new(config: IpfsConfig) -> Result<Self, StorageError> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| StorageError::Unavailable(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { config, client })
    }

    fn api(&self, path: &str) -> String {
        format!("{}{}", self.config.api_url.trim_end_matches('/'), path)
    }

    fn map_transport(e: reqwest::Error) -> StorageError {
        if e.is_timeout() {
            StorageError::Timeout
        } else {
            StorageError::Unavailable(format!("IPFS request failed: {}", e))
        }
    }
}

#[async_trait]
impl StorageBackend for IpfsBackend {
    fn kind(&self) -> StorageKind {
        StorageKind::Ipfs
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<StorageLocator, StorageError> {
        if self.exists(key).await? {
            return Err(StorageError::AlreadyExists);
        }

        let payload = serde_json::json!({
            "data": base64::engine::general_purpose::STANDARD.encode(data),
            "name": key,
            "pin": true,
        });

        let response: Value = self
            .client
            .post(self.api("/api/v0/add"))
            .json(&payload)
            .send()
            .await
            .map_err(Self::map_transport)?
            .json()
            .await
            .map_err(|e| StorageError::Unavailable(format!("IPFS add reply unreadable: {}", e)))?;

        let cid = response["Hash"]
            .as_str()
            .or_else(|| response["Cid"]["/"].as_str())
            .ok_or_else(|| StorageError::Unavailable("missing CID in IPFS add reply".into()))?
            .to_string();

        debug!(key = %key, cid = %cid, size = data.len(), "IPFS object added");
        Ok(StorageLocator(format!(
            "{}/{}",
            self.config.gateway_url.trim_end_matches('/'),
            cid
        )))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        let response = self
            .client
            .post(self.api("/api/v0/files/stat"))
            .json(&serde_json::json!({ "arg": format!("/{}", key) }))
            .send()
            .await
            .map_err(Self::map_transport)?;

        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(false);
        }

        let body: Value = response.json().await.map_err(|e| {
            StorageError::Unavailable(format!("IPFS stat reply unreadable: {}", e))
        })?;

        // The node answers 200 with an error message for unknown paths
        if body.get("Message").and_then(|m| m.as_str()).is_some() {
            return Ok(false);
        }

        Ok(body.get("Hash").is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_api_url_join() {
        let backend = IpfsBackend::new(IpfsConfig {
            api_url: "http://localhost:5001/".to_string(),
            gateway_url: "https://ipfs.io/ipfs".to_string(),
            timeout: Duration::from_secs(5),
        })
        .unwrap();

        assert_eq!(backend.api("/api/v0/add"), "http://localhost:5001/api/v0/add");
    }
}
