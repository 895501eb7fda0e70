//! JSON-RPC ledger client
//!
//! Speaks the notary contract's JSON-RPC surface: submit a record, poll for
//! the confirmation receipt, read the confirming block's timestamp, and page
//! through emitted events. Contract ABI details live behind the RPC node;
//! this client only handles the transport and confirmation sequencing.

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use std::time::{Duration, Instant};
use tracing::{debug, warn};

use super::{EventBatch, LedgerNotary, NotarizationReceipt, NotaryEvent};
use crate::hashing::Fingerprint;
use crate::types::LedgerError;

/// Configuration for the RPC notary client
#[derive(Debug, Clone)]
pub struct RpcNotaryConfig {
    /// JSON-RPC endpoint URL
    pub rpc_url: String,
    /// Upper bound on the submit-to-confirmation wait
    pub confirm_timeout: Duration,
    /// Delay between receipt polls
    pub poll_interval: Duration,
    /// Per-request HTTP timeout
    pub request_timeout: Duration,
}

impl Default for RpcNotaryConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://localhost:8545".to_string(),
            confirm_timeout: Duration::from_secs(60),
            poll_interval: Duration::from_millis(500),
            request_timeout: Duration::from_secs(10),
        }
    }
}

pub struct RpcNotary {
    config: RpcNotaryConfig,
    client: Client,
}

impl RpcNotary {
    pub fn new(config: RpcNotaryConfig) -> Result<Self, LedgerError> {
        let client = Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|e| LedgerError::Unreachable(format!("HTTP client init failed: {}", e)))?;
        Ok(Self { config, client })
    }

    /// Issue one JSON-RPC call and return the `result` field.
    ///
    /// Transport failures map to `Unreachable` (retryable); an `error` reply
    /// from the node maps to `Rejected` (the node understood us and said no).
    async fn call(&self, method: &str, params: Value) -> Result<Value, LedgerError> {
        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response: Value = self
            .client
            .post(&self.config.rpc_url)
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    LedgerError::Timeout
                } else {
                    LedgerError::Unreachable(format!("RPC transport error: {}", e))
                }
            })?
            .json()
            .await
            .map_err(|e| LedgerError::Unreachable(format!("RPC reply unreadable: {}", e)))?;

        if let Some(err) = response.get("error") {
            let message = err
                .get("message")
                .and_then(|m| m.as_str())
                .unwrap_or("unspecified RPC error");
            return Err(LedgerError::Rejected(format!("{}: {}", method, message)));
        }

        response
            .get("result")
            .cloned()
            .ok_or_else(|| LedgerError::Unreachable(format!("{}: reply missing result", method)))
    }

    /// Poll for the transaction receipt until confirmed or the deadline
    async fn wait_for_receipt(&self, txn_hash: &str) -> Result<u64, LedgerError> {
        let deadline = Instant::now() + self.config.confirm_timeout;

        loop {
            let result = self
                .call("notary_getReceipt", json!([txn_hash]))
                .await?;

            if !result.is_null() {
                let block_number = result
                    .get("blockNumber")
                    .and_then(|b| b.as_u64())
                    .ok_or_else(|| {
                        LedgerError::Unreachable("receipt missing blockNumber".into())
                    })?;
                return Ok(block_number);
            }

            if Instant::now() >= deadline {
                warn!(txn = %txn_hash, "ledger confirmation deadline elapsed");
                return Err(LedgerError::Timeout);
            }

            tokio::time::sleep(self.config.poll_interval).await;
        }
    }

    /// Read the timestamp of a confirmed block
    async fn block_time(&self, block_number: u64) -> Result<i64, LedgerError> {
        let result = self
            .call("notary_getBlock", json!([block_number]))
            .await?;

        result
            .get("timestamp")
            .and_then(|t| t.as_i64())
            .ok_or_else(|| LedgerError::Unreachable("block missing timestamp".into()))
    }
}

#[async_trait]
impl LedgerNotary for RpcNotary {
    async fn record(
        &self,
        fingerprint: &Fingerprint,
        storage_label: &str,
    ) -> Result<NotarizationReceipt, LedgerError> {
        let result = self
            .call(
                "notary_submitRecord",
                json!([{ "fileHash": fingerprint.as_str(), "storageType": storage_label }]),
            )
            .await?;

        let txn_hash = result
            .as_str()
            .ok_or_else(|| LedgerError::Unreachable("submit reply missing txn hash".into()))?
            .to_string();

        debug!(txn = %txn_hash, fingerprint = %fingerprint, "notarization submitted, awaiting confirmation");

        let block_number = self.wait_for_receipt(&txn_hash).await?;
        // Authoritative timestamp comes from the confirmed block, not from
        // the moment we submitted.
        let block_time = self.block_time(block_number).await?;

        debug!(txn = %txn_hash, block = block_number, "notarization confirmed");

        Ok(NotarizationReceipt {
            txn_hash,
            block_number,
            block_time,
        })
    }

    async fn events_after(&self, after_block: u64) -> Result<EventBatch, LedgerError> {
        let result = self
            .call("notary_getEvents", json!([{ "fromBlock": after_block + 1 }]))
            .await?;

        let head_block = result
            .get("headBlock")
            .and_then(|b| b.as_u64())
            .unwrap_or(after_block);

        let mut events = Vec::new();
        for raw in result
            .get("events")
            .and_then(|e| e.as_array())
            .into_iter()
            .flatten()
        {
            match parse_event(raw) {
                Some(event) => events.push(event),
                None => warn!(event = %raw, "skipping undecodable ledger event"),
            }
        }

        Ok(EventBatch { events, head_block })
    }
}

fn parse_event(raw: &Value) -> Option<NotaryEvent> {
    Some(NotaryEvent {
        fingerprint: raw.get("fileHash")?.as_str()?.to_string(),
        uploader: raw
            .get("uploader")
            .and_then(|u| u.as_str())
            .unwrap_or("unknown")
            .to_string(),
        storage_label: raw.get("storageType")?.as_str()?.to_string(),
        block_number: raw.get("blockNumber")?.as_u64()?,
        block_time: raw.get("timestamp")?.as_i64()?,
        txn_hash: raw.get("txnHash")?.as_str()?.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_event() {
        let raw = json!({
            "fileHash": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
            "uploader": "0xabc",
            "storageType": "S3",
            "blockNumber": 42,
            "timestamp": 1700000000,
            "txnHash": "0xdeadbeef",
        });

        let event = parse_event(&raw).unwrap();
        assert_eq!(event.storage_label, "S3");
        assert_eq!(event.block_number, 42);
    }

    #[test]
    fn test_parse_event_missing_fields() {
        assert!(parse_event(&json!({ "uploader": "0xabc" })).is_none());
    }

    #[test]
    fn test_parse_event_defaults_uploader() {
        let raw = json!({
            "fileHash": "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824",
            "storageType": "IPFS",
            "blockNumber": 7,
            "timestamp": 1700000001,
            "txnHash": "0x01",
        });
        assert_eq!(parse_event(&raw).unwrap().uploader, "unknown");
    }
}
