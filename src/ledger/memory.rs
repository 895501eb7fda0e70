//! In-process ledger for tests and dev mode
//!
//! Appends events under a lock with a monotonically increasing block number,
//! so receipts and tailed events agree exactly — which is what the
//! convergence tests rely on.

use async_trait::async_trait;
use rand::RngCore;
use tokio::sync::Mutex;

use super::{EventBatch, LedgerNotary, NotarizationReceipt, NotaryEvent};
use crate::hashing::Fingerprint;
use crate::types::LedgerError;

struct Chain {
    events: Vec<NotaryEvent>,
    head_block: u64,
}

pub struct MemoryNotary {
    chain: Mutex<Chain>,
    /// Ledger identity stamped on every event
    uploader: String,
    /// When set, every record and fetch call fails with this error
    fail_with: Option<LedgerError>,
}

impl MemoryNotary {
    pub fn new() -> Self {
        Self {
            chain: Mutex::new(Chain {
                events: Vec::new(),
                head_block: 0,
            }),
            uploader: "dev-notary".to_string(),
            fail_with: None,
        }
    }

    /// A notary that fails every record call, for error-path tests
    pub fn failing(error: LedgerError) -> Self {
        Self {
            chain: Mutex::new(Chain {
                events: Vec::new(),
                head_block: 0,
            }),
            uploader: "dev-notary".to_string(),
            fail_with: Some(error),
        }
    }

    /// Number of recorded events
    pub async fn event_count(&self) -> usize {
        self.chain.lock().await.events.len()
    }

    /// Append a raw event without going through `record`, for tailer tests
    /// that need malformed or externally produced events.
    #[cfg(test)]
    pub async fn push_raw_event(&self, mut event: NotaryEvent) {
        let mut chain = self.chain.lock().await;
        chain.head_block += 1;
        event.block_number = chain.head_block;
        chain.events.push(event);
    }

    fn random_txn_hash() -> String {
        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        format!("0x{}", hex::encode(bytes))
    }
}

impl Default for MemoryNotary {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl LedgerNotary for MemoryNotary {
    async fn record(
        &self,
        fingerprint: &Fingerprint,
        storage_label: &str,
    ) -> Result<NotarizationReceipt, LedgerError> {
        if let Some(ref e) = self.fail_with {
            return Err(e.clone());
        }

        let mut chain = self.chain.lock().await;
        chain.head_block += 1;

        let event = NotaryEvent {
            fingerprint: fingerprint.as_str().to_string(),
            uploader: self.uploader.clone(),
            storage_label: storage_label.to_string(),
            block_number: chain.head_block,
            block_time: chrono::Utc::now().timestamp(),
            txn_hash: Self::random_txn_hash(),
        };

        let receipt = NotarizationReceipt {
            txn_hash: event.txn_hash.clone(),
            block_number: event.block_number,
            block_time: event.block_time,
        };

        chain.events.push(event);
        Ok(receipt)
    }

    async fn events_after(&self, after_block: u64) -> Result<EventBatch, LedgerError> {
        if let Some(ref e) = self.fail_with {
            return Err(e.clone());
        }

        let chain = self.chain.lock().await;
        let events = chain
            .events
            .iter()
            .filter(|e| e.block_number > after_block)
            .cloned()
            .collect();

        Ok(EventBatch {
            events,
            head_block: chain.head_block,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fingerprint;

    #[tokio::test]
    async fn test_record_emits_event() {
        let notary = MemoryNotary::new();
        let fp = fingerprint(b"hello");

        let receipt = notary.record(&fp, "S3").await.unwrap();
        assert_eq!(receipt.block_number, 1);

        let batch = notary.events_after(0).await.unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].txn_hash, receipt.txn_hash);
        assert_eq!(batch.events[0].block_time, receipt.block_time);
        assert_eq!(batch.head_block, 1);
    }

    #[tokio::test]
    async fn test_events_after_is_exclusive() {
        let notary = MemoryNotary::new();
        let fp = fingerprint(b"hello");
        notary.record(&fp, "S3").await.unwrap();
        notary.record(&fp, "IPFS").await.unwrap();

        let batch = notary.events_after(1).await.unwrap();
        assert_eq!(batch.events.len(), 1);
        assert_eq!(batch.events[0].storage_label, "IPFS");
    }

    #[tokio::test]
    async fn test_failing_notary() {
        let notary = MemoryNotary::failing(LedgerError::Unreachable("injected".into()));
        let fp = fingerprint(b"hello");
        assert!(notary.record(&fp, "S3").await.is_err());
        assert_eq!(notary.event_count().await, 0);
    }
}
