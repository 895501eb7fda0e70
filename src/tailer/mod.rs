//! Ledger tailer
//!
//! Reconciles the event index against the ledger: polls for notarization
//! events past a persisted block watermark and upserts each into the index.
//! Uploads written by other gateway instances, or indexed entries lost to a
//! database wipe, converge back into the index this way.
//!
//! The tailer only ever knows what the ledger carries. Events hold no
//! filename, so a tailer-created record reads "unknown" until (unless) the
//! upload path fills it in; the insert-only patch semantics make the two
//! writers commute.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;

use bson::doc;
use mongodb::Collection;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::db::MongoClient;
use crate::hashing::Fingerprint;
use crate::index::{EventIndex, EventPatch};
use crate::ledger::LedgerNotary;
use crate::types::{HallmarkError, Result};

const WATERMARK_COLLECTION: &str = "tailer_state";
const WATERMARK_ID: &str = "ledger_tailer";

#[derive(Debug, Serialize, Deserialize)]
struct WatermarkDoc {
    #[serde(rename = "_id")]
    id: String,
    last_block: i64,
}

enum WatermarkBacking {
    Mongo(Collection<WatermarkDoc>),
    Memory(AtomicU64),
}

/// Persisted high-water mark of the last fully applied block.
///
/// Advanced only after every event in a batch has been applied, so a crash
/// mid-batch re-reads the whole batch. Replays are harmless: index upserts
/// are idempotent.
pub struct WatermarkStore {
    backing: WatermarkBacking,
}

impl WatermarkStore {
    pub fn mongo(client: &MongoClient) -> Self {
        Self {
            backing: WatermarkBacking::Mongo(
                client.collection::<WatermarkDoc>(WATERMARK_COLLECTION),
            ),
        }
    }

    pub fn memory() -> Self {
        Self {
            backing: WatermarkBacking::Memory(AtomicU64::new(0)),
        }
    }

    /// Last fully applied block, 0 when the tailer has never run
    pub async fn load(&self) -> Result<u64> {
        match &self.backing {
            WatermarkBacking::Mongo(collection) => {
                let doc = collection
                    .find_one(doc! { "_id": WATERMARK_ID })
                    .await
                    .map_err(|e| {
                        HallmarkError::Database(format!("Watermark read failed: {}", e))
                    })?;
                Ok(doc.map(|d| d.last_block.max(0) as u64).unwrap_or(0))
            }
            WatermarkBacking::Memory(block) => Ok(block.load(Ordering::SeqCst)),
        }
    }

    pub async fn store(&self, block: u64) -> Result<()> {
        match &self.backing {
            WatermarkBacking::Mongo(collection) => {
                collection
                    .update_one(
                        doc! { "_id": WATERMARK_ID },
                        doc! { "$set": { "last_block": block as i64 } },
                    )
                    .upsert(true)
                    .await
                    .map_err(|e| {
                        HallmarkError::Database(format!("Watermark write failed: {}", e))
                    })?;
                Ok(())
            }
            WatermarkBacking::Memory(stored) => {
                stored.store(block, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

/// Polls the ledger and folds new events into the index
pub struct LedgerTailer {
    notary: Arc<dyn LedgerNotary>,
    index: Arc<EventIndex>,
    watermark: WatermarkStore,
}

impl LedgerTailer {
    pub fn new(
        notary: Arc<dyn LedgerNotary>,
        index: Arc<EventIndex>,
        watermark: WatermarkStore,
    ) -> Self {
        Self {
            notary,
            index,
            watermark,
        }
    }

    /// One poll cycle: fetch events past the watermark, apply them, advance.
    ///
    /// Returns how many events were applied. A fetch or index error leaves
    /// the watermark where it was; the next cycle retries the same range. A
    /// single event with a malformed fingerprint is logged and skipped, not
    /// allowed to wedge the tailer on it forever.
    pub async fn poll_once(&self) -> Result<usize> {
        let after = self.watermark.load().await?;
        let batch = self
            .notary
            .events_after(after)
            .await
            .map_err(|e| HallmarkError::Ledger(e.to_string()))?;

        if batch.events.is_empty() {
            debug!(watermark = after, "tailer poll found no new events");
            if batch.head_block > after {
                self.watermark.store(batch.head_block).await?;
            }
            return Ok(0);
        }

        let mut applied = 0;
        for event in &batch.events {
            let fp = match Fingerprint::parse(&event.fingerprint) {
                Ok(fp) => fp,
                Err(reason) => {
                    warn!(
                        block = event.block_number,
                        txn = %event.txn_hash,
                        reason = %reason,
                        "skipping ledger event with malformed fingerprint"
                    );
                    continue;
                }
            };

            self.index
                .upsert(
                    &fp,
                    EventPatch {
                        // Ledger events carry no filename; never clobber one
                        // the upload path already recorded.
                        filename: None,
                        uploader: Some(event.uploader.clone()),
                        storage: vec![event.storage_label.clone()],
                        timestamp: event.block_time,
                        txn_hash: event.txn_hash.clone(),
                    },
                )
                .await?;
            applied += 1;
        }

        self.watermark.store(batch.head_block).await?;
        info!(
            applied,
            skipped = batch.events.len() - applied,
            head_block = batch.head_block,
            "tailer applied ledger events"
        );
        Ok(applied)
    }
}

/// Spawn the tailer poll loop
pub fn spawn_tailer_task(tailer: Arc<LedgerTailer>, interval: Duration) -> JoinHandle<()> {
    let handle = tokio::spawn(async move {
        loop {
            tokio::time::sleep(interval).await;
            if let Err(e) = tailer.poll_once().await {
                warn!(error = %e, "tailer poll failed, will retry");
            }
        }
    });

    info!(
        interval_secs = interval.as_secs(),
        "Ledger tailer task started"
    );
    handle
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fingerprint;
    use crate::ledger::{MemoryNotary, NotaryEvent};

    fn tailer_over(notary: Arc<MemoryNotary>, index: Arc<EventIndex>) -> LedgerTailer {
        LedgerTailer::new(notary, index, WatermarkStore::memory())
    }

    #[tokio::test]
    async fn test_applies_new_events_and_advances() {
        let notary = Arc::new(MemoryNotary::new());
        let index = Arc::new(EventIndex::memory());
        let tailer = tailer_over(notary.clone(), index.clone());

        let fp = fingerprint(b"hello");
        notary.record(&fp, "S3").await.unwrap();
        notary.record(&fp, "IPFS").await.unwrap();

        assert_eq!(tailer.poll_once().await.unwrap(), 2);

        let event = index.find_one(&fp).await.unwrap().unwrap();
        assert_eq!(event.filename, "unknown");
        assert_eq!(event.uploader, "dev-notary");
        assert_eq!(event.storage.len(), 2);

        // Nothing new on the second cycle.
        assert_eq!(tailer.poll_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_does_not_clobber_uploaded_filename() {
        let notary = Arc::new(MemoryNotary::new());
        let index = Arc::new(EventIndex::memory());
        let tailer = tailer_over(notary.clone(), index.clone());

        let fp = fingerprint(b"hello");
        let receipt = notary.record(&fp, "S3").await.unwrap();
        // Upload path already indexed this file with its real name.
        index
            .upsert(
                &fp,
                EventPatch {
                    filename: Some("a.txt".into()),
                    uploader: Some("alice".into()),
                    storage: vec!["S3".into()],
                    timestamp: receipt.block_time,
                    txn_hash: receipt.txn_hash,
                },
            )
            .await
            .unwrap();

        tailer.poll_once().await.unwrap();

        let event = index.find_one(&fp).await.unwrap().unwrap();
        assert_eq!(event.filename, "a.txt");
        assert_eq!(event.storage, vec!["S3".to_string()]);
    }

    #[tokio::test]
    async fn test_skips_malformed_fingerprint() {
        let notary = Arc::new(MemoryNotary::new());
        let index = Arc::new(EventIndex::memory());
        let tailer = tailer_over(notary.clone(), index.clone());

        notary
            .push_raw_event(NotaryEvent {
                fingerprint: "not-a-hash".into(),
                uploader: "dev-notary".into(),
                storage_label: "S3".into(),
                block_number: 0,
                block_time: 1700000000,
                txn_hash: "0xdead".into(),
            })
            .await;
        let fp = fingerprint(b"hello");
        notary.record(&fp, "S3").await.unwrap();

        // The bad event is skipped, the good one lands, and the watermark
        // still advances past both.
        assert_eq!(tailer.poll_once().await.unwrap(), 1);
        assert!(index.find_one(&fp).await.unwrap().is_some());
        assert_eq!(tailer.poll_once().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_fetch_error_leaves_watermark() {
        let notary = Arc::new(MemoryNotary::failing(
            crate::types::LedgerError::Unreachable("rpc down".into()),
        ));
        let index = Arc::new(EventIndex::memory());
        let tailer = tailer_over(notary, index);

        assert!(tailer.poll_once().await.is_err());
        assert_eq!(tailer.watermark.load().await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_rebuilds_index_from_ledger_alone() {
        use crate::ledger::{NotaryPool, NotaryPoolConfig};
        use crate::orchestrator::UploadOrchestrator;
        use crate::storage::{MemoryBackend, StorageKind};
        use std::time::Duration;

        // Upload through the full pipeline into one index.
        let notary = Arc::new(MemoryNotary::new());
        let upload_index = Arc::new(EventIndex::memory());
        let pool = Arc::new(NotaryPool::new(
            notary.clone() as Arc<dyn LedgerNotary>,
            NotaryPoolConfig::default(),
        ));
        let orch = UploadOrchestrator::new(
            vec![Arc::new(MemoryBackend::new(StorageKind::S3))],
            pool,
            upload_index.clone(),
            Duration::from_secs(5),
        );
        orch.upload(b"hello", "a.txt", &[StorageKind::S3], "alice")
            .await
            .unwrap();

        // A fresh index fed only by the tailer converges to the same
        // fingerprint, storage set, and receipt; only the filename differs
        // because ledger events do not carry one.
        let rebuilt = Arc::new(EventIndex::memory());
        let tailer = tailer_over(notary, rebuilt.clone());
        assert_eq!(tailer.poll_once().await.unwrap(), 1);

        let fp = fingerprint(b"hello");
        let original = upload_index.find_one(&fp).await.unwrap().unwrap();
        let replayed = rebuilt.find_one(&fp).await.unwrap().unwrap();
        assert_eq!(replayed.file_hash, original.file_hash);
        assert_eq!(replayed.storage, original.storage);
        assert_eq!(replayed.txn_hash, original.txn_hash);
        assert_eq!(replayed.timestamp, original.timestamp);
        assert_eq!(replayed.filename, "unknown");
    }

    #[tokio::test]
    async fn test_watermark_store_round_trip() {
        let store = WatermarkStore::memory();
        assert_eq!(store.load().await.unwrap(), 0);
        store.store(42).await.unwrap();
        assert_eq!(store.load().await.unwrap(), 42);
    }
}
