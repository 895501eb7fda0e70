//! Upload orchestration
//!
//! One upload runs a fixed pipeline: fingerprint the bytes once, fan the
//! same bytes out to every requested storage backend concurrently, notarize
//! each successful write on the ledger, then fold the results into a single
//! index upsert. Backend failures are isolated; one slow or dead provider
//! never blocks the others, and the upload as a whole only fails when every
//! backend does.

use std::collections::BTreeMap;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};

use crate::hashing::{fingerprint, Fingerprint};
use crate::index::{EventIndex, EventPatch, FileEvent};
use crate::ledger::{NotarizationReceipt, NotaryPool, NotaryPoolStats};
use crate::storage::{object_key, StorageBackend, StorageKind, StorageLocator};
use crate::types::{HallmarkError, LedgerError, Result, StorageError};

/// Per-backend outcome of the storage fan-out
pub type PutOutcome = std::result::Result<StorageLocator, StorageError>;

/// Per-backend outcome of the notarization step
pub type RecordOutcome = std::result::Result<NotarizationReceipt, LedgerError>;

/// Everything that happened to one uploaded file, per backend.
///
/// `receipts` only has entries for backends whose storage write succeeded;
/// a backend that never stored the bytes is never notarized.
#[derive(Debug)]
pub struct UploadReport {
    pub filename: String,
    pub fingerprint: Fingerprint,
    pub outcomes: BTreeMap<StorageKind, PutOutcome>,
    pub receipts: BTreeMap<StorageKind, RecordOutcome>,
}

impl UploadReport {
    /// Backends whose bytes landed in storage
    pub fn stored_kinds(&self) -> Vec<StorageKind> {
        self.outcomes
            .iter()
            .filter(|(_, r)| r.is_ok())
            .map(|(k, _)| *k)
            .collect()
    }
}

/// Coordinates storage backends, the notary pool, and the event index for
/// the upload and verification paths.
pub struct UploadOrchestrator {
    backends: Vec<Arc<dyn StorageBackend>>,
    notary: Arc<NotaryPool>,
    index: Arc<EventIndex>,
    put_timeout: Duration,
}

impl UploadOrchestrator {
    pub fn new(
        backends: Vec<Arc<dyn StorageBackend>>,
        notary: Arc<NotaryPool>,
        index: Arc<EventIndex>,
        put_timeout: Duration,
    ) -> Self {
        Self {
            backends,
            notary,
            index,
            put_timeout,
        }
    }

    /// Which backend kinds are actually wired up
    pub fn configured_kinds(&self) -> Vec<StorageKind> {
        self.backends.iter().map(|b| b.kind()).collect()
    }

    /// Current notary pool load, for the health endpoint
    pub fn notary_stats(&self) -> NotaryPoolStats {
        self.notary.stats()
    }

    fn backend_for(&self, kind: StorageKind) -> Option<&Arc<dyn StorageBackend>> {
        self.backends.iter().find(|b| b.kind() == kind)
    }

    /// Run the full upload pipeline for one file.
    ///
    /// Fails with [`HallmarkError::NoBackendSelected`] when `requested` is
    /// empty and with [`HallmarkError::AllBackendsFailed`] when every
    /// requested backend failed to store the bytes. Any other mix of
    /// per-backend success and failure is reported in the returned
    /// [`UploadReport`], not as an error.
    pub async fn upload(
        &self,
        data: &[u8],
        filename: &str,
        requested: &[StorageKind],
        uploader: &str,
    ) -> Result<UploadReport> {
        if requested.is_empty() {
            return Err(HallmarkError::NoBackendSelected);
        }

        let fp = fingerprint(data);
        let key = object_key(filename);
        info!(
            filename = %filename,
            fingerprint = %fp,
            backends = ?requested,
            size = data.len(),
            "starting upload"
        );

        // Fan out to every requested backend at once. Each put carries its
        // own deadline so one hung provider cannot hold the batch open.
        let puts = requested.iter().map(|&kind| {
            let key = key.as_str();
            async move {
                let outcome = match self.backend_for(kind) {
                    Some(backend) => {
                        match tokio::time::timeout(self.put_timeout, backend.put(key, data)).await
                        {
                            Ok(result) => result,
                            Err(_) => Err(StorageError::Timeout),
                        }
                    }
                    None => Err(StorageError::Unavailable(format!(
                        "{} backend is not configured",
                        kind
                    ))),
                };
                (kind, outcome)
            }
        });
        let outcomes: BTreeMap<StorageKind, PutOutcome> =
            futures::future::join_all(puts).await.into_iter().collect();

        for (kind, outcome) in &outcomes {
            match outcome {
                Ok(locator) => debug!(backend = %kind, locator = %locator, "stored"),
                Err(e) => warn!(backend = %kind, error = %e, "storage write failed"),
            }
        }

        if outcomes.values().all(|r| r.is_err()) {
            return Err(HallmarkError::AllBackendsFailed(filename.to_string()));
        }

        // One ledger record per successful backend write. These run
        // sequentially in backend order so "latest receipt" is well defined.
        let mut receipts: BTreeMap<StorageKind, RecordOutcome> = BTreeMap::new();
        for (&kind, outcome) in &outcomes {
            if outcome.is_err() {
                continue;
            }
            let result = self.notary.record(fp.clone(), kind.label()).await;
            match &result {
                Ok(receipt) => info!(
                    backend = %kind,
                    txn = %receipt.txn_hash,
                    block = receipt.block_number,
                    "notarized"
                ),
                Err(e) => warn!(backend = %kind, error = %e, "notarization failed"),
            }
            receipts.insert(kind, result);
        }

        // Fold ledger-confirmed backends into a single index upsert. A
        // backend without a confirmed receipt stays out of the record; the
        // tailer will pick it up later if the write eventually landed.
        let mut notarized: Vec<String> = Vec::new();
        let mut last_receipt: Option<&NotarizationReceipt> = None;
        for (kind, result) in &receipts {
            if let Ok(receipt) = result {
                notarized.push(kind.label().to_string());
                last_receipt = Some(receipt);
            }
        }
        if let Some(receipt) = last_receipt {
            self.index
                .upsert(
                    &fp,
                    EventPatch {
                        filename: Some(filename.to_string()),
                        uploader: Some(uploader.to_string()),
                        storage: notarized,
                        timestamp: receipt.block_time,
                        txn_hash: receipt.txn_hash.clone(),
                    },
                )
                .await?;
        }

        Ok(UploadReport {
            filename: filename.to_string(),
            fingerprint: fp,
            outcomes,
            receipts,
        })
    }

    /// Verify a file by content: recompute its fingerprint and look it up.
    ///
    /// Returns [`HallmarkError::NotFound`] when no record exists, so an
    /// altered file (different bytes, different fingerprint) reads as
    /// unverified even if the original was notarized.
    pub async fn verify(&self, data: &[u8]) -> Result<FileEvent> {
        let fp = fingerprint(data);
        debug!(fingerprint = %fp, "verifying");
        self.index
            .find_one(&fp)
            .await?
            .ok_or_else(|| HallmarkError::NotFound(format!("no record for fingerprint {}", fp)))
    }

    /// Whether any record carries this original filename, and which
    /// fingerprints those records hold.
    pub async fn check_filename(&self, filename: &str) -> Result<(bool, Vec<String>)> {
        let events = self.index.find_by_filename(filename).await?;
        let hashes: Vec<String> = events.into_iter().map(|e| e.file_hash).collect();
        Ok((!hashes.is_empty(), hashes))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ledger::{MemoryNotary, NotaryPoolConfig};
    use crate::storage::MemoryBackend;

    fn orchestrator_with(
        backends: Vec<Arc<dyn StorageBackend>>,
        notary: Arc<MemoryNotary>,
    ) -> UploadOrchestrator {
        let pool = Arc::new(NotaryPool::new(notary, NotaryPoolConfig::default()));
        UploadOrchestrator::new(
            backends,
            pool,
            Arc::new(EventIndex::memory()),
            Duration::from_secs(5),
        )
    }

    #[tokio::test]
    async fn test_no_backend_selected() {
        let orch = orchestrator_with(
            vec![Arc::new(MemoryBackend::new(StorageKind::S3))],
            Arc::new(MemoryNotary::new()),
        );
        let err = orch.upload(b"hello", "a.txt", &[], "alice").await.unwrap_err();
        assert!(matches!(err, HallmarkError::NoBackendSelected));
    }

    #[tokio::test]
    async fn test_upload_then_verify() {
        let orch = orchestrator_with(
            vec![Arc::new(MemoryBackend::new(StorageKind::S3))],
            Arc::new(MemoryNotary::new()),
        );

        let report = orch
            .upload(b"hello", "a.txt", &[StorageKind::S3], "alice")
            .await
            .unwrap();
        assert_eq!(
            report.fingerprint.as_str(),
            "2cf24dba5fb0a30e26e83b2ac5b9e29e1b161e5c1fa7425e73043362938b9824"
        );
        assert!(report.outcomes[&StorageKind::S3].is_ok());
        assert!(report.receipts[&StorageKind::S3].is_ok());

        let event = orch.verify(b"hello").await.unwrap();
        assert_eq!(event.filename, "a.txt");
        assert_eq!(event.uploader, "alice");
        assert_eq!(event.storage, vec!["S3".to_string()]);
    }

    #[tokio::test]
    async fn test_verify_unknown_content() {
        let orch = orchestrator_with(
            vec![Arc::new(MemoryBackend::new(StorageKind::S3))],
            Arc::new(MemoryNotary::new()),
        );
        let err = orch.verify(b"never uploaded").await.unwrap_err();
        assert!(matches!(err, HallmarkError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_partial_failure_is_isolated() {
        let orch = orchestrator_with(
            vec![
                Arc::new(MemoryBackend::new(StorageKind::S3)),
                Arc::new(MemoryBackend::failing(
                    StorageKind::Ipfs,
                    StorageError::Unavailable("node down".into()),
                )),
            ],
            Arc::new(MemoryNotary::new()),
        );

        let report = orch
            .upload(b"hello", "a.txt", &[StorageKind::S3, StorageKind::Ipfs], "alice")
            .await
            .unwrap();
        assert!(report.outcomes[&StorageKind::S3].is_ok());
        assert!(report.outcomes[&StorageKind::Ipfs].is_err());
        // Only the surviving backend was notarized and indexed.
        assert_eq!(report.receipts.len(), 1);
        let event = orch.verify(b"hello").await.unwrap();
        assert_eq!(event.storage, vec!["S3".to_string()]);
    }

    #[tokio::test]
    async fn test_all_backends_failed() {
        let notary = Arc::new(MemoryNotary::new());
        let orch = orchestrator_with(
            vec![Arc::new(MemoryBackend::failing(
                StorageKind::S3,
                StorageError::Unavailable("down".into()),
            ))],
            Arc::clone(&notary),
        );

        let err = orch
            .upload(b"hello", "a.txt", &[StorageKind::S3], "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, HallmarkError::AllBackendsFailed(_)));
        // Nothing was notarized or indexed.
        assert_eq!(notary.event_count().await, 0);
        assert!(matches!(orch.verify(b"hello").await, Err(HallmarkError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_unconfigured_backend_reported_not_fatal() {
        // IPFS requested but never wired up; S3 still goes through.
        let orch = orchestrator_with(
            vec![Arc::new(MemoryBackend::new(StorageKind::S3))],
            Arc::new(MemoryNotary::new()),
        );

        let report = orch
            .upload(b"hello", "a.txt", &[StorageKind::S3, StorageKind::Ipfs], "alice")
            .await
            .unwrap();
        assert!(report.outcomes[&StorageKind::S3].is_ok());
        assert!(matches!(
            report.outcomes[&StorageKind::Ipfs],
            Err(StorageError::Unavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_duplicate_upload_fails_already_exists() {
        let orch = orchestrator_with(
            vec![Arc::new(MemoryBackend::new(StorageKind::S3))],
            Arc::new(MemoryNotary::new()),
        );

        orch.upload(b"hello", "a.txt", &[StorageKind::S3], "alice")
            .await
            .unwrap();
        let err = orch
            .upload(b"hello", "a.txt", &[StorageKind::S3], "alice")
            .await
            .unwrap_err();
        assert!(matches!(err, HallmarkError::AllBackendsFailed(_)));
    }

    #[tokio::test]
    async fn test_ledger_failure_leaves_index_unwritten() {
        let orch = orchestrator_with(
            vec![Arc::new(MemoryBackend::new(StorageKind::S3))],
            Arc::new(MemoryNotary::failing(LedgerError::Unreachable(
                "rpc down".into(),
            ))),
        );

        let report = orch
            .upload(b"hello", "a.txt", &[StorageKind::S3], "alice")
            .await
            .unwrap();
        assert!(report.outcomes[&StorageKind::S3].is_ok());
        assert!(report.receipts[&StorageKind::S3].is_err());
        assert!(matches!(orch.verify(b"hello").await, Err(HallmarkError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_check_filename() {
        let orch = orchestrator_with(
            vec![Arc::new(MemoryBackend::new(StorageKind::S3))],
            Arc::new(MemoryNotary::new()),
        );

        orch.upload(b"v1", "report.pdf", &[StorageKind::S3], "alice")
            .await
            .unwrap();
        orch.upload(b"v2", "report.pdf", &[StorageKind::S3], "alice")
            .await
            .unwrap();

        let (exists, hashes) = orch.check_filename("report.pdf").await.unwrap();
        assert!(exists);
        assert_eq!(hashes.len(), 2);

        let (exists, hashes) = orch.check_filename("other.pdf").await.unwrap();
        assert!(!exists);
        assert!(hashes.is_empty());
    }
}
