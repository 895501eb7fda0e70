//! Dedicated worker pool for ledger writes
//!
//! Ledger confirmation takes seconds; running it on the request path would
//! stall unrelated uploads. A small fixed pool of workers drains a bounded
//! queue of notarization requests instead, so request handlers only ever
//! await a channel.

use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, oneshot, Semaphore};
use tracing::{debug, info};

use super::{LedgerNotary, NotarizationReceipt};
use crate::hashing::Fingerprint;
use crate::types::LedgerError;

/// Request sent to the notary pool
struct PoolRequest {
    fingerprint: Fingerprint,
    storage_label: String,
    response_tx: oneshot::Sender<Result<NotarizationReceipt, LedgerError>>,
}

/// Configuration for the notary pool
pub struct NotaryPoolConfig {
    /// Number of worker tasks
    pub worker_count: usize,
    /// Maximum queued notarization requests
    pub max_queue_size: usize,
    /// End-to-end timeout for one notarization (queue wait + confirmation)
    pub request_timeout: Duration,
}

impl Default for NotaryPoolConfig {
    fn default() -> Self {
        Self {
            worker_count: 2,
            max_queue_size: 256,
            request_timeout: Duration::from_secs(90),
        }
    }
}

/// In-process pool of ledger-write workers
pub struct NotaryPool {
    request_tx: mpsc::Sender<PoolRequest>,
    semaphore: Arc<Semaphore>,
    timeout: Duration,
    worker_count: usize,
}

impl NotaryPool {
    /// Create and start a new pool over the given notary capability
    pub fn new(notary: Arc<dyn LedgerNotary>, config: NotaryPoolConfig) -> Self {
        let (request_tx, request_rx) = mpsc::channel::<PoolRequest>(config.max_queue_size);
        let request_rx = Arc::new(tokio::sync::Mutex::new(request_rx));
        let semaphore = Arc::new(Semaphore::new(config.max_queue_size));

        for i in 0..config.worker_count {
            let notary = Arc::clone(&notary);
            let request_rx = Arc::clone(&request_rx);
            tokio::spawn(async move {
                worker_task(i, notary, request_rx).await;
            });
        }

        info!("Notary pool started with {} workers", config.worker_count);

        Self {
            request_tx,
            semaphore,
            timeout: config.request_timeout,
            worker_count: config.worker_count,
        }
    }

    /// Submit a notarization and wait for its confirmed receipt
    pub async fn record(
        &self,
        fingerprint: Fingerprint,
        storage_label: &str,
    ) -> Result<NotarizationReceipt, LedgerError> {
        let _permit = self
            .semaphore
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| LedgerError::Unreachable("notary pool closed".into()))?;

        let (response_tx, response_rx) = oneshot::channel();
        let request = PoolRequest {
            fingerprint,
            storage_label: storage_label.to_string(),
            response_tx,
        };

        self.request_tx
            .send(request)
            .await
            .map_err(|_| LedgerError::Unreachable("notary pool closed".into()))?;

        match tokio::time::timeout(self.timeout, response_rx).await {
            Ok(Ok(result)) => result,
            Ok(Err(_)) => Err(LedgerError::Unreachable("response channel closed".into())),
            Err(_) => Err(LedgerError::Timeout),
        }
    }

    /// Point-in-time pool load, reported by the health endpoint
    pub fn stats(&self) -> NotaryPoolStats {
        NotaryPoolStats {
            workers: self.worker_count,
            queue_free: self.semaphore.available_permits(),
        }
    }
}

/// Snapshot of notary pool load
#[derive(Debug, Clone, Serialize)]
pub struct NotaryPoolStats {
    pub workers: usize,
    /// Approximate free queue capacity
    pub queue_free: usize,
}

/// Worker task draining the pool queue
async fn worker_task(
    worker_id: usize,
    notary: Arc<dyn LedgerNotary>,
    request_rx: Arc<tokio::sync::Mutex<mpsc::Receiver<PoolRequest>>>,
) {
    loop {
        let request = {
            let mut rx = request_rx.lock().await;
            match rx.recv().await {
                Some(r) => r,
                None => {
                    info!("Notary worker {} shutting down (channel closed)", worker_id);
                    return;
                }
            }
        };

        debug!(
            worker = worker_id,
            fingerprint = %request.fingerprint,
            storage = %request.storage_label,
            "notary worker processing record"
        );

        let result = notary
            .record(&request.fingerprint, &request.storage_label)
            .await;

        // Receiver may have timed out and gone away; nothing to do then.
        let _ = request.response_tx.send(result);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fingerprint;
    use crate::ledger::MemoryNotary;
    use tokio_test::assert_ok;

    #[test]
    fn test_default_config() {
        let config = NotaryPoolConfig::default();
        assert_eq!(config.worker_count, 2);
        assert_eq!(config.max_queue_size, 256);
    }

    #[tokio::test]
    async fn test_record_through_pool() {
        let notary = Arc::new(MemoryNotary::new());
        let pool = NotaryPool::new(notary.clone(), NotaryPoolConfig::default());

        let fp = fingerprint(b"hello");
        let receipt = pool.record(fp, "S3").await.unwrap();
        assert_eq!(receipt.block_number, 1);
        assert_eq!(notary.event_count().await, 1);
    }

    #[tokio::test]
    async fn test_pool_surfaces_ledger_errors() {
        let notary = Arc::new(MemoryNotary::failing(LedgerError::Rejected(
            "no write permission".into(),
        )));
        let pool = NotaryPool::new(notary, NotaryPoolConfig::default());

        let err = pool.record(fingerprint(b"hello"), "S3").await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected(_)));
    }

    #[tokio::test]
    async fn test_concurrent_records_all_land() {
        let notary = Arc::new(MemoryNotary::new());
        let pool = Arc::new(NotaryPool::new(notary.clone(), NotaryPoolConfig::default()));

        let mut handles = Vec::new();
        for i in 0..8 {
            let pool = Arc::clone(&pool);
            handles.push(tokio::spawn(async move {
                let fp = fingerprint(format!("file-{}", i).as_bytes());
                pool.record(fp, "S3").await
            }));
        }
        for handle in handles {
            assert_ok!(handle.await.unwrap());
        }
        assert_eq!(notary.event_count().await, 8);
    }

    #[tokio::test]
    async fn test_stats_reflect_idle_pool() {
        let notary = Arc::new(MemoryNotary::new());
        let pool = NotaryPool::new(notary, NotaryPoolConfig::default());

        let stats = pool.stats();
        assert_eq!(stats.workers, 2);
        assert_eq!(stats.queue_free, 256);
    }
}
