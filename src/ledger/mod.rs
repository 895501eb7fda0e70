//! Ledger notarization capability
//!
//! The ledger is an append-only, externally verifiable record of
//! notarization events. Writes are seconds-slow (block confirmation), so the
//! gateway never calls [`LedgerNotary::record`] directly from a request
//! handler; it goes through the [`NotaryPool`] workers instead.

pub mod memory;
pub mod pool;
pub mod rpc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::hashing::Fingerprint;
use crate::types::LedgerError;

pub use memory::MemoryNotary;
pub use pool::{NotaryPool, NotaryPoolConfig, NotaryPoolStats};
pub use rpc::{RpcNotary, RpcNotaryConfig};

/// Proof of a confirmed notarization write.
///
/// Produced exactly once per successful ledger write; immutable. The block
/// time is read back from the confirmed block, never assumed from submission
/// time, so it stays correct under confirmation delay and reordering.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotarizationReceipt {
    /// Transaction identifier on the ledger
    pub txn_hash: String,
    /// Block that confirmed the transaction
    pub block_number: u64,
    /// Timestamp of the confirming block (unix seconds)
    pub block_time: i64,
}

/// One notarization event as observed on the ledger
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotaryEvent {
    /// Content fingerprint carried by the event (64 lowercase hex chars)
    pub fingerprint: String,
    /// Ledger identity that submitted the write
    pub uploader: String,
    /// Storage label recorded with the write (e.g. "S3")
    pub storage_label: String,
    /// Block that carries the event
    pub block_number: u64,
    /// Timestamp of that block (unix seconds)
    pub block_time: i64,
    /// Transaction identifier
    pub txn_hash: String,
}

/// A page of events strictly newer than a watermark, plus the new head
#[derive(Debug, Clone, Default)]
pub struct EventBatch {
    pub events: Vec<NotaryEvent>,
    /// Highest block covered by this fetch; the tailer's next watermark
    pub head_block: u64,
}

/// Capability interface over the notarization ledger.
///
/// `record` blocks until the write is confirmed (or the deadline passes);
/// `events_after` serves the tailer's reconciliation reads.
#[async_trait]
pub trait LedgerNotary: Send + Sync {
    /// Submit a notarization record and wait for confirmation.
    ///
    /// `storage_label` is a short label identifying the backend the bytes
    /// were written to (one record per successful backend write).
    async fn record(
        &self,
        fingerprint: &Fingerprint,
        storage_label: &str,
    ) -> Result<NotarizationReceipt, LedgerError>;

    /// Fetch events in blocks strictly newer than `after_block` (exclusive)
    async fn events_after(&self, after_block: u64) -> Result<EventBatch, LedgerError>;
}
