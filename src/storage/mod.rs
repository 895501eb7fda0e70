//! Object-storage capability interface
//!
//! Each backend wraps a distinct third-party storage service behind the same
//! trait; the orchestrator is agnostic to which. A `put` is a durable write
//! visible to subsequent `exists` calls from any caller, with no intermediate
//! staging state visible externally.

pub mod ipfs;
pub mod memory;
pub mod s3;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::types::StorageError;

pub use ipfs::IpfsBackend;
pub use memory::MemoryBackend;
pub use s3::S3Backend;

/// The fixed enumeration of places a file can reside.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum StorageKind {
    S3,
    Ipfs,
    /// Content anchored directly in ledger transaction data, no external
    /// object store. Appears in tailed events, never as an upload target.
    Ledger,
}

impl StorageKind {
    /// Stable label used in ledger records, index documents, and responses
    pub fn label(&self) -> &'static str {
        match self {
            Self::S3 => "S3",
            Self::Ipfs => "IPFS",
            Self::Ledger => "Ledger",
        }
    }

    /// Lowercase key used in HTTP request/response maps ("s3", "ipfs")
    pub fn field_name(&self) -> &'static str {
        match self {
            Self::S3 => "s3",
            Self::Ipfs => "ipfs",
            Self::Ledger => "ledger",
        }
    }
}

impl fmt::Display for StorageKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Opaque locator identifying where a backend placed the bytes.
///
/// Owned by the backend that produced it; immutable once issued.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StorageLocator(pub String);

impl StorageLocator {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageLocator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Capability interface over one external object-storage provider.
///
/// `put` fails with `StorageError::AlreadyExists` when an object under `key`
/// is already present; callers treat that as a failed upload for this backend
/// (policy is uniform across backends, never varied per backend).
#[async_trait]
pub trait StorageBackend: Send + Sync {
    /// Which member of the fixed enumeration this backend is
    fn kind(&self) -> StorageKind;

    /// Durably persist `data` under `key` and return a retrievable locator
    async fn put(&self, key: &str, data: &[u8]) -> Result<StorageLocator, StorageError>;

    /// Whether an object already exists under `key`
    async fn exists(&self, key: &str) -> Result<bool, StorageError>;
}

/// Storage key for an uploaded file. All backends share the same key scheme
/// so `exists` checks and re-uploads behave identically everywhere.
pub fn object_key(filename: &str) -> String {
    format!("uploads/{}", filename)
}
