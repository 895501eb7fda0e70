//! In-memory storage backend for tests and dev mode

use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::RwLock;

use super::{StorageBackend, StorageKind, StorageLocator};
use crate::types::StorageError;

/// In-process object store. Reports as whichever `StorageKind` it is
/// constructed with, so tests can stand in for any real backend.
pub struct MemoryBackend {
    kind: StorageKind,
    objects: RwLock<HashMap<String, Vec<u8>>>,
    /// When set, every put/exists call fails with this error (failure
    /// injection for partial-failure tests)
    fail_with: Option<StorageError>,
}

impl MemoryBackend {
    pub fn new(kind: StorageKind) -> Self {
        Self {
            kind,
            objects: RwLock::new(HashMap::new()),
            fail_with: None,
        }
    }

    /// A backend that fails every call, for partial-failure tests
    pub fn failing(kind: StorageKind, error: StorageError) -> Self {
        Self {
            kind,
            objects: RwLock::new(HashMap::new()),
            fail_with: Some(error),
        }
    }

    /// Number of stored objects
    pub async fn len(&self) -> usize {
        self.objects.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.objects.read().await.is_empty()
    }

    /// Fetch stored bytes (test helper)
    pub async fn get(&self, key: &str) -> Option<Vec<u8>> {
        self.objects.read().await.get(key).cloned()
    }
}

#[async_trait]
impl StorageBackend for MemoryBackend {
    fn kind(&self) -> StorageKind {
        self.kind
    }

    async fn put(&self, key: &str, data: &[u8]) -> Result<StorageLocator, StorageError> {
        if let Some(ref e) = self.fail_with {
            return Err(e.clone());
        }

        let mut objects = self.objects.write().await;
        if objects.contains_key(key) {
            return Err(StorageError::AlreadyExists);
        }
        objects.insert(key.to_string(), data.to_vec());

        Ok(StorageLocator(format!(
            "memory://{}/{}",
            self.kind.label().to_lowercase(),
            key
        )))
    }

    async fn exists(&self, key: &str) -> Result<bool, StorageError> {
        if let Some(ref e) = self.fail_with {
            return Err(e.clone());
        }
        Ok(self.objects.read().await.contains_key(key))
    }
}
