//! Event index — the verification lookup store
//!
//! Keyed uniquely by fingerprint, upserted from both the upload path and the
//! ledger tailer; either order of those writers converges to the same record
//! because upserts are idempotent and the storage set merges atomically.
//!
//! Two backings: a Mongo store and an in-memory mode for tests and dev.
//! Mongo performs the set-union inside a single `update_one`
//! (`$addToSet`/`$each`), never read-modify-write from the caller; the
//! memory backing merges under its write lock.

pub mod event;

use bson::doc;
use futures_util::TryStreamExt;
use mongodb::Collection;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;

use crate::db::MongoClient;
use crate::hashing::Fingerprint;
use crate::types::{HallmarkError, Result};

pub use event::{EventPatch, FileEvent};

const COLLECTION_NAME: &str = "file_events";

enum Backing {
    Mongo(Collection<FileEvent>),
    Memory(RwLock<HashMap<String, FileEvent>>),
}

pub struct EventIndex {
    backing: Backing,
}

impl EventIndex {
    /// Mongo-backed index; creates the collection's indexes up front
    pub async fn mongo(client: &MongoClient) -> Result<Self> {
        let collection = client.collection::<FileEvent>(COLLECTION_NAME);
        collection
            .create_indexes(FileEvent::indexes())
            .await
            .map_err(|e| HallmarkError::Database(format!("Failed to create indexes: {}", e)))?;

        Ok(Self {
            backing: Backing::Mongo(collection),
        })
    }

    /// In-memory index for tests and dev mode
    pub fn memory() -> Self {
        Self {
            backing: Backing::Memory(RwLock::new(HashMap::new())),
        }
    }

    /// Merge `patch` into the record for `fingerprint`, creating it if
    /// absent. Storage labels union; timestamp and txn hash overwrite.
    pub async fn upsert(&self, fingerprint: &Fingerprint, patch: EventPatch) -> Result<()> {
        debug!(
            fingerprint = %fingerprint,
            storage = ?patch.storage,
            txn = %patch.txn_hash,
            "upserting file event"
        );

        match &self.backing {
            Backing::Mongo(collection) => {
                collection
                    .update_one(
                        doc! { "file_hash": fingerprint.as_str() },
                        patch.to_update(),
                    )
                    .upsert(true)
                    .await
                    .map_err(|e| HallmarkError::Database(format!("Upsert failed: {}", e)))?;
            }
            Backing::Memory(map) => {
                let mut map = map.write().await;
                match map.get_mut(fingerprint.as_str()) {
                    Some(existing) => {
                        if let Some(name) = patch.filename {
                            existing.filename = name;
                        }
                        if let Some(uploader) = patch.uploader {
                            existing.uploader = uploader;
                        }
                        for label in patch.storage {
                            if !existing.storage.contains(&label) {
                                existing.storage.push(label);
                            }
                        }
                        existing.timestamp = patch.timestamp;
                        existing.txn_hash = patch.txn_hash;
                    }
                    None => {
                        map.insert(
                            fingerprint.as_str().to_string(),
                            FileEvent {
                                file_hash: fingerprint.as_str().to_string(),
                                filename: patch.filename.unwrap_or_else(|| "unknown".into()),
                                uploader: patch.uploader.unwrap_or_else(|| "unknown".into()),
                                storage: patch.storage,
                                timestamp: patch.timestamp,
                                txn_hash: patch.txn_hash,
                            },
                        );
                    }
                }
            }
        }

        Ok(())
    }

    /// Look up the record for a fingerprint
    pub async fn find_one(&self, fingerprint: &Fingerprint) -> Result<Option<FileEvent>> {
        match &self.backing {
            Backing::Mongo(collection) => collection
                .find_one(doc! { "file_hash": fingerprint.as_str() })
                .await
                .map_err(|e| HallmarkError::Database(format!("Find failed: {}", e))),
            Backing::Memory(map) => Ok(map.read().await.get(fingerprint.as_str()).cloned()),
        }
    }

    /// All records carrying a given original filename
    pub async fn find_by_filename(&self, filename: &str) -> Result<Vec<FileEvent>> {
        match &self.backing {
            Backing::Mongo(collection) => {
                let cursor = collection
                    .find(doc! { "filename": filename })
                    .await
                    .map_err(|e| HallmarkError::Database(format!("Find failed: {}", e)))?;
                cursor
                    .try_collect()
                    .await
                    .map_err(|e| HallmarkError::Database(format!("Cursor failed: {}", e)))
            }
            Backing::Memory(map) => Ok(map
                .read()
                .await
                .values()
                .filter(|e| e.filename == filename)
                .cloned()
                .collect()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hashing::fingerprint;

    fn patch(storage: &[&str], txn: &str) -> EventPatch {
        EventPatch {
            filename: Some("a.txt".into()),
            uploader: Some("alice".into()),
            storage: storage.iter().map(|s| s.to_string()).collect(),
            timestamp: 1700000000,
            txn_hash: txn.into(),
        }
    }

    #[tokio::test]
    async fn test_upsert_then_find() {
        let index = EventIndex::memory();
        let fp = fingerprint(b"hello");

        index.upsert(&fp, patch(&["S3"], "0x01")).await.unwrap();
        let event = index.find_one(&fp).await.unwrap().unwrap();
        assert_eq!(event.file_hash, fp.as_str());
        assert_eq!(event.storage, vec!["S3".to_string()]);
    }

    #[tokio::test]
    async fn test_upsert_is_idempotent_on_storage() {
        let index = EventIndex::memory();
        let fp = fingerprint(b"hello");

        index.upsert(&fp, patch(&["S3"], "0x01")).await.unwrap();
        index.upsert(&fp, patch(&["S3"], "0x01")).await.unwrap();

        let event = index.find_one(&fp).await.unwrap().unwrap();
        assert_eq!(event.storage.len(), 1);
    }

    #[tokio::test]
    async fn test_storage_set_unions_across_upserts() {
        let index = EventIndex::memory();
        let fp = fingerprint(b"hello");

        index.upsert(&fp, patch(&["S3"], "0x01")).await.unwrap();
        index.upsert(&fp, patch(&["IPFS"], "0x02")).await.unwrap();

        let event = index.find_one(&fp).await.unwrap().unwrap();
        assert_eq!(event.storage.len(), 2);
        // Latest receipt wins the single txn/timestamp slot
        assert_eq!(event.txn_hash, "0x02");
    }

    #[tokio::test]
    async fn test_insert_only_defaults_do_not_clobber() {
        let index = EventIndex::memory();
        let fp = fingerprint(b"hello");

        index.upsert(&fp, patch(&["S3"], "0x01")).await.unwrap();
        // Tailer-shaped patch: no filename/uploader
        index
            .upsert(
                &fp,
                EventPatch {
                    filename: None,
                    uploader: None,
                    storage: vec!["S3".into()],
                    timestamp: 1700000001,
                    txn_hash: "0x01".into(),
                },
            )
            .await
            .unwrap();

        let event = index.find_one(&fp).await.unwrap().unwrap();
        assert_eq!(event.filename, "a.txt");
        assert_eq!(event.uploader, "alice");
    }

    #[tokio::test]
    async fn test_find_by_filename() {
        let index = EventIndex::memory();
        let fp_a = fingerprint(b"version one");
        let fp_b = fingerprint(b"version two");

        index.upsert(&fp_a, patch(&["S3"], "0x01")).await.unwrap();
        index.upsert(&fp_b, patch(&["S3"], "0x02")).await.unwrap();

        let events = index.find_by_filename("a.txt").await.unwrap();
        assert_eq!(events.len(), 2);
        assert!(index.find_by_filename("b.txt").await.unwrap().is_empty());
    }
}
