//! File event schema
//!
//! One document per fingerprint, written by the upload path and by the
//! ledger tailer. The fingerprint is the unique key: later uploads of the
//! same content upsert, they never duplicate.

use bson::{doc, Document};
use mongodb::options::IndexOptions;
use mongodb::IndexModel;
use serde::{Deserialize, Serialize};

/// Index record proving a file was notarized
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileEvent {
    /// Content fingerprint, 64 lowercase hex chars (unique key)
    pub file_hash: String,

    /// Original uploaded filename ("unknown" when only the ledger event,
    /// which carries no filename, has been observed)
    pub filename: String,

    /// Uploader identity
    pub uploader: String,

    /// Set of storage backend labels where the file resides (non-empty,
    /// drawn from the fixed enumeration)
    #[serde(default)]
    pub storage: Vec<String>,

    /// Ledger-confirmed block time (unix seconds) — never wall-clock
    /// submission time, so it is re-derivable from the ledger alone
    pub timestamp: i64,

    /// Transaction identifier of the (latest) notarization
    pub txn_hash: String,
}

impl FileEvent {
    /// Mongo indexes: unique on the fingerprint, secondary on filename for
    /// the check-file-name lookup.
    pub fn indexes() -> Vec<IndexModel> {
        vec![
            IndexModel::builder()
                .keys(doc! { "file_hash": 1 })
                .options(IndexOptions::builder().unique(true).build())
                .build(),
            IndexModel::builder().keys(doc! { "filename": 1 }).build(),
        ]
    }
}

/// Partial update applied to the record for a fingerprint.
///
/// `storage` merges by set-union; every other field overwrites. `filename`
/// and `uploader` left as `None` only take effect on first insert (the
/// tailer uses this so replayed events never clobber a real filename with
/// "unknown").
#[derive(Debug, Clone)]
pub struct EventPatch {
    pub filename: Option<String>,
    pub uploader: Option<String>,
    pub storage: Vec<String>,
    pub timestamp: i64,
    pub txn_hash: String,
}

impl EventPatch {
    /// Build the Mongo update document: `$set` for overwrite fields,
    /// `$setOnInsert` for insert-only defaults, `$addToSet`/`$each` for the
    /// atomic storage-set union.
    pub fn to_update(&self) -> Document {
        let mut set = doc! {
            "timestamp": self.timestamp,
            "txn_hash": &self.txn_hash,
        };
        let mut set_on_insert = Document::new();

        match &self.filename {
            Some(name) => {
                set.insert("filename", name);
            }
            None => {
                set_on_insert.insert("filename", "unknown");
            }
        }
        match &self.uploader {
            Some(uploader) => {
                set.insert("uploader", uploader);
            }
            None => {
                set_on_insert.insert("uploader", "unknown");
            }
        }

        let mut update = doc! {
            "$set": set,
            "$addToSet": { "storage": { "$each": &self.storage } },
        };
        if !set_on_insert.is_empty() {
            update.insert("$setOnInsert", set_on_insert);
        }
        update
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_update_sets_known_fields() {
        let patch = EventPatch {
            filename: Some("a.txt".into()),
            uploader: Some("alice".into()),
            storage: vec!["S3".into()],
            timestamp: 1700000000,
            txn_hash: "0x01".into(),
        };

        let update = patch.to_update();
        let set = update.get_document("$set").unwrap();
        assert_eq!(set.get_str("filename").unwrap(), "a.txt");
        assert_eq!(set.get_str("uploader").unwrap(), "alice");
        assert!(update.get("$setOnInsert").is_none());
    }

    #[test]
    fn test_update_defaults_only_on_insert() {
        let patch = EventPatch {
            filename: None,
            uploader: None,
            storage: vec!["IPFS".into()],
            timestamp: 1700000000,
            txn_hash: "0x02".into(),
        };

        let update = patch.to_update();
        let set = update.get_document("$set").unwrap();
        assert!(set.get("filename").is_none());
        let on_insert = update.get_document("$setOnInsert").unwrap();
        assert_eq!(on_insert.get_str("filename").unwrap(), "unknown");
        assert_eq!(on_insert.get_str("uploader").unwrap(), "unknown");
    }
}
