//! Hallmark - file notarization gateway
//!
//! Hallmark accepts file uploads, fingerprints their content with SHA-256,
//! fans the bytes out to object-storage backends, records each successful
//! write on an append-only ledger, and indexes the results in MongoDB for
//! content verification.
//!
//! ## Services
//!
//! - **Gateway**: HTTP upload, verification, and filename-lookup endpoints
//! - **Storage**: S3-compatible and IPFS backends behind one capability trait
//! - **Notary**: ledger writes confirmed off the request path by a worker pool
//! - **Tailer**: ledger polling that reconciles the index with chain state

pub mod config;
pub mod db;
pub mod hashing;
pub mod index;
pub mod ledger;
pub mod orchestrator;
pub mod routes;
pub mod server;
pub mod storage;
pub mod tailer;
pub mod types;

pub use config::Args;
pub use server::{run, AppState};
pub use types::{HallmarkError, Result};
