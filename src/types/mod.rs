//! Shared types for Hallmark

pub mod error;

pub use error::{HallmarkError, LedgerError, Result, StorageError};
