//! Error types for Hallmark

use hyper::StatusCode;

/// Main error type for Hallmark operations
#[derive(Debug, thiserror::Error)]
pub enum HallmarkError {
    #[error("Bad request: {0}")]
    BadRequest(String),

    #[error("No storage backend selected")]
    NoBackendSelected,

    #[error("Not found: {0}")]
    NotFound(String),

    /// Every requested backend failed; nothing was stored or notarized.
    #[error("Upload failed on all requested storage backends for '{0}'")]
    AllBackendsFailed(String),

    #[error("Ledger error: {0}")]
    Ledger(String),

    #[error("Database error: {0}")]
    Database(String),

    #[error("Internal error: {0}")]
    Internal(String),

    #[error("Configuration error: {0}")]
    Config(String),
}

impl HallmarkError {
    /// Convert error to HTTP status code
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::NoBackendSelected => StatusCode::BAD_REQUEST,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::AllBackendsFailed(_) => StatusCode::BAD_GATEWAY,
            Self::Ledger(_) => StatusCode::BAD_GATEWAY,
            Self::Database(_) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            Self::Config(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Convert to status code and body tuple for HTTP response
    pub fn into_status_code_and_body(self) -> (StatusCode, String) {
        let status = self.status_code();
        let body = self.to_string();
        (status, body)
    }
}

impl From<std::io::Error> for HallmarkError {
    fn from(err: std::io::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<serde_json::Error> for HallmarkError {
    fn from(err: serde_json::Error) -> Self {
        Self::BadRequest(format!("JSON error: {}", err))
    }
}

impl From<hyper::Error> for HallmarkError {
    fn from(err: hyper::Error) -> Self {
        Self::Internal(format!("HTTP error: {}", err))
    }
}

impl From<mongodb::error::Error> for HallmarkError {
    fn from(err: mongodb::error::Error) -> Self {
        Self::Database(err.to_string())
    }
}

/// Per-backend storage failure.
///
/// Never propagated past the failing backend's own attempt: the orchestrator
/// converts each into a recorded outcome in the upload report.
#[derive(Debug, Clone, thiserror::Error)]
pub enum StorageError {
    /// An object under the requested key is already present.
    #[error("object already exists under this key")]
    AlreadyExists,

    /// Transport, auth, or service error talking to the backend.
    #[error("storage backend unavailable: {0}")]
    Unavailable(String),

    /// The per-call timeout elapsed before the backend answered.
    #[error("storage write timed out")]
    Timeout,
}

/// Per-call ledger failure.
///
/// Like [`StorageError`], these are recorded outcomes, never request-fatal
/// on their own.
#[derive(Debug, Clone, thiserror::Error)]
pub enum LedgerError {
    /// Transient transport failure; retryable.
    #[error("ledger unreachable: {0}")]
    Unreachable(String),

    /// The submission was rejected (malformed, or the identity lacks write
    /// permission). Not retryable without operator intervention.
    #[error("ledger rejected submission: {0}")]
    Rejected(String),

    /// Confirmation did not arrive within the deadline.
    #[error("ledger confirmation timed out")]
    Timeout,
}

/// Result type alias for Hallmark operations
pub type Result<T> = std::result::Result<T, HallmarkError>;
