//! Configuration for Hallmark
//!
//! CLI arguments and environment variable handling using clap.

use clap::Parser;
use std::net::SocketAddr;
use uuid::Uuid;

/// Hallmark - file notarization gateway
///
/// Hashes uploads, stores the bytes on the requested object-storage
/// backends, anchors a notarization record on the ledger, and keeps a
/// MongoDB index for verification lookups.
#[derive(Parser, Debug, Clone)]
#[command(name = "hallmark")]
#[command(about = "File notarization gateway")]
pub struct Args {
    /// Unique node identifier for this gateway instance
    #[arg(long, env = "NODE_ID", default_value_t = Uuid::new_v4())]
    pub node_id: Uuid,

    /// Address to listen on
    #[arg(long, env = "LISTEN", default_value = "0.0.0.0:8080")]
    pub listen: SocketAddr,

    /// Enable development mode (in-memory fakes for unconfigured services)
    #[arg(long, env = "DEV_MODE", default_value = "false")]
    pub dev_mode: bool,

    /// MongoDB connection URI
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    pub mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "hallmark")]
    pub mongodb_db: String,

    /// Ledger JSON-RPC endpoint (e.g. "http://localhost:8545")
    /// When unset in dev mode, an in-memory ledger is used instead.
    #[arg(long, env = "LEDGER_RPC_URL")]
    pub ledger_rpc_url: Option<String>,

    /// Maximum time to wait for ledger confirmation, in milliseconds.
    /// Confirmation latency is seconds, not milliseconds; this bounds it.
    #[arg(long, env = "LEDGER_CONFIRM_TIMEOUT_MS", default_value = "60000")]
    pub ledger_confirm_timeout_ms: u64,

    /// Number of notary worker tasks (ledger writes run off the request path)
    #[arg(long, env = "NOTARY_WORKER_COUNT", default_value = "2")]
    pub notary_worker_count: usize,

    /// Maximum queued notarization requests
    #[arg(long, env = "NOTARY_QUEUE_SIZE", default_value = "256")]
    pub notary_queue_size: usize,

    /// S3-compatible endpoint URL (e.g. "https://s3.amazonaws.com")
    #[arg(long, env = "S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// S3 bucket name
    #[arg(long, env = "S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// S3 access token (bearer auth against the S3-compatible gateway)
    #[arg(long, env = "S3_ACCESS_TOKEN")]
    pub s3_access_token: Option<String>,

    /// IPFS node HTTP API URL (e.g. "http://localhost:5001")
    #[arg(long, env = "IPFS_API_URL")]
    pub ipfs_api_url: Option<String>,

    /// IPFS gateway URL used to build retrievable locators
    #[arg(long, env = "IPFS_GATEWAY_URL", default_value = "https://ipfs.io/ipfs")]
    pub ipfs_gateway_url: String,

    /// Per-backend storage write timeout in milliseconds
    #[arg(long, env = "STORAGE_TIMEOUT_MS", default_value = "30000")]
    pub storage_timeout_ms: u64,

    /// Maximum accepted upload body size in bytes
    #[arg(long, env = "MAX_UPLOAD_BYTES", default_value = "104857600")]
    pub max_upload_bytes: usize,

    /// Run the ledger tailer inside the gateway process.
    /// Disable when running the standalone hallmark-tailer binary;
    /// at most one tailer instance may advance the watermark.
    #[arg(long, env = "TAILER_EMBEDDED", default_value = "true")]
    pub tailer_embedded: bool,

    /// Ledger tailer poll interval in seconds
    #[arg(long, env = "TAILER_POLL_SECS", default_value = "10")]
    pub tailer_poll_secs: u64,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, env = "LOG_LEVEL", default_value = "info")]
    pub log_level: String,
}

impl Args {
    /// True when the S3 backend is fully configured
    pub fn s3_configured(&self) -> bool {
        self.s3_endpoint.is_some() && self.s3_bucket.is_some()
    }

    /// True when the IPFS backend is configured
    pub fn ipfs_configured(&self) -> bool {
        self.ipfs_api_url.is_some()
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !self.dev_mode {
            if self.ledger_rpc_url.is_none() {
                return Err("LEDGER_RPC_URL is required in production mode".to_string());
            }
            if !self.s3_configured() && !self.ipfs_configured() {
                return Err(
                    "At least one storage backend (S3_ENDPOINT+S3_BUCKET or IPFS_API_URL) \
                     must be configured in production mode"
                        .to_string(),
                );
            }
        }

        if self.s3_endpoint.is_some() != self.s3_bucket.is_some() {
            return Err("S3_ENDPOINT and S3_BUCKET must be set together".to_string());
        }

        if self.notary_worker_count == 0 {
            return Err("NOTARY_WORKER_COUNT must be at least 1".to_string());
        }

        if self.max_upload_bytes == 0 {
            return Err("MAX_UPLOAD_BYTES must be greater than zero".to_string());
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dev_mode_needs_no_services() {
        let args = Args::parse_from(["hallmark", "--dev-mode"]);
        assert!(args.validate().is_ok());
        assert!(!args.s3_configured());
        assert!(!args.ipfs_configured());
    }

    #[test]
    fn test_production_requires_ledger() {
        let args = Args::parse_from([
            "hallmark",
            "--s3-endpoint",
            "https://s3.example.com",
            "--s3-bucket",
            "files",
        ]);
        assert!(args.validate().is_err());
    }

    #[test]
    fn test_s3_endpoint_and_bucket_paired() {
        let args = Args::parse_from([
            "hallmark",
            "--dev-mode",
            "--s3-endpoint",
            "https://s3.example.com",
        ]);
        assert!(args.validate().is_err());
    }
}
