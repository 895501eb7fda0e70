//! Hallmark - file notarization gateway
//!
//! Hashes uploads, fans them out to object storage, notarizes each write
//! on the ledger, and serves content verification from the event index.

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use hallmark::{
    config::Args,
    db::MongoClient,
    index::EventIndex,
    ledger::{LedgerNotary, MemoryNotary, NotaryPool, NotaryPoolConfig, RpcNotary, RpcNotaryConfig},
    orchestrator::UploadOrchestrator,
    server,
    storage::{IpfsBackend, MemoryBackend, S3Backend, StorageBackend, StorageKind},
    storage::{ipfs::IpfsConfig, s3::S3Config},
    tailer::{spawn_tailer_task, LedgerTailer, WatermarkStore},
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load environment variables from .env file if present
    let _ = dotenvy::dotenv();

    let args = Args::parse();

    // Initialize tracing/logging
    let log_level = args.log_level.clone();
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| format!("hallmark={},info", log_level).into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    if let Err(e) = args.validate() {
        error!("Configuration error: {}", e);
        std::process::exit(1);
    }

    info!("======================================");
    info!("  Hallmark - File Notarization Gateway");
    info!("======================================");
    info!("Node ID: {}", args.node_id);
    info!("Listen: {}", args.listen);
    info!(
        "Mode: {}",
        if args.dev_mode { "DEVELOPMENT" } else { "PRODUCTION" }
    );
    info!("MongoDB: {}", args.mongodb_uri);
    info!(
        "Ledger RPC: {}",
        args.ledger_rpc_url.as_deref().unwrap_or("(memory)")
    );
    info!("S3: {}", if args.s3_configured() { "enabled" } else { "disabled" });
    info!("IPFS: {}", if args.ipfs_configured() { "enabled" } else { "disabled" });
    info!("Notary workers: {}", args.notary_worker_count);
    info!("======================================");

    // Connect to MongoDB (falls back to in-memory index in dev mode)
    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => {
            info!("MongoDB connected successfully");
            Some(client)
        }
        Err(e) => {
            if args.dev_mode {
                warn!("MongoDB connection failed (dev mode, using memory index): {}", e);
                None
            } else {
                error!("MongoDB connection failed: {}", e);
                std::process::exit(1);
            }
        }
    };

    let (index, persistent_index) = match &mongo {
        Some(client) => match EventIndex::mongo(client).await {
            Ok(index) => (Arc::new(index), true),
            Err(e) => {
                error!("Failed to initialize event index: {}", e);
                std::process::exit(1);
            }
        },
        None => (Arc::new(EventIndex::memory()), false),
    };

    // Storage backends from config; dev mode substitutes memory backends so
    // the full pipeline is exercisable without external services.
    let storage_timeout = Duration::from_millis(args.storage_timeout_ms);
    let mut backends: Vec<Arc<dyn StorageBackend>> = Vec::new();

    if args.s3_configured() {
        let config = S3Config {
            endpoint: args.s3_endpoint.clone().unwrap_or_default(),
            bucket: args.s3_bucket.clone().unwrap_or_default(),
            access_token: args.s3_access_token.clone(),
            timeout: storage_timeout,
        };
        match S3Backend::new(config) {
            Ok(backend) => {
                info!("S3 backend configured");
                backends.push(Arc::new(backend));
            }
            Err(e) => {
                error!("S3 backend initialization failed: {}", e);
                std::process::exit(1);
            }
        }
    } else if args.dev_mode {
        warn!("S3 not configured (dev mode, using memory backend)");
        backends.push(Arc::new(MemoryBackend::new(StorageKind::S3)));
    }

    if args.ipfs_configured() {
        let config = IpfsConfig {
            api_url: args.ipfs_api_url.clone().unwrap_or_default(),
            gateway_url: args.ipfs_gateway_url.clone(),
            timeout: storage_timeout,
        };
        match IpfsBackend::new(config) {
            Ok(backend) => {
                info!("IPFS backend configured");
                backends.push(Arc::new(backend));
            }
            Err(e) => {
                error!("IPFS backend initialization failed: {}", e);
                std::process::exit(1);
            }
        }
    } else if args.dev_mode {
        warn!("IPFS not configured (dev mode, using memory backend)");
        backends.push(Arc::new(MemoryBackend::new(StorageKind::Ipfs)));
    }

    // Ledger notary: JSON-RPC client, or the in-process ledger in dev mode
    let notary: Arc<dyn LedgerNotary> = match &args.ledger_rpc_url {
        Some(url) => {
            let config = RpcNotaryConfig {
                rpc_url: url.clone(),
                confirm_timeout: Duration::from_millis(args.ledger_confirm_timeout_ms),
                ..RpcNotaryConfig::default()
            };
            match RpcNotary::new(config) {
                Ok(notary) => {
                    info!("Ledger RPC notary configured at {}", url);
                    Arc::new(notary)
                }
                Err(e) => {
                    error!("Ledger notary initialization failed: {}", e);
                    std::process::exit(1);
                }
            }
        }
        None => {
            warn!("Ledger RPC not configured (dev mode, using memory ledger)");
            Arc::new(MemoryNotary::new())
        }
    };

    let pool = Arc::new(NotaryPool::new(
        Arc::clone(&notary),
        NotaryPoolConfig {
            worker_count: args.notary_worker_count,
            max_queue_size: args.notary_queue_size,
            request_timeout: Duration::from_millis(args.ledger_confirm_timeout_ms)
                + Duration::from_secs(30),
        },
    ));

    let orchestrator = Arc::new(UploadOrchestrator::new(
        backends,
        pool,
        Arc::clone(&index),
        storage_timeout,
    ));

    // Embedded tailer keeps the index converged with the ledger. Disable it
    // here when running the standalone hallmark-tailer binary instead.
    let _tailer_handle = if args.tailer_embedded {
        let watermark = match &mongo {
            Some(client) => WatermarkStore::mongo(client),
            None => WatermarkStore::memory(),
        };
        let tailer = Arc::new(LedgerTailer::new(notary, Arc::clone(&index), watermark));
        Some(spawn_tailer_task(
            tailer,
            Duration::from_secs(args.tailer_poll_secs),
        ))
    } else {
        info!("Embedded tailer disabled");
        None
    };

    let state = Arc::new(server::AppState::new(
        args,
        orchestrator,
        index,
        persistent_index,
    ));

    if let Err(e) = server::run(state).await {
        error!("Server error: {:?}", e);
        std::process::exit(1);
    }

    Ok(())
}
