//! Hallmark Tailer - standalone ledger reconciliation worker
//!
//! Run this binary when the gateway's embedded tailer is disabled
//! (--tailer-embedded false), so exactly one process advances the
//! watermark.
//!
//! Usage:
//!   hallmark-tailer --ledger-rpc-url http://localhost:8545 --mongodb-uri mongodb://localhost:27017
//!
//! Environment variables:
//!   LEDGER_RPC_URL - Ledger JSON-RPC endpoint (required)
//!   MONGODB_URI - MongoDB connection string (default: mongodb://localhost:27017)
//!   MONGODB_DB - Database name (default: hallmark)
//!   TAILER_POLL_SECS - Poll interval in seconds (default: 10)

use clap::Parser;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use hallmark::db::MongoClient;
use hallmark::index::EventIndex;
use hallmark::ledger::{RpcNotary, RpcNotaryConfig};
use hallmark::tailer::{spawn_tailer_task, LedgerTailer, WatermarkStore};

#[derive(Parser, Debug)]
#[command(name = "hallmark-tailer")]
#[command(about = "Ledger reconciliation worker for Hallmark")]
#[command(version)]
struct Args {
    /// Ledger JSON-RPC endpoint
    #[arg(long, env = "LEDGER_RPC_URL")]
    ledger_rpc_url: String,

    /// MongoDB connection string
    #[arg(long, env = "MONGODB_URI", default_value = "mongodb://localhost:27017")]
    mongodb_uri: String,

    /// MongoDB database name
    #[arg(long, env = "MONGODB_DB", default_value = "hallmark")]
    mongodb_db: String,

    /// Poll interval in seconds
    #[arg(long, env = "TAILER_POLL_SECS", default_value = "10")]
    poll_secs: u64,
}

#[tokio::main]
async fn main() {
    let _ = dotenvy::dotenv();

    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hallmark=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let args = Args::parse();

    info!(
        "Starting Hallmark tailer (ledger: {}, MongoDB: {})",
        args.ledger_rpc_url, args.mongodb_uri
    );

    let mongo = match MongoClient::new(&args.mongodb_uri, &args.mongodb_db).await {
        Ok(client) => client,
        Err(e) => {
            error!("MongoDB connection failed: {}", e);
            std::process::exit(1);
        }
    };

    let index = match EventIndex::mongo(&mongo).await {
        Ok(index) => Arc::new(index),
        Err(e) => {
            error!("Failed to initialize event index: {}", e);
            std::process::exit(1);
        }
    };

    let notary = match RpcNotary::new(RpcNotaryConfig {
        rpc_url: args.ledger_rpc_url.clone(),
        ..RpcNotaryConfig::default()
    }) {
        Ok(notary) => Arc::new(notary),
        Err(e) => {
            error!("Failed to create ledger client: {}", e);
            std::process::exit(1);
        }
    };

    let tailer = Arc::new(LedgerTailer::new(
        notary,
        index,
        WatermarkStore::mongo(&mongo),
    ));
    let handle = spawn_tailer_task(tailer, Duration::from_secs(args.poll_secs));

    tokio::select! {
        _ = tokio::signal::ctrl_c() => {
            info!("Received shutdown signal");
        }
        result = handle => {
            if let Err(e) = result {
                error!("Tailer task error: {}", e);
            }
        }
    }

    info!("Tailer shutting down");
}
