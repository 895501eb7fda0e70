//! Health check endpoints
//!
//! Kubernetes-style probes:
//! - /health, /healthz - liveness (is the gateway running?)
//! - /ready, /readyz - readiness (can it serve uploads?)
//!
//! In dev mode the gateway runs against in-memory stores, so readiness
//! never depends on MongoDB or the ledger there.

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};
use serde::Serialize;
use std::sync::Arc;

use crate::ledger::NotaryPoolStats;
use crate::server::AppState;

/// Health response for probes and the operator dashboard
#[derive(Serialize)]
pub struct HealthResponse {
    pub healthy: bool,
    /// 'online' or 'degraded'
    pub status: &'static str,
    pub version: &'static str,
    /// Seconds since process start
    pub uptime: u64,
    pub timestamp: String,
    /// Operating mode: 'development' or 'production'
    pub mode: String,
    pub node_id: String,
    /// Storage backend labels this gateway can write to
    pub backends: Vec<String>,
    /// Whether the verification index is persistent (MongoDB) or in-memory
    pub index: IndexHealth,
    /// Notary pool load (worker count and free queue slots)
    pub notary: NotaryPoolStats,
}

#[derive(Serialize)]
pub struct IndexHealth {
    pub persistent: bool,
}

fn build_health_response(state: &AppState) -> HealthResponse {
    let args = &state.args;

    // Memory-only index outside dev mode means MongoDB was unreachable at
    // startup; still serving, but degraded.
    let status = if state.persistent_index || args.dev_mode {
        "online"
    } else {
        "degraded"
    };

    HealthResponse {
        healthy: true,
        status,
        version: env!("CARGO_PKG_VERSION"),
        uptime: state.started_at.elapsed().as_secs(),
        timestamp: chrono::Utc::now().to_rfc3339(),
        mode: if args.dev_mode {
            "development".to_string()
        } else {
            "production".to_string()
        },
        node_id: args.node_id.to_string(),
        backends: state
            .orchestrator
            .configured_kinds()
            .iter()
            .map(|k| k.label().to_string())
            .collect(),
        index: IndexHealth {
            persistent: state.persistent_index,
        },
        notary: state.orchestrator.notary_stats(),
    }
}

fn json_body(status: StatusCode, body: String) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(body)))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// Handle liveness probe (/health, /healthz)
///
/// Always 200 while the process is up; the body carries detail for callers
/// that want it.
pub fn health_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state);
    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":true,"error":"Serialization failed"}"#.to_string());
    json_body(StatusCode::OK, body)
}

/// Handle readiness probe (/ready, /readyz)
///
/// 200 when uploads can be served durably: a persistent index, or dev mode
/// where in-memory stores are the point.
pub fn readiness_check(state: Arc<AppState>) -> Response<Full<Bytes>> {
    let response = build_health_response(&state);
    let is_ready = state.persistent_index || state.args.dev_mode;

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"healthy":false,"error":"Serialization failed"}"#.to_string());

    let status = if is_ready {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    json_body(status, body)
}

/// Version information for deployment verification
#[derive(Serialize)]
pub struct VersionResponse {
    pub version: &'static str,
    /// Git commit hash (short)
    pub commit: &'static str,
    /// Git commit hash (full)
    pub commit_full: &'static str,
    pub build_time: &'static str,
    pub service: &'static str,
}

/// Handle version endpoint (/version)
pub fn version_info() -> Response<Full<Bytes>> {
    let response = VersionResponse {
        version: env!("CARGO_PKG_VERSION"),
        commit: option_env!("GIT_COMMIT_SHORT").unwrap_or("unknown"),
        commit_full: option_env!("GIT_COMMIT_FULL").unwrap_or("unknown"),
        build_time: option_env!("BUILD_TIMESTAMP").unwrap_or("unknown"),
        service: "hallmark",
    };

    let body = serde_json::to_string(&response)
        .unwrap_or_else(|_| r#"{"version":"unknown","commit":"unknown"}"#.to_string());
    json_body(StatusCode::OK, body)
}
