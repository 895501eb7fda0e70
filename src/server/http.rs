//! HTTP server implementation
//!
//! hyper http1 with TokioIo, one spawned task per connection and
//! match-based routing. Request handlers buffer the body themselves (the
//! upload endpoints need the whole thing for hashing anyway).

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Instant;
use tokio::net::TcpListener;
use tracing::{error, info, warn};

use crate::config::Args;
use crate::index::EventIndex;
use crate::orchestrator::UploadOrchestrator;
use crate::routes;
use crate::types::HallmarkError;

type BoxBody = http_body_util::combinators::BoxBody<Bytes, hyper::Error>;

/// Shared application state
pub struct AppState {
    pub args: Args,
    pub orchestrator: Arc<UploadOrchestrator>,
    pub index: Arc<EventIndex>,
    /// Whether the index is MongoDB-backed (false: in-memory fallback)
    pub persistent_index: bool,
    pub started_at: Instant,
}

impl AppState {
    pub fn new(
        args: Args,
        orchestrator: Arc<UploadOrchestrator>,
        index: Arc<EventIndex>,
        persistent_index: bool,
    ) -> Self {
        Self {
            args,
            orchestrator,
            index,
            persistent_index,
            started_at: Instant::now(),
        }
    }
}

/// Start the HTTP server
pub async fn run(state: Arc<AppState>) -> Result<(), HallmarkError> {
    let listener = TcpListener::bind(state.args.listen).await?;

    info!(
        "Hallmark listening on {} as node {}",
        state.args.listen, state.args.node_id
    );
    if state.args.dev_mode {
        warn!("Development mode enabled - in-memory fallbacks active");
    }

    loop {
        match listener.accept().await {
            Ok((stream, addr)) => {
                let state = Arc::clone(&state);
                tokio::spawn(async move {
                    let io = TokioIo::new(stream);

                    let service = service_fn(move |req| {
                        let state = Arc::clone(&state);
                        async move { handle_request(state, addr, req).await }
                    });

                    if let Err(err) = http1::Builder::new()
                        .preserve_header_case(true)
                        .serve_connection(io, service)
                        .await
                    {
                        error!("Error serving connection from {}: {:?}", addr, err);
                    }
                });
            }
            Err(e) => {
                error!("Error accepting connection: {:?}", e);
            }
        }
    }
}

/// Route incoming HTTP requests
async fn handle_request(
    state: Arc<AppState>,
    addr: SocketAddr,
    req: Request<Incoming>,
) -> Result<Response<BoxBody>, hyper::Error> {
    let method = req.method().clone();
    let path = req.uri().path().to_string();

    info!("[{}] {} {}", addr, method, path);

    let response = match (method, path.as_str()) {
        // Liveness probe - 200 whenever the gateway is running
        (Method::GET, "/health") | (Method::GET, "/healthz") => {
            to_boxed(routes::health_check(Arc::clone(&state)))
        }

        // Readiness probe - 200 only when uploads can be served durably
        (Method::GET, "/ready") | (Method::GET, "/readyz") => {
            to_boxed(routes::readiness_check(Arc::clone(&state)))
        }

        // Version info for deployment verification
        (Method::GET, "/version") => to_boxed(routes::version_info()),

        // Upload one or more files to the selected backends
        (Method::POST, "/upload") => {
            return Ok(to_boxed(routes::handle_upload(req, Arc::clone(&state)).await));
        }

        // Verify a file's content against the notarization index
        (Method::POST, "/verify") => {
            return Ok(to_boxed(routes::handle_verify(req, Arc::clone(&state)).await));
        }

        // Filename existence lookup
        (Method::POST, "/check-file-name") => {
            return Ok(to_boxed(
                routes::handle_check_filename(req, Arc::clone(&state)).await,
            ));
        }

        // CORS preflight
        (Method::OPTIONS, _) => to_boxed(preflight_response()),

        _ => to_boxed(not_found_response(&path)),
    };

    Ok(response)
}

/// Convert a Full<Bytes> body to BoxBody
fn to_boxed(response: Response<Full<Bytes>>) -> Response<BoxBody> {
    response.map(|body| body.map_err(|never| match never {}).boxed())
}

/// CORS preflight response
fn preflight_response() -> Response<Full<Bytes>> {
    Response::builder()
        .status(StatusCode::OK)
        .header("Access-Control-Allow-Origin", "*")
        .header("Access-Control-Allow-Headers", "*")
        .header("Access-Control-Allow-Methods", "GET, POST, OPTIONS")
        .body(Full::new(Bytes::new()))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// Not found response
fn not_found_response(path: &str) -> Response<Full<Bytes>> {
    let body = serde_json::json!({
        "error": "Not Found",
        "path": path,
    });

    Response::builder()
        .status(StatusCode::NOT_FOUND)
        .header("Content-Type", "application/json")
        .body(Full::new(Bytes::from(body.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}
