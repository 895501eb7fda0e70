//! Upload endpoint
//!
//! POST /upload takes a multipart form with one or more `files` parts plus
//! `upload_s3` / `upload_ipfs` selection flags and runs each file through
//! the orchestrator. The response is one entry per file; per-backend
//! failures live inside the entry, so a half-successful batch still comes
//! back 200 with enough detail to see what happened where.

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde_json::json;
use std::sync::Arc;
use tracing::warn;

use super::{error_response, json_response};
use crate::ledger::NotarizationReceipt;
use crate::orchestrator::{RecordOutcome, UploadReport};
use crate::server::multipart::{self, UploadForm};
use crate::server::AppState;
use crate::storage::StorageKind;
use crate::types::HallmarkError;

/// Read the whole request body, enforcing the configured size cap
pub async fn collect_body(
    req: Request<Incoming>,
    max_bytes: usize,
) -> Result<(hyper::http::request::Parts, Bytes), Response<Full<Bytes>>> {
    let (parts, body) = req.into_parts();

    // Reject oversized uploads from the declared length before buffering.
    if let Some(length) = parts
        .headers
        .get(hyper::header::CONTENT_LENGTH)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.parse::<usize>().ok())
    {
        if length > max_bytes {
            return Err(payload_too_large(max_bytes));
        }
    }

    let bytes = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            warn!("Failed to read request body: {}", e);
            return Err(error_response(HallmarkError::BadRequest(
                "Failed to read request body".into(),
            )));
        }
    };
    if bytes.len() > max_bytes {
        return Err(payload_too_large(max_bytes));
    }
    Ok((parts, bytes))
}

fn payload_too_large(max_bytes: usize) -> Response<Full<Bytes>> {
    json_response(
        StatusCode::PAYLOAD_TOO_LARGE,
        &json!({ "error": format!("Request body exceeds {} bytes", max_bytes) }),
    )
}

/// Decode the multipart form out of a buffered request
pub fn parse_form(
    parts: &hyper::http::request::Parts,
    body: &[u8],
) -> Result<UploadForm, HallmarkError> {
    let content_type = parts
        .headers
        .get(hyper::header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .ok_or_else(|| HallmarkError::BadRequest("Missing Content-Type header".into()))?;

    let boundary = multipart::boundary_from_content_type(content_type).ok_or_else(|| {
        HallmarkError::BadRequest("Content-Type must be multipart/form-data with a boundary".into())
    })?;

    let parsed = multipart::parse(body, &boundary)?;
    Ok(UploadForm::from_parts(parsed))
}

fn receipt_json(outcome: &RecordOutcome) -> serde_json::Value {
    match outcome {
        Ok(NotarizationReceipt {
            txn_hash,
            block_number,
            block_time,
        }) => json!({
            "txn_hash": txn_hash,
            "block_number": block_number,
            "timestamp": block_time,
        }),
        Err(e) => json!({ "error": e.to_string() }),
    }
}

/// One response entry per uploaded file
fn report_json(report: &UploadReport) -> serde_json::Value {
    let mut upload_results = serde_json::Map::new();
    for (kind, outcome) in &report.outcomes {
        let value = match outcome {
            Ok(locator) => json!(locator.as_str()),
            Err(e) => json!({ "error": e.to_string() }),
        };
        upload_results.insert(kind.field_name().to_string(), value);
    }

    let mut blockchain_receipts = serde_json::Map::new();
    for (kind, outcome) in &report.receipts {
        blockchain_receipts.insert(kind.field_name().to_string(), receipt_json(outcome));
    }

    json!({
        "file_name": report.filename,
        "sha256": report.fingerprint.as_str(),
        "upload_results": upload_results,
        "blockchain_receipts": blockchain_receipts,
    })
}

/// Handle POST /upload
pub async fn handle_upload(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let (parts, body) = match collect_body(req, state.args.max_upload_bytes).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };
    let form = match parse_form(&parts, &body) {
        Ok(form) => form,
        Err(e) => return error_response(e),
    };

    if form.files.is_empty() {
        return error_response(HallmarkError::BadRequest(
            "No files in upload request".into(),
        ));
    }

    let mut requested = Vec::new();
    if form.upload_s3 {
        requested.push(StorageKind::S3);
    }
    if form.upload_ipfs {
        requested.push(StorageKind::Ipfs);
    }
    if requested.is_empty() {
        return error_response(HallmarkError::NoBackendSelected);
    }

    let uploader = form.uploader.as_deref().unwrap_or("unknown");

    let mut entries = Vec::with_capacity(form.files.len());
    let mut any_succeeded = false;
    for (filename, data) in &form.files {
        match state
            .orchestrator
            .upload(data, filename, &requested, uploader)
            .await
        {
            Ok(report) => {
                any_succeeded = true;
                entries.push(report_json(&report));
            }
            Err(e) => {
                warn!(filename = %filename, error = %e, "upload failed");
                entries.push(json!({
                    "file_name": filename,
                    "error": e.to_string(),
                }));
            }
        }
    }

    // Only when every file failed on every backend does the request itself
    // read as a gateway failure.
    let status = if any_succeeded {
        StatusCode::OK
    } else {
        StatusCode::BAD_GATEWAY
    };
    json_response(status, &serde_json::Value::Array(entries))
}
