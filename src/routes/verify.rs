//! Verification endpoints
//!
//! POST /verify re-hashes the submitted bytes and looks the fingerprint up
//! in the index; a miss is a 404, not a server error. POST /check-file-name
//! answers whether any record carries a given original filename.

use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::{Request, Response, StatusCode};
use serde::Deserialize;
use serde_json::json;
use std::sync::Arc;
use tracing::debug;

use super::upload::{collect_body, parse_form};
use super::{error_response, json_response};
use crate::server::AppState;
use crate::types::HallmarkError;

/// Handle POST /verify
pub async fn handle_verify(req: Request<Incoming>, state: Arc<AppState>) -> Response<Full<Bytes>> {
    let (parts, body) = match collect_body(req, state.args.max_upload_bytes).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };
    let form = match parse_form(&parts, &body) {
        Ok(form) => form,
        Err(e) => return error_response(e),
    };

    let (filename, data) = match form.files.first() {
        Some(file) => file,
        None => {
            return error_response(HallmarkError::BadRequest(
                "No file in verify request".into(),
            ))
        }
    };

    match state.orchestrator.verify(data).await {
        Ok(event) => json_response(
            StatusCode::OK,
            &json!({
                "verified": true,
                "file_hash": event.file_hash,
                "filename": event.filename,
                "uploaded_by": event.uploader,
                "storage": event.storage,
                "upload_time": event.timestamp,
                "txn_hash": event.txn_hash,
            }),
        ),
        Err(HallmarkError::NotFound(_)) => {
            // Unknown content is an ordinary answer here, not a failure.
            debug!(filename = %filename, "verification found no record");
            json_response(
                StatusCode::NOT_FOUND,
                &json!({
                    "verified": false,
                    "error": "No notarization record found for this file",
                }),
            )
        }
        Err(e) => error_response(e),
    }
}

#[derive(Deserialize)]
struct CheckFilenameRequest {
    filename: Option<String>,
}

/// Handle POST /check-file-name
pub async fn handle_check_filename(
    req: Request<Incoming>,
    state: Arc<AppState>,
) -> Response<Full<Bytes>> {
    let (_parts, body) = match collect_body(req, state.args.max_upload_bytes).await {
        Ok(ok) => ok,
        Err(response) => return response,
    };

    let request: CheckFilenameRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            return error_response(HallmarkError::BadRequest(format!("Invalid JSON: {}", e)))
        }
    };
    let filename = match request.filename.as_deref().map(str::trim) {
        Some(name) if !name.is_empty() => name,
        _ => {
            return error_response(HallmarkError::BadRequest(
                "Missing 'filename' field".into(),
            ))
        }
    };

    match state.orchestrator.check_filename(filename).await {
        Ok((exists, hashes)) => json_response(
            StatusCode::OK,
            &json!({
                "exists": exists,
                "hashes": hashes,
            }),
        ),
        Err(e) => error_response(e),
    }
}
