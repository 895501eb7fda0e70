//! HTTP routes for Hallmark

pub mod health;
pub mod upload;
pub mod verify;

pub use health::{health_check, readiness_check, version_info};
pub use upload::handle_upload;
pub use verify::{handle_check_filename, handle_verify};

use bytes::Bytes;
use http_body_util::Full;
use hyper::{Response, StatusCode};

use crate::types::HallmarkError;

/// JSON response with CORS headers, shared by every route
pub fn json_response(status: StatusCode, value: &serde_json::Value) -> Response<Full<Bytes>> {
    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .header("Access-Control-Allow-Origin", "*")
        .body(Full::new(Bytes::from(value.to_string())))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::new())))
}

/// Render an error as its status code plus a JSON body
pub fn error_response(err: HallmarkError) -> Response<Full<Bytes>> {
    let (status, message) = err.into_status_code_and_body();
    json_response(status, &serde_json::json!({ "error": message }))
}
