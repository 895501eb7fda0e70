//! HTTP server

pub mod http;
pub mod multipart;

pub use http::{run, AppState};
