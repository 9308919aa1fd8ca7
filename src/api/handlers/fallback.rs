//! Handler for unmatched routes.

use axum::http::Uri;
use serde_json::json;

use crate::error::AppError;

/// Answers any path no route matches with `404 Not Found`.
///
/// Runs inside the middleware stack, so the access record carries the
/// message below as its `error`.
pub async fn not_found_handler(uri: Uri) -> AppError {
    AppError::not_found("Route not found", json!({ "path": uri.path() }))
}
