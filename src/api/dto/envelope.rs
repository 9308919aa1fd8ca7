//! Response envelope shared by the user endpoints and the rate limiter.

use chrono::Local;
use serde::Serialize;

/// `chrono` format of [`ApiEnvelope::timestamp`], e.g. `2026-10-17-09-12-44`.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d-%H-%M-%S";

/// Standard response body.
///
/// ```json
/// {
///   "timestamp": "2026-10-17-09-12-44",
///   "status": 1,
///   "items": [...],
///   "error": null
/// }
/// ```
///
/// `status` is `1` on success and `0` on failure.
#[derive(Debug, Serialize)]
pub struct ApiEnvelope<T> {
    pub timestamp: String,
    pub status: u8,
    pub items: Option<T>,
    pub error: Option<String>,
}

impl<T> ApiEnvelope<T> {
    pub fn success(items: T) -> Self {
        Self {
            timestamp: local_timestamp(),
            status: 1,
            items: Some(items),
            error: None,
        }
    }

    pub fn failure(error: impl Into<String>) -> Self {
        Self {
            timestamp: local_timestamp(),
            status: 0,
            items: None,
            error: Some(error.into()),
        }
    }
}

fn local_timestamp() -> String {
    Local::now().format(TIMESTAMP_FORMAT).to_string()
}
