//! Structured per-request access logging.
//!
//! [`observe`] wraps the downstream handler chain: it snapshots the request
//! (including a classified body), runs the handler, and emits one
//! [`AccessRecord`] through an [`AccessLogSink`]. The handler's response is
//! returned untouched, and nothing in this module can fail a request.
//!
//! # Record Fields
//!
//! ```json
//! {
//!   "timestamp": "2026-10-17T09:12:44.123456789Z",
//!   "method": "POST",
//!   "path": "/api/users/create",
//!   "query_params": "dry_run=1",
//!   "remote_ip": "203.0.113.9",
//!   "request_id": "6f1c0c9e-...",
//!   "latency_sec": 0.0021,
//!   "status": 409,
//!   "error": "Email already registered",
//!   "request_body": {"name": "Ann", "email": "ann@example.com"},
//!   "user": {"id": 7}
//! }
//! ```
//!
//! `user` is present only when a [`CallerIdentity`] was attached to the
//! request or response extensions.

use axum::{
    extract::{Request, State},
    http::{HeaderMap, Method},
    middleware::Next,
    response::Response,
};
use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use std::io::Write;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use super::body::{self, BodyLimits};
use super::client_ip::{IdentifierExtractor, UNKNOWN_CLIENT};
use crate::error::ErrorMessage;

/// Header carrying the request correlation id.
pub const X_REQUEST_ID: &str = "x-request-id";

/// Error field value for requests that completed without an error.
pub const NO_ERROR: &str = "-";

/// Identity of the authenticated caller.
///
/// Written by authentication middleware into the request extensions (when it
/// runs before the observer) or the response extensions (when it runs
/// inside the observed stack). Only read here.
#[derive(Debug, Clone, PartialEq)]
pub struct CallerIdentity(pub Value);

/// Point-in-time view of the inbound request.
#[derive(Debug, Clone, PartialEq)]
pub struct RequestSnapshot {
    pub method: String,
    pub path: String,
    pub query: String,
    pub remote_ip: String,
    pub body: Value,
}

/// What the handler chain produced.
#[derive(Debug, Clone, PartialEq)]
pub struct OutcomeRecord {
    pub status: u16,
    pub error: String,
    pub latency: Duration,
    pub user: Option<Value>,
}

impl OutcomeRecord {
    /// Derives the outcome from a finished response.
    ///
    /// The error message is the one attached by [`crate::error::AppError`];
    /// other failing responses fall back to the status' canonical reason.
    pub fn from_response(response: &Response, latency: Duration, user: Option<Value>) -> Self {
        let status = response.status();
        let error = match response.extensions().get::<ErrorMessage>() {
            Some(ErrorMessage(message)) => message.clone(),
            None if status.is_client_error() || status.is_server_error() => status
                .canonical_reason()
                .unwrap_or(status.as_str())
                .to_string(),
            None => NO_ERROR.to_string(),
        };

        Self {
            status: status.as_u16(),
            error,
            latency,
            user,
        }
    }
}

/// One access log entry.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AccessRecord {
    pub timestamp: DateTime<Utc>,
    pub method: String,
    pub path: String,
    pub query_params: String,
    pub remote_ip: String,
    pub request_id: String,
    pub latency_sec: f64,
    pub status: u16,
    pub error: String,
    pub request_body: Value,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user: Option<Value>,
}

impl AccessRecord {
    pub fn new(snapshot: RequestSnapshot, outcome: OutcomeRecord, request_id: String) -> Self {
        Self {
            timestamp: Utc::now(),
            method: snapshot.method,
            path: snapshot.path,
            query_params: snapshot.query,
            remote_ip: snapshot.remote_ip,
            request_id,
            latency_sec: outcome.latency.as_secs_f64(),
            status: outcome.status,
            error: outcome.error,
            request_body: snapshot.body,
            user: outcome.user,
        }
    }
}

/// Failure to write an access record.
#[derive(Debug, thiserror::Error)]
pub enum EmitError {
    #[error("failed to serialize access record: {0}")]
    Serialize(#[from] serde_json::Error),
    #[error("access log queue is full")]
    QueueFull,
    #[error("access log writer has stopped")]
    WriterClosed,
}

/// Destination for access records.
///
/// Errors are reported for the sink's own callers and tests; the observer
/// discards them.
pub trait AccessLogSink: Send + Sync {
    fn emit(&self, record: &AccessRecord) -> Result<(), EmitError>;
}

/// Emits records as `tracing` events on the `access_log` target.
///
/// Severity follows the status: `ERROR` for 5xx, `WARN` for 4xx, `INFO`
/// otherwise. With the JSON formatter and flattened events every field
/// becomes a top-level key; `request_body` is rendered as compact JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingSink;

macro_rules! access_event {
    ($level:ident, $record:expr) => {{
        let record = $record;
        $level!(
            target: "access_log",
            method = %record.method,
            path = %record.path,
            query_params = %record.query_params,
            remote_ip = %record.remote_ip,
            request_id = %record.request_id,
            latency_sec = record.latency_sec,
            status = record.status,
            error = %record.error,
            request_body = %record.request_body,
            user = record.user.as_ref().map(tracing::field::display),
            "Request completed"
        )
    }};
}

impl AccessLogSink for TracingSink {
    fn emit(&self, record: &AccessRecord) -> Result<(), EmitError> {
        match record.status {
            500.. => access_event!(error, record),
            400..=499 => access_event!(warn, record),
            _ => access_event!(info, record),
        }
        Ok(())
    }
}

/// Writes each record as one JSON line to `W`.
///
/// [`AccessLogSink::emit`] only serializes the record and queues it; a
/// writer on the blocking pool does the I/O, so a stalled writer never
/// holds up a request. Records are dropped with [`EmitError::QueueFull`]
/// while the queue is full.
pub struct JsonLinesSink {
    tx: mpsc::Sender<Vec<u8>>,
}

impl JsonLinesSink {
    /// Starts the writer for `writer` and returns the sink feeding it.
    ///
    /// The returned handle completes once every queued line is written and
    /// the sink has been dropped.
    pub fn spawn<W>(writer: W, capacity: usize) -> (Self, JoinHandle<()>)
    where
        W: Write + Send + 'static,
    {
        let (tx, rx) = mpsc::channel(capacity);
        let handle = tokio::task::spawn_blocking(move || write_lines(writer, rx));
        (Self { tx }, handle)
    }

    pub fn stdout(capacity: usize) -> (Self, JoinHandle<()>) {
        Self::spawn(std::io::stdout(), capacity)
    }
}

fn write_lines<W: Write>(mut writer: W, mut rx: mpsc::Receiver<Vec<u8>>) {
    while let Some(line) = rx.blocking_recv() {
        if let Err(err) = writer.write_all(&line).and_then(|()| writer.flush()) {
            error!(error = %err, "Failed to write access record");
        }
    }
}

impl AccessLogSink for JsonLinesSink {
    fn emit(&self, record: &AccessRecord) -> Result<(), EmitError> {
        let mut line = serde_json::to_vec(record)?;
        line.push(b'\n');

        self.tx.try_send(line).map_err(|err| match err {
            TrySendError::Full(_) => EmitError::QueueFull,
            TrySendError::Closed(_) => EmitError::WriterClosed,
        })
    }
}

/// Access logging middleware state.
///
/// Built once at startup and shared through [`Arc`].
///
/// # Example
///
/// ```rust,ignore
/// let observer = Arc::new(RequestObserver::new(limits, extractor, Arc::new(TracingSink)));
///
/// let app = Router::new()
///     .route("/api/users/create", post(create_user_handler))
///     .layer(middleware::from_fn_with_state(observer, observer::observe));
/// ```
pub struct RequestObserver {
    limits: BodyLimits,
    extractor: Arc<dyn IdentifierExtractor>,
    sink: Arc<dyn AccessLogSink>,
}

impl RequestObserver {
    pub fn new(
        limits: BodyLimits,
        extractor: Arc<dyn IdentifierExtractor>,
        sink: Arc<dyn AccessLogSink>,
    ) -> Self {
        Self {
            limits,
            extractor,
            sink,
        }
    }

    /// Captures the request snapshot, returning the request with a
    /// replayable body.
    pub async fn snapshot(&self, req: Request) -> (Request, RequestSnapshot) {
        let remote_ip = self
            .extractor
            .extract(&req)
            .unwrap_or_else(|_| UNKNOWN_CLIENT.to_string());
        let method = req.method().to_string();
        let path = req.uri().path().to_string();
        let query = req.uri().query().unwrap_or_default().to_string();

        let (req, body) = body::capture(req, self.limits).await;

        let snapshot = RequestSnapshot {
            method,
            path,
            query,
            remote_ip,
            body,
        };
        (req, snapshot)
    }

    fn emit(&self, record: AccessRecord) {
        let _ = self.sink.emit(&record);
    }
}

/// Logs one [`AccessRecord`] per request.
///
/// # Flow
///
/// 1. `OPTIONS` pre-flight requests pass through unlogged
/// 2. Snapshot the request and classify its body
/// 3. Run the downstream handler chain
/// 4. Derive the outcome and emit the record
/// 5. Return the handler's response unchanged
pub async fn observe(
    State(observer): State<Arc<RequestObserver>>,
    req: Request,
    next: Next,
) -> Response {
    if req.method() == Method::OPTIONS {
        return next.run(req).await;
    }

    let start = Instant::now();
    let (req, snapshot) = observer.snapshot(req).await;
    let request_id = header_value(req.headers(), X_REQUEST_ID);
    let caller = req.extensions().get::<CallerIdentity>().cloned();

    let response = next.run(req).await;

    let latency = start.elapsed();
    let user = caller
        .or_else(|| response.extensions().get::<CallerIdentity>().cloned())
        .map(|CallerIdentity(user)| user);
    let outcome = OutcomeRecord::from_response(&response, latency, user);
    let request_id = request_id
        .or_else(|| header_value(response.headers(), X_REQUEST_ID))
        .unwrap_or_default();

    observer.emit(AccessRecord::new(snapshot, outcome, request_id));

    response
}

fn header_value(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
}
