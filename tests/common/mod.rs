#![allow(dead_code)]

use axum::Router;
use axum::body::{Body, Bytes, to_bytes};
use axum::extract::{ConnectInfo, Request};
use axum::response::Response;
use request_gate::api::middleware::body::BodyLimits;
use request_gate::api::middleware::client_ip::{IdentifierError, IdentifierExtractor};
use request_gate::api::middleware::observer::{AccessLogSink, AccessRecord, EmitError};
use request_gate::api::middleware::{AdmissionGate, RealIpExtractor, RequestObserver};
use request_gate::application::services::UserService;
use request_gate::infrastructure::persistence::InMemoryUserRepository;
use request_gate::infrastructure::rate_limit::{RateLimitConfig, RateLimiterStore};
use request_gate::routes::app_router;
use request_gate::state::AppState;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;

pub const LIMITS: BodyLimits = BodyLimits {
    max_multipart_bytes: 64 * 1024,
    max_capture_bytes: 64 * 1024,
};

/// Collects emitted access records.
#[derive(Default)]
pub struct RecordingSink {
    records: Mutex<Vec<AccessRecord>>,
}

impl RecordingSink {
    pub fn records(&self) -> Vec<AccessRecord> {
        self.records.lock().unwrap().clone()
    }
}

impl AccessLogSink for RecordingSink {
    fn emit(&self, record: &AccessRecord) -> Result<(), EmitError> {
        self.records.lock().unwrap().push(record.clone());
        Ok(())
    }
}

/// A sink whose writes always fail.
pub struct FailingSink;

impl AccessLogSink for FailingSink {
    fn emit(&self, _record: &AccessRecord) -> Result<(), EmitError> {
        Err(EmitError::WriterClosed)
    }
}

/// Identifies every request as the same client.
pub struct FixedClient(pub &'static str);

impl IdentifierExtractor for FixedClient {
    fn extract(&self, _req: &Request) -> Result<String, IdentifierError> {
        Ok(self.0.to_string())
    }
}

pub fn store(burst: u32) -> Arc<RateLimiterStore> {
    Arc::new(
        RateLimiterStore::new(RateLimitConfig {
            rate: 0.001,
            burst,
            ttl: Duration::from_secs(60),
        })
        .unwrap(),
    )
}

pub fn observer(sink: Arc<dyn AccessLogSink>) -> Arc<RequestObserver> {
    Arc::new(RequestObserver::new(
        LIMITS,
        Arc::new(RealIpExtractor::new(true)),
        sink,
    ))
}

pub fn create_test_state(rate_limiter: Arc<RateLimiterStore>) -> AppState {
    let user_service = Arc::new(UserService::new(Arc::new(InMemoryUserRepository::new())));
    AppState::new(user_service, rate_limiter)
}

/// Full application router with a recording sink and a generous rate limit.
pub fn create_test_app() -> (Router, Arc<RecordingSink>) {
    let sink = Arc::new(RecordingSink::default());
    let rate_limiter = store(1_000);
    let gate = AdmissionGate::new(rate_limiter.clone(), Arc::new(FixedClient("tester")), true);
    let app = app_router(create_test_state(rate_limiter), observer(sink.clone()), gate);
    (app, sink)
}

pub fn with_peer(mut req: Request, peer: &str) -> Request {
    let addr: SocketAddr = peer.parse().unwrap();
    req.extensions_mut().insert(ConnectInfo(addr));
    req
}

pub async fn body_bytes(response: Response) -> Bytes {
    to_bytes(response.into_body(), usize::MAX).await.unwrap()
}

pub async fn body_json(response: Response) -> serde_json::Value {
    serde_json::from_slice(&body_bytes(response).await).unwrap()
}

pub fn empty_request(method: &str, uri: &str) -> Request {
    Request::builder()
        .method(method)
        .uri(uri)
        .body(Body::empty())
        .unwrap()
}

/// Builds a `multipart/form-data` body; parts are `(name, file_name, content)`.
pub fn multipart_body(boundary: &str, parts: &[(&str, Option<&str>, &str)]) -> String {
    let mut out = String::new();
    for (name, file_name, content) in parts {
        out.push_str(&format!("--{boundary}\r\n"));
        match file_name {
            Some(file_name) => out.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"; filename=\"{file_name}\"\r\nContent-Type: application/octet-stream\r\n\r\n"
            )),
            None => out.push_str(&format!(
                "Content-Disposition: form-data; name=\"{name}\"\r\n\r\n"
            )),
        }
        out.push_str(content);
        out.push_str("\r\n");
    }
    out.push_str(&format!("--{boundary}--\r\n"));
    out
}
