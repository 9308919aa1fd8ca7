//! HTTP middleware for request admission and observability.
//!
//! - [`admission`] - per-client token bucket rate limiting
//! - [`observer`] - structured access logging with body capture
//! - [`body`] - request body classification used by the observer
//! - [`client_ip`] - client identification shared by both

pub mod admission;
pub mod body;
pub mod client_ip;
pub mod observer;

pub use admission::{AdmissionGate, admit};
pub use client_ip::{IdentifierError, IdentifierExtractor, RealIpExtractor};
pub use observer::{AccessLogSink, JsonLinesSink, RequestObserver, TracingSink, observe};
