//! Client identification shared by request logging and rate limiting.

use axum::extract::{ConnectInfo, Request};
use axum::http::HeaderMap;
use std::net::SocketAddr;

const X_FORWARDED_FOR: &str = "x-forwarded-for";
const X_REAL_IP: &str = "x-real-ip";

/// Identifier used when no client address can be derived.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Failure to derive a client identifier from a request.
#[derive(Debug, thiserror::Error, PartialEq, Eq)]
pub enum IdentifierError {
    #[error("client socket address is not available")]
    MissingAddress,
}

/// Derives the key a request is rate limited and logged under.
///
/// Implementations must be cheap: they run on every request before any
/// handler code.
pub trait IdentifierExtractor: Send + Sync {
    /// Returns the client identifier for `req`.
    ///
    /// # Errors
    ///
    /// Returns [`IdentifierError`] when no identifier can be derived. Callers
    /// treat this as non-fatal.
    fn extract(&self, req: &Request) -> Result<String, IdentifierError>;
}

/// Identifies clients by IP address.
///
/// With `trust_proxy_headers` enabled the first `X-Forwarded-For` entry wins,
/// then `X-Real-IP`. Without it, or when neither header is usable, the socket
/// peer address from [`ConnectInfo`] is used. Enable proxy headers only when
/// the service runs behind a trusted reverse proxy, since clients can set
/// them freely.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealIpExtractor {
    trust_proxy_headers: bool,
}

impl RealIpExtractor {
    pub fn new(trust_proxy_headers: bool) -> Self {
        Self {
            trust_proxy_headers,
        }
    }
}

impl IdentifierExtractor for RealIpExtractor {
    fn extract(&self, req: &Request) -> Result<String, IdentifierError> {
        if self.trust_proxy_headers
            && let Some(ip) = forwarded_ip(req.headers())
        {
            return Ok(ip);
        }

        req.extensions()
            .get::<ConnectInfo<SocketAddr>>()
            .map(|ConnectInfo(addr)| addr.ip().to_string())
            .ok_or(IdentifierError::MissingAddress)
    }
}

fn forwarded_ip(headers: &HeaderMap) -> Option<String> {
    if let Some(forwarded) = headers.get(X_FORWARDED_FOR)
        && let Ok(value) = forwarded.to_str()
        && let Some(first) = value.split(',').next()
        && !first.trim().is_empty()
    {
        return Some(first.trim().to_string());
    }

    headers
        .get(X_REAL_IP)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn request(headers: &[(&str, &str)], peer: Option<&str>) -> Request {
        let mut builder = Request::builder().uri("/");
        for (name, value) in headers {
            builder = builder.header(*name, *value);
        }
        let mut req = builder.body(Body::empty()).unwrap();
        if let Some(peer) = peer {
            let addr: SocketAddr = peer.parse().unwrap();
            req.extensions_mut().insert(ConnectInfo(addr));
        }
        req
    }

    #[test]
    fn test_peer_address_by_default() {
        let req = request(&[("x-forwarded-for", "1.1.1.1")], Some("10.0.0.7:5123"));

        assert_eq!(RealIpExtractor::new(false).extract(&req).unwrap(), "10.0.0.7");
    }

    #[test]
    fn test_first_forwarded_entry_when_trusted() {
        let req = request(
            &[("x-forwarded-for", " 203.0.113.9 , 10.0.0.1"), ("x-real-ip", "9.9.9.9")],
            Some("10.0.0.7:5123"),
        );

        assert_eq!(RealIpExtractor::new(true).extract(&req).unwrap(), "203.0.113.9");
    }

    #[test]
    fn test_real_ip_fallback() {
        let req = request(&[("x-real-ip", "198.51.100.4")], None);

        assert_eq!(RealIpExtractor::new(true).extract(&req).unwrap(), "198.51.100.4");
    }

    #[test]
    fn test_empty_forwarded_header_falls_back_to_peer() {
        let req = request(&[("x-forwarded-for", "")], Some("[::1]:8080"));

        assert_eq!(RealIpExtractor::new(true).extract(&req).unwrap(), "::1");
    }

    #[test]
    fn test_missing_address() {
        let req = request(&[], None);

        assert_eq!(
            RealIpExtractor::default().extract(&req),
            Err(IdentifierError::MissingAddress)
        );
    }
}
