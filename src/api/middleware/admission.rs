//! Per-client rate limiting in front of the handler chain.

use axum::{
    Json,
    extract::{Request, State},
    http::{Method, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use std::sync::Arc;
use tracing::{debug, warn};

use super::client_ip::IdentifierExtractor;
use crate::api::dto::envelope::ApiEnvelope;
use crate::infrastructure::rate_limit::RateLimiterStore;

/// Error text of the rejection payload.
pub const TOO_MANY_REQUESTS: &str = "Too many requests";

/// Rate limiting middleware state.
///
/// # Behavior
///
/// - Clients are keyed by the configured [`IdentifierExtractor`]
/// - Each request consumes one token from the client's bucket
/// - Exhausted buckets get `429 Too Many Requests` with the standard
///   envelope; the request never reaches the inner stack
/// - If the client cannot be identified the request passes unthrottled
/// - `OPTIONS` pre-flight requests are exempt when `exempt_preflight` is set
///
/// # Example
///
/// ```rust,ignore
/// let gate = AdmissionGate::new(store, Arc::new(RealIpExtractor::new(false)), true);
///
/// let app = Router::new()
///     .route("/api/users/getData", get(get_users_handler))
///     .layer(middleware::from_fn_with_state(gate, admission::admit));
/// ```
#[derive(Clone)]
pub struct AdmissionGate {
    store: Arc<RateLimiterStore>,
    extractor: Arc<dyn IdentifierExtractor>,
    exempt_preflight: bool,
}

impl AdmissionGate {
    pub fn new(
        store: Arc<RateLimiterStore>,
        extractor: Arc<dyn IdentifierExtractor>,
        exempt_preflight: bool,
    ) -> Self {
        Self {
            store,
            extractor,
            exempt_preflight,
        }
    }

    /// Decides whether `req` may proceed, consuming a token when it does.
    pub fn admits(&self, req: &Request) -> bool {
        if self.exempt_preflight && req.method() == Method::OPTIONS {
            return true;
        }

        let identifier = match self.extractor.extract(req) {
            Ok(identifier) => identifier,
            Err(err) => {
                warn!(error = %err, "Cannot identify client, skipping rate limit");
                return true;
            }
        };

        let allowed = self.store.allow(&identifier);
        if !allowed {
            debug!(client = %identifier, path = %req.uri().path(), "Rate limit exceeded");
        }
        allowed
    }
}

/// Rejects requests from clients over their rate limit.
pub async fn admit(State(gate): State<AdmissionGate>, req: Request, next: Next) -> Response {
    if gate.admits(&req) {
        next.run(req).await
    } else {
        too_many_requests()
    }
}

/// Fixed rejection response.
///
/// ```json
/// {"timestamp": "2026-10-17-09-12-44", "status": 0, "items": null, "error": "Too many requests"}
/// ```
pub fn too_many_requests() -> Response {
    (
        StatusCode::TOO_MANY_REQUESTS,
        Json(ApiEnvelope::<()>::failure(TOO_MANY_REQUESTS)),
    )
        .into_response()
}
