//! Top-level router configuration.
//!
//! # Route Structure
//!
//! - `GET  /health`              - Health check
//! - `GET  /api/users/getData`   - List users
//! - `POST /api/users/create`    - Register a user
//! - anything else               - 404 with the standard error body
//!
//! # Middleware (outermost first)
//!
//! - **Request id** - `x-request-id` generated when absent and copied to the response
//! - **Admission** - per-client token bucket; over-limit requests get 429
//! - **Access log** - one structured record per request, including the body

use crate::api;
use crate::api::handlers::{health_handler, not_found_handler};
use crate::api::middleware::{AdmissionGate, RequestObserver, admit, observe};
use crate::state::AppState;
use axum::routing::get;
use axum::{Router, middleware};
use std::sync::Arc;
use tower_http::request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer};

/// Constructs the application router with all routes and middleware.
///
/// # Arguments
///
/// - `state` - shared application state injected into all handlers
/// - `observer` - access logging middleware state
/// - `gate` - rate limiting middleware state
pub fn app_router(state: AppState, observer: Arc<RequestObserver>, gate: AdmissionGate) -> Router {
    Router::new()
        .route("/health", get(health_handler))
        .nest("/api", api::routes::user_routes())
        .fallback(not_found_handler)
        .with_state(state)
        .layer(middleware::from_fn_with_state(observer, observe))
        .layer(middleware::from_fn_with_state(gate, admit))
        .layer(PropagateRequestIdLayer::x_request_id())
        .layer(SetRequestIdLayer::x_request_id(MakeRequestUuid))
}
