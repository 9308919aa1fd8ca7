//! # Request Gate
//!
//! Request observation and per-client rate limiting for Axum services.
//!
//! ## Middleware Pipeline
//!
//! ```text
//! request ─► request id ─► admission gate ─► request observer ─► handler
//!                              │                    │
//!                              └─ 429 when over     └─ one access record
//!                                 the rate limit       per request
//! ```
//!
//! - [`api::middleware::admission`] - token bucket rate limiting keyed by client IP
//! - [`api::middleware::observer`] - structured access log with request body capture
//! - [`infrastructure::rate_limit`] - the in-memory bucket store and its expiry sweeper
//!
//! ## Architecture
//!
//! - **Domain Layer** ([`domain`]) - Entities and repository traits
//! - **Application Layer** ([`application`]) - Business logic services
//! - **Infrastructure Layer** ([`infrastructure`]) - In-memory storage and rate limit state
//! - **API Layer** ([`api`]) - Handlers, DTOs, and middleware
//!
//! ## Configuration
//!
//! Service configuration is loaded from environment variables via [`config::Config`].
//! See [`config`] module for available options.

pub mod api;
pub mod application;
pub mod domain;
pub mod error;
pub mod infrastructure;
pub mod state;

pub mod config;
pub mod server;

pub mod routes;

pub use error::AppError;
pub use state::AppState;

/// Commonly used types for external consumers.
///
/// Re-exports frequently used types to simplify imports for library users
/// and integration tests.
pub mod prelude {
    pub use crate::api::middleware::{
        AccessLogSink, AdmissionGate, IdentifierExtractor, RealIpExtractor, RequestObserver,
    };
    pub use crate::application::services::UserService;
    pub use crate::error::AppError;
    pub use crate::infrastructure::rate_limit::{RateLimitConfig, RateLimiterStore};
    pub use crate::state::AppState;
}
