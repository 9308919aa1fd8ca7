//! Shared application state injected into handlers.

use std::sync::Arc;

use crate::application::services::UserService;
use crate::infrastructure::rate_limit::RateLimiterStore;

#[derive(Clone)]
pub struct AppState {
    pub user_service: Arc<UserService>,
    pub rate_limiter: Arc<RateLimiterStore>,
}

impl AppState {
    pub fn new(user_service: Arc<UserService>, rate_limiter: Arc<RateLimiterStore>) -> Self {
        Self {
            user_service,
            rate_limiter,
        }
    }
}
