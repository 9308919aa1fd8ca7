//! HTTP request handlers for API endpoints.
//!
//! Each handler module corresponds to a logical grouping of endpoints.

pub mod fallback;
pub mod health;
pub mod users;

pub use fallback::not_found_handler;
pub use health::health_handler;
pub use users::{create_user_handler, get_users_handler};
