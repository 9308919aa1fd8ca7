//! Application layer services implementing business logic.
//!
//! Services consume repository traits and give HTTP handlers a small API.
//!
//! - [`services::user_service::UserService`] - user listing and registration

pub mod services;
