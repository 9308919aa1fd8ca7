//! API route configuration.

use crate::api::handlers::{create_user_handler, get_users_handler};
use crate::state::AppState;
use axum::{
    Router,
    routing::{get, post},
};

/// User routes, nested under `/api`.
///
/// # Endpoints
///
/// - `GET  /users/getData` - List users
/// - `POST /users/create`  - Register a user
pub fn user_routes() -> Router<AppState> {
    Router::new()
        .route("/users/getData", get(get_users_handler))
        .route("/users/create", post(create_user_handler))
}
