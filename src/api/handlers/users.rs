//! Handlers for user endpoints.

use axum::{Json, extract::State};
use validator::Validate;

use crate::api::dto::envelope::ApiEnvelope;
use crate::api::dto::users::{CreateUserRequest, UserItem};
use crate::error::AppError;
use crate::state::AppState;

/// Lists registered users.
///
/// # Endpoint
///
/// `GET /api/users/getData`
///
/// # Response
///
/// ```json
/// {
///   "timestamp": "2026-10-17-09-12-44",
///   "status": 1,
///   "items": [
///     { "id": 1, "name": "Ann", "email": "ann@example.com", "created_at": "..." }
///   ],
///   "error": null
/// }
/// ```
pub async fn get_users_handler(
    State(state): State<AppState>,
) -> Result<Json<ApiEnvelope<Vec<UserItem>>>, AppError> {
    let users = state.user_service.list_users().await?;
    let items = users.into_iter().map(UserItem::from).collect();

    Ok(Json(ApiEnvelope::success(items)))
}

/// Registers a user.
///
/// # Endpoint
///
/// `POST /api/users/create`
///
/// # Request Body
///
/// ```json
/// { "name": "Ann", "email": "ann@example.com" }
/// ```
///
/// # Errors
///
/// - **400 Bad Request**: validation failed
/// - **409 Conflict**: email already registered
pub async fn create_user_handler(
    State(state): State<AppState>,
    Json(payload): Json<CreateUserRequest>,
) -> Result<Json<ApiEnvelope<&'static str>>, AppError> {
    payload.validate()?;

    let user = state
        .user_service
        .create_user(payload.name, payload.email)
        .await?;
    tracing::debug!(user_id = user.id, "User created");

    Ok(Json(ApiEnvelope::success("SUCCESS")))
}
