//! User management service.

use crate::domain::entities::{NewUser, User};
use crate::domain::repositories::UserRepository;
use crate::error::AppError;
use serde_json::json;
use std::sync::Arc;

/// Service for listing and registering users.
///
/// Input shape is validated at the HTTP layer; this service enforces the
/// business rules (normalized email, unique registration).
pub struct UserService {
    repository: Arc<dyn UserRepository>,
}

impl UserService {
    /// Creates a new user service.
    pub fn new(repository: Arc<dyn UserRepository>) -> Self {
        Self { repository }
    }

    /// Lists all users.
    ///
    /// # Errors
    ///
    /// Propagates repository errors.
    pub async fn list_users(&self) -> Result<Vec<User>, AppError> {
        self.repository.list().await
    }

    /// Registers a new user.
    ///
    /// Name is trimmed and email is trimmed and lowercased before storage.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Validation`] if the name is blank after trimming.
    /// Returns [`AppError::Conflict`] if the email is already registered.
    pub async fn create_user(&self, name: String, email: String) -> Result<User, AppError> {
        let name = name.trim().to_string();
        let email = email.trim().to_ascii_lowercase();

        if name.is_empty() {
            return Err(AppError::bad_request(
                "Name must not be blank",
                json!({"field": "name"}),
            ));
        }

        if self.repository.find_by_email(&email).await?.is_some() {
            return Err(AppError::conflict(
                "Email already registered",
                json!({"email": email}),
            ));
        }

        self.repository.create(NewUser { name, email }).await
    }

    /// Number of registered users.
    ///
    /// # Errors
    ///
    /// Propagates repository errors.
    pub async fn count_users(&self) -> Result<usize, AppError> {
        self.repository.count().await
    }
}
