//! Core domain entities.
//!
//! Entities are plain data structures without business logic, with a
//! separate `New*` struct for creation.
//!
//! - [`User`] - A registered user

pub mod user;

pub use user::{NewUser, User};
