//! Repository implementations.
//!
//! - [`InMemoryUserRepository`] - process-local user storage

pub mod memory_user_repository;

pub use memory_user_repository::InMemoryUserRepository;
