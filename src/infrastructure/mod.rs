//! Infrastructure layer: in-process state behind the domain traits and the
//! HTTP middleware.
//!
//! - [`persistence`] - repository implementations
//! - [`rate_limit`] - token bucket store and its expiry sweeper

pub mod persistence;
pub mod rate_limit;
