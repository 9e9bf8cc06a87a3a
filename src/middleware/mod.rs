//! Middleware for the Cafetero API
//!
//! This module provides middleware for request tracing, rate limiting,
//! security headers, and authentication.

pub mod auth;
mod rate_limiter;
mod security;
mod tracing;

pub use auth::{AuthenticatedUser, OptionalUser};
pub use rate_limiter::RateLimiter;
pub use security::{hsts_header, security_headers};
pub use tracing::request_tracing;
