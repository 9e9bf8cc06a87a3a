//! Authentication module
//!
//! Email/password authentication with JWTs:
//! - Bcrypt password hashing
//! - JWT access/refresh token generation and validation
//! - Session management with refresh-token rotation and revocation

mod jwt;
mod password;
mod service;

pub use jwt::{generate_access_token, generate_refresh_token, verify_token, Claims, JwtError};
pub use password::{hash_password, verify_password};
pub use service::{AuthError, AuthService};
