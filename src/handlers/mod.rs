//! API handlers for the Cafetero backend

pub mod auth;
pub mod business;
pub mod health;
pub mod order;
pub mod payment;
pub mod product;

pub use auth::*;
pub use business::*;
pub use health::health_check;
pub use order::*;
pub use payment::*;
pub use product::*;

// Re-export auth extractors from middleware for handler use
pub use crate::middleware::auth::{AuthenticatedUser, OptionalUser};
