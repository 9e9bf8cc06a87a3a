//! Route definitions for the Cafetero API

mod auth;
mod business;
mod order;
mod payment;
mod product;

pub use auth::auth_routes;
pub use business::business_routes;
pub use order::order_routes;
pub use payment::payment_routes;
pub use product::product_routes;
