//! Product route definitions
//!
//! Creation and listing hang off the owning business; single-product
//! operations are flat. Parameter names must line up with the business
//! routes for the shared `/businesses/:id` prefix.

use axum::{
    routing::{delete, get, post, put},
    Router,
};

use crate::handlers::*;
use crate::state::AppState;

pub fn product_routes() -> Router<AppState> {
    Router::new()
        .route("/businesses/:id/products", post(create_product))
        .route("/businesses/:id/products", get(list_products))
        .route("/products/:id", get(get_product))
        .route("/products/:id", put(update_product))
        .route("/products/:id", delete(delete_product))
}
